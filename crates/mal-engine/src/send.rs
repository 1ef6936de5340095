//! # Send Orchestration
//!
//! The central point for sending messages out. Builds headers from the
//! static send details, runs every outgoing message through the access
//! control hook, hands it to the transport, and (for synchronous calls)
//! parks the caller on the correlation table until the terminal stage
//! arrives.

use crate::address::{Address, SendDetails};
use crate::interaction_map::InteractionMap;
use crate::ports::{AccessControl, InteractionListener, MessageSender};
use crate::pubsub_map::PubSubMap;
use crate::state::{CompletionMode, PatternKind};
use mal_types::{
    errors::error_number, stage, InteractionType, MalError, MalMessage, MessageBody,
    MessageHeader, OperationIdent, StandardError, TransactionId,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Send-side orchestrator.
///
/// Holds the two shared tables by handle; their lifecycle belongs to the
/// owning endpoint, not to this struct.
pub struct MessageSend {
    security: Arc<dyn AccessControl>,
    imap: Arc<InteractionMap>,
    pmap: Arc<PubSubMap>,
}

impl MessageSend {
    /// Create an orchestrator over the given security hook and tables.
    pub fn new(
        security: Arc<dyn AccessControl>,
        imap: Arc<InteractionMap>,
        pmap: Arc<PubSubMap>,
    ) -> Self {
        Self {
            security,
            imap,
            pmap,
        }
    }

    // =========================================================================
    // INTERACTION INITIATION
    // =========================================================================

    /// Send one message and return without awaiting any reply.
    ///
    /// Used for SEND interactions and PUBSUB publish; `trans_id` is reused
    /// when the message belongs to an existing interaction (publish), and
    /// minted fresh otherwise.
    pub async fn oneway_interaction(
        &self,
        details: &SendDetails,
        trans_id: Option<TransactionId>,
        op: &OperationIdent,
        stage: u8,
        body: MessageBody,
    ) -> Result<(), MalError> {
        let id = trans_id.unwrap_or_else(TransactionId::mint);
        let header = Self::create_header(details, op, id, stage);
        self.checked_send(&details.endpoint, MalMessage { header, body })
            .await
    }

    /// Initiate a two-way interaction and block until its terminal stage.
    ///
    /// Returns the terminal message; a terminal error (peer error reply,
    /// protocol violation, transport failure) is raised as `Err`. If the
    /// transport send itself fails the transaction is cancelled and the
    /// failure returned immediately; the caller never parks on a dead
    /// interaction.
    pub async fn synchronous_interaction(
        &self,
        details: &SendDetails,
        op: &OperationIdent,
        initial_stage: u8,
        body: MessageBody,
    ) -> Result<MalMessage, MalError> {
        let (_, msg) = self
            .synchronous_interaction_inner(details, op, initial_stage, body)
            .await?;
        Ok(msg)
    }

    /// Initiate a two-way interaction, delivering stages via `listener`.
    ///
    /// Returns the minted transaction id immediately after the send.
    pub async fn asynchronous_interaction(
        &self,
        details: &SendDetails,
        op: &OperationIdent,
        initial_stage: u8,
        listener: Arc<dyn InteractionListener>,
        body: MessageBody,
    ) -> Result<TransactionId, MalError> {
        let kind = Self::pattern_kind(op, initial_stage)?;
        let id = self
            .imap
            .create_transaction(kind, CompletionMode::Asynchronous(listener));
        let header = Self::create_header(details, op, id, initial_stage);

        if let Err(err) = self
            .checked_send(&details.endpoint, MalMessage { header, body })
            .await
        {
            self.imap.cancel_transaction(id);
            return Err(err);
        }
        Ok(id)
    }

    async fn synchronous_interaction_inner(
        &self,
        details: &SendDetails,
        op: &OperationIdent,
        initial_stage: u8,
        body: MessageBody,
    ) -> Result<(TransactionId, MalMessage), MalError> {
        let kind = Self::pattern_kind(op, initial_stage)?;
        let id = self
            .imap
            .create_transaction(kind, CompletionMode::Synchronous);
        let header = Self::create_header(details, op, id, initial_stage);

        if let Err(err) = self
            .checked_send(&details.endpoint, MalMessage { header, body })
            .await
        {
            self.imap.cancel_transaction(id);
            return Err(err);
        }

        let rtn = self.imap.wait_for_response(id).await?;
        Self::raise_if_error(rtn).map(|msg| (id, msg))
    }

    // =========================================================================
    // PUBSUB OPERATIONS
    // =========================================================================

    /// Register a subscription with the broker, blocking until the ack.
    ///
    /// `listener` receives NOTIFY deliveries for the scope from then on.
    pub async fn register(
        &self,
        details: &SendDetails,
        op: &OperationIdent,
        subscription: MessageBody,
        listener: Arc<dyn InteractionListener>,
    ) -> Result<(), MalError> {
        self.pmap
            .register_notify_listener(details.scope_key(), listener);
        self.synchronous_interaction(details, op, stage::REGISTER, subscription)
            .await?;
        Ok(())
    }

    /// Asynchronous variant of [`Self::register`]; the same listener also
    /// receives the control-stage ack.
    pub async fn register_async(
        &self,
        details: &SendDetails,
        op: &OperationIdent,
        subscription: MessageBody,
        listener: Arc<dyn InteractionListener>,
    ) -> Result<TransactionId, MalError> {
        self.pmap
            .register_notify_listener(details.scope_key(), listener.clone());
        self.asynchronous_interaction(details, op, stage::REGISTER, listener, subscription)
            .await
    }

    /// Remove a subscription, blocking until the ack.
    pub async fn deregister(
        &self,
        details: &SendDetails,
        op: &OperationIdent,
        unsubscription: MessageBody,
    ) -> Result<(), MalError> {
        self.synchronous_interaction(details, op, stage::DEREGISTER, unsubscription)
            .await?;
        self.pmap.deregister_notify_listener(&details.scope_key());
        Ok(())
    }

    /// Asynchronous variant of [`Self::deregister`].
    pub async fn deregister_async(
        &self,
        details: &SendDetails,
        op: &OperationIdent,
        unsubscription: MessageBody,
        listener: Arc<dyn InteractionListener>,
    ) -> Result<TransactionId, MalError> {
        let id = self
            .asynchronous_interaction(details, op, stage::DEREGISTER, listener, unsubscription)
            .await?;
        self.pmap.deregister_notify_listener(&details.scope_key());
        Ok(id)
    }

    /// Register this endpoint as a publisher for the scope, blocking until
    /// the ack.
    ///
    /// Returns the transaction id retained for the scope: idempotent per
    /// scope key, so a second registration keeps (and returns) the first
    /// id.
    pub async fn publish_register(
        &self,
        details: &SendDetails,
        op: &OperationIdent,
        entity_keys: MessageBody,
    ) -> Result<TransactionId, MalError> {
        let (id, _) = self
            .synchronous_interaction_inner(details, op, stage::PUBLISH_REGISTER, entity_keys)
            .await?;
        Ok(self
            .pmap
            .register_publish_transaction(details.scope_key(), id))
    }

    /// Asynchronous variant of [`Self::publish_register`].
    pub async fn publish_register_async(
        &self,
        details: &SendDetails,
        op: &OperationIdent,
        entity_keys: MessageBody,
        listener: Arc<dyn InteractionListener>,
    ) -> Result<TransactionId, MalError> {
        let id = self
            .asynchronous_interaction(details, op, stage::PUBLISH_REGISTER, listener, entity_keys)
            .await?;
        Ok(self
            .pmap
            .register_publish_transaction(details.scope_key(), id))
    }

    /// Withdraw this endpoint's publisher registration for the scope,
    /// blocking until the ack.
    pub async fn publish_deregister(
        &self,
        details: &SendDetails,
        op: &OperationIdent,
    ) -> Result<(), MalError> {
        self.synchronous_interaction(details, op, stage::PUBLISH_DEREGISTER, MessageBody::Empty)
            .await?;
        self.pmap.remove_publish_transaction(&details.scope_key());
        Ok(())
    }

    /// Asynchronous variant of [`Self::publish_deregister`].
    pub async fn publish_deregister_async(
        &self,
        details: &SendDetails,
        op: &OperationIdent,
        listener: Arc<dyn InteractionListener>,
    ) -> Result<TransactionId, MalError> {
        let id = self
            .asynchronous_interaction(
                details,
                op,
                stage::PUBLISH_DEREGISTER,
                listener,
                MessageBody::Empty,
            )
            .await?;
        self.pmap.remove_publish_transaction(&details.scope_key());
        Ok(id)
    }

    /// Push one update to the broker, fire-and-forget.
    ///
    /// Requires a prior [`Self::publish_register`] for the same scope; the
    /// update is sent under that registration's transaction id.
    pub async fn publish(
        &self,
        details: &SendDetails,
        op: &OperationIdent,
        updates: MessageBody,
    ) -> Result<(), MalError> {
        let key = details.scope_key();
        let Some(id) = self.pmap.publish_transaction(&key) else {
            warn!(
                broker = %key.broker_uri,
                "publish attempted without a registered publish transaction"
            );
            return Err(MalError::PublishNotRegistered {
                broker: key.broker_uri,
            });
        };

        debug!(transaction_id = %id, broker = %key.broker_uri, "publishing update");
        self.oneway_interaction(details, Some(id), op, stage::PUBLISH, updates)
            .await
    }

    // =========================================================================
    // PROVIDER-SIDE RETURNS
    // =========================================================================

    /// Send a non-error reply stage for an inbound message.
    pub async fn return_response(
        &self,
        address: &Address,
        src: &MessageHeader,
        stage: u8,
        body: MessageBody,
    ) -> Result<(), MalError> {
        let header = Self::create_return_header(address, src, stage, false);
        self.checked_send(&address.endpoint, MalMessage { header, body })
            .await
    }

    /// Send an error reply at an explicit stage.
    pub async fn return_error(
        &self,
        address: &Address,
        src: &MessageHeader,
        stage: u8,
        error: StandardError,
    ) -> Result<(), MalError> {
        let header = Self::create_return_header(address, src, stage, true);
        self.checked_send(
            &address.endpoint,
            MalMessage {
                header,
                body: MessageBody::Error(error),
            },
        )
        .await
    }

    /// Reply to `src` with `error`, deriving the reply stage from the
    /// source stage.
    ///
    /// Only initiation stages have a legal error-reply target; for anything
    /// else (acks, publishes, stages that are themselves replies) the error
    /// is logged and **suppressed**, since replying would invite error-reply
    /// ping-pong between peers. Returns whether a reply was sent.
    pub async fn return_error_and_calculate_stage(
        &self,
        address: &Address,
        src: &MessageHeader,
        error: StandardError,
    ) -> Result<bool, MalError> {
        match Self::error_reply_stage(src) {
            Some(stage) => {
                self.return_error(address, src, stage, error).await?;
                Ok(true)
            }
            None => {
                warn!(
                    transaction_id = %src.transaction_id,
                    interaction = %src.interaction,
                    stage = src.stage,
                    %error,
                    "no legal error-reply stage for source message, suppressing error reply"
                );
                Ok(false)
            }
        }
    }

    // =========================================================================
    // HEADER CONSTRUCTION
    // =========================================================================

    /// Build the header for an outgoing initiation or publish message.
    #[must_use]
    pub fn create_header(
        details: &SendDetails,
        op: &OperationIdent,
        transaction_id: TransactionId,
        stage: u8,
    ) -> MessageHeader {
        MessageHeader {
            uri_from: details.source_uri(),
            uri_to: details.destination_uri(op),
            authentication_id: details.authentication_id.clone(),
            timestamp: Self::now_ms(),
            qos_level: details.qos_level,
            priority: details.priority,
            domain: details.domain.clone(),
            network_zone: details.network_zone.clone(),
            session_type: details.session_type,
            session_name: details.session_name.clone(),
            interaction: op.interaction,
            stage,
            transaction_id,
            service: op.service.clone(),
            operation: op.operation.clone(),
            service_version: op.version,
            is_error: false,
        }
    }

    /// Derive a reply header from the header that triggered it: from/to
    /// swapped, correlation fields copied, stage and error flag set.
    #[must_use]
    pub fn create_return_header(
        address: &Address,
        src: &MessageHeader,
        stage: u8,
        is_error: bool,
    ) -> MessageHeader {
        MessageHeader {
            uri_from: address.uri.clone(),
            uri_to: src.uri_from.clone(),
            authentication_id: address.authentication_id.clone(),
            timestamp: Self::now_ms(),
            qos_level: src.qos_level,
            priority: src.priority,
            domain: src.domain.clone(),
            network_zone: src.network_zone.clone(),
            session_type: src.session_type,
            session_name: src.session_name.clone(),
            interaction: src.interaction,
            stage,
            transaction_id: src.transaction_id,
            service: src.service.clone(),
            operation: src.operation.clone(),
            service_version: src.service_version,
            is_error,
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// The fixed initiation-stage -> error-reply-stage table.
    fn error_reply_stage(src: &MessageHeader) -> Option<u8> {
        match (src.interaction, src.stage) {
            (InteractionType::Submit, stage::SUBMIT) => Some(stage::SUBMIT_ACK),
            (InteractionType::Request, stage::REQUEST) => Some(stage::REQUEST_RESPONSE),
            (InteractionType::Invoke, stage::INVOKE) => Some(stage::INVOKE_ACK),
            (InteractionType::Progress, stage::PROGRESS) => Some(stage::PROGRESS_ACK),
            (InteractionType::PubSub, stage::REGISTER) => Some(stage::REGISTER_ACK),
            (InteractionType::PubSub, stage::PUBLISH_REGISTER) => {
                Some(stage::PUBLISH_REGISTER_ACK)
            }
            (InteractionType::PubSub, stage::DEREGISTER) => Some(stage::DEREGISTER_ACK),
            (InteractionType::PubSub, stage::PUBLISH_DEREGISTER) => {
                Some(stage::PUBLISH_DEREGISTER_ACK)
            }
            _ => None,
        }
    }

    fn pattern_kind(op: &OperationIdent, initial_stage: u8) -> Result<PatternKind, MalError> {
        PatternKind::from_initial(op.interaction, initial_stage).ok_or_else(|| {
            MalError::Interaction(StandardError::with_info(
                error_number::INCORRECT_STATE,
                "stage does not initiate a correlated interaction",
            ))
        })
    }

    /// Run the security hook, then hand the message to the transport.
    async fn checked_send(
        &self,
        endpoint: &Arc<dyn MessageSender>,
        msg: MalMessage,
    ) -> Result<(), MalError> {
        let msg = match self.security.check(msg).await {
            Ok(msg) => msg,
            Err(err) => {
                warn!(%err, "security check rejected outgoing message");
                return Err(MalError::Security(err));
            }
        };

        let destination = msg.header.uri_to.clone();
        endpoint.send(msg).await.map_err(|err| {
            warn!(%destination, %err, "transport send failed");
            MalError::from(err)
        })
    }

    fn raise_if_error(msg: MalMessage) -> Result<MalMessage, MalError> {
        if !msg.header.is_error {
            return Ok(msg);
        }
        match msg.error_body() {
            Some(err) => Err(MalError::Interaction(err.clone())),
            None => Err(MalError::MissingErrorBody),
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
