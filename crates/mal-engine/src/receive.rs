//! # Inbound Dispatch Pipeline
//!
//! One unit of work per arrived raw message: decode, register the peer's
//! communication channel, route into the correlation table (or to the
//! NOTIFY listener for broker deliveries). Safe to run concurrently on a
//! shared worker pool: [`InboundDispatcher::dispatch`] takes `&self` and
//! every shared structure it touches is internally locked.

use crate::interaction_map::InteractionMap;
use crate::ports::{MessageDecoder, ReceptionChannel};
use crate::pubsub_map::PubSubMap;
use mal_types::{stage, InteractionType, MalMessage, ScopeKey, Uri};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes decoded inbound messages to their pending transactions.
pub struct InboundDispatcher {
    imap: Arc<InteractionMap>,
    pmap: Arc<PubSubMap>,
    decoder: Arc<dyn MessageDecoder>,
    /// Known peer channels, registered on first decoded contact.
    channels: Mutex<HashMap<Uri, Arc<dyn ReceptionChannel>>>,
}

impl InboundDispatcher {
    /// Create a dispatcher over the shared tables and the transport's
    /// decoder.
    pub fn new(
        imap: Arc<InteractionMap>,
        pmap: Arc<PubSubMap>,
        decoder: Arc<dyn MessageDecoder>,
    ) -> Self {
        Self {
            imap,
            pmap,
            decoder,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Process one raw delivery from the transport.
    ///
    /// Decode failures are communication errors on the originating channel
    /// and never reach a transaction; a `None` decode means the transport
    /// is still accumulating fragments and is a no-op.
    pub async fn dispatch(&self, raw: &[u8], channel: Arc<dyn ReceptionChannel>) {
        let msg = match self.decoder.decode(raw) {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                debug!(bytes = raw.len(), "partial delivery, awaiting more fragments");
                return;
            }
            Err(err) => {
                warn!(%err, "failed to decode inbound message");
                self.communication_error(channel).await;
                return;
            }
        };

        debug!(
            transaction_id = %msg.header.transaction_id,
            interaction = %msg.header.interaction,
            stage = msg.header.stage,
            from = %msg.header.uri_from,
            "received message"
        );

        self.register_channel(msg.header.uri_from.clone(), channel);

        if msg.header.interaction == InteractionType::PubSub && msg.header.stage == stage::NOTIFY {
            self.deliver_notify(msg).await;
        } else {
            self.imap.on_message(msg).await;
        }
    }

    /// Register (or refresh) the channel a peer talks through. Idempotent.
    fn register_channel(&self, peer: Uri, channel: Arc<dyn ReceptionChannel>) {
        self.channels.lock().insert(peer, channel);
    }

    /// Tear down a channel that delivered undecodable bytes.
    ///
    /// The error is reported against the channel, not any transaction: when
    /// decoding fails no transaction id is known to attribute it to.
    async fn communication_error(&self, channel: Arc<dyn ReceptionChannel>) {
        match channel.peer_uri() {
            Some(peer) => {
                self.channels.lock().remove(&peer);
                warn!(%peer, "communication error, closing peer channel");
            }
            None => warn!("communication error on unidentified channel, closing"),
        }
        channel.close().await;
    }

    /// Hand a broker NOTIFY delivery to the listener registered for its
    /// scope.
    async fn deliver_notify(&self, msg: MalMessage) {
        let key = ScopeKey {
            broker_uri: msg.header.uri_from.clone(),
            domain: msg.header.domain.clone(),
            network_zone: msg.header.network_zone.clone(),
            session_type: msg.header.session_type,
            session_name: msg.header.session_name.clone(),
        };

        let Some(listener) = self.pmap.notify_listener(&key) else {
            warn!(
                broker = %key.broker_uri,
                session = %key.session_name,
                "notify for unregistered scope, dropping"
            );
            return;
        };

        if msg.header.is_error {
            let error = msg.error_body().cloned().unwrap_or_else(|| {
                mal_types::StandardError::bad_encoding("error-flagged notify without an error body")
            });
            listener.update_error_received(&msg.header, &error).await;
        } else {
            listener.update_received(&msg.header, &msg.body).await;
        }
    }

    /// Number of registered peer channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }
}
