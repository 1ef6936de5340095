//! Consumer callback boundary for asynchronous interactions.

use async_trait::async_trait;
use mal_types::{MessageBody, MessageHeader, StandardError};
use tracing::debug;

/// Callbacks through which an asynchronous interaction delivers its stages.
///
/// One trait serves every pattern: SUBMIT and the PUBSUB control operations
/// only ever see the ack pair, REQUEST only the response pair, INVOKE and
/// PROGRESS the full set. Broker NOTIFY deliveries arrive through the
/// update pair.
///
/// Default implementations log and discard, so an implementation only needs
/// the callbacks its pattern can actually produce. Callbacks are invoked
/// outside all engine locks; it is safe to start new interactions from
/// within one.
#[async_trait]
pub trait InteractionListener: Send + Sync {
    /// A non-error acknowledgement stage arrived.
    async fn ack_received(&self, header: &MessageHeader, body: &MessageBody) {
        let _ = body;
        debug!(transaction_id = %header.transaction_id, "unhandled ack");
    }

    /// The interaction terminated with an error at the acknowledgement
    /// stage (or before any ack could be validated).
    async fn ack_error_received(&self, header: &MessageHeader, error: &StandardError) {
        debug!(transaction_id = %header.transaction_id, %error, "unhandled ack error");
    }

    /// A non-error update stage arrived (PROGRESS updates, broker NOTIFY).
    async fn update_received(&self, header: &MessageHeader, body: &MessageBody) {
        let _ = body;
        debug!(transaction_id = %header.transaction_id, "unhandled update");
    }

    /// The interaction terminated with an error at an update stage.
    async fn update_error_received(&self, header: &MessageHeader, error: &StandardError) {
        debug!(transaction_id = %header.transaction_id, %error, "unhandled update error");
    }

    /// The terminal response stage arrived.
    async fn response_received(&self, header: &MessageHeader, body: &MessageBody) {
        let _ = body;
        debug!(transaction_id = %header.transaction_id, "unhandled response");
    }

    /// The interaction terminated with an error at the response stage.
    async fn response_error_received(&self, header: &MessageHeader, error: &StandardError) {
        debug!(transaction_id = %header.transaction_id, %error, "unhandled response error");
    }
}
