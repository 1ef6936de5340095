//! Transport boundary for the interaction engine.
//!
//! Concrete transports (in-process registries, message queues, sockets) live
//! outside this crate; the engine only requires the ability to send one
//! encoded message, to decode arrived bytes, and to manage the reception
//! channel a peer talks through.

use async_trait::async_trait;
use mal_types::{MalError, MalMessage, TransportError, Uri};

/// The send half of a bound transport endpoint.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// The URI this endpoint is bound to; used as the default source
    /// identity of outgoing headers.
    fn local_uri(&self) -> Uri;

    /// Deliver one message to `msg.header.uri_to`.
    async fn send(&self, msg: MalMessage) -> Result<(), TransportError>;
}

/// Decodes raw transport bytes into protocol messages.
pub trait MessageDecoder: Send + Sync {
    /// Decode one raw delivery.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(msg))` - a complete message was decoded
    /// - `Ok(None)` - more fragments are needed; not an error
    /// - `Err(_)` - the bytes are unusable; the dispatcher reports a
    ///   communication error on the originating channel
    fn decode(&self, raw: &[u8]) -> Result<Option<MalMessage>, MalError>;
}

/// The transport-level channel an inbound message arrived through.
///
/// Registered with the dispatcher on first contact so later replies can
/// reuse the connection; torn down when the channel turns out to be
/// delivering garbage.
#[async_trait]
pub trait ReceptionChannel: Send + Sync {
    /// The peer URI this channel is connected to, if known yet.
    ///
    /// Transports that only learn the peer identity from the first decoded
    /// message return `None` until then.
    fn peer_uri(&self) -> Option<Uri>;

    /// Close the underlying connection.
    async fn close(&self);
}
