//! # Message Header and Envelope
//!
//! The protocol envelope for one MAL message: a [`MessageHeader`] describing
//! routing, session and interaction state, plus an opaque [`MessageBody`].
//!
//! Headers are immutable once sent. Reply headers are *derived* from the
//! header that triggered them (from/to swapped, correlation fields copied,
//! stage and error flag set), never edited in place; the derivation itself
//! lives with the send orchestrator in `mal-engine`.

use crate::errors::StandardError;
use crate::structures::{
    Blob, DomainPath, Identifier, InteractionType, QosLevel, SessionType, TransactionId, Uri,
};
use serde::{Deserialize, Serialize};

/// The header carried by every MAL message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    // =========================================================================
    // ROUTING SECTION
    // =========================================================================
    /// Source endpoint identity.
    pub uri_from: Uri,
    /// Destination endpoint identity.
    pub uri_to: Uri,
    /// Opaque authentication token of the sender.
    pub authentication_id: Blob,
    /// Milliseconds since the Unix epoch at send time.
    pub timestamp: u64,
    /// Delivery-quality hint.
    pub qos_level: QosLevel,
    /// Delivery priority hint.
    pub priority: u32,

    // =========================================================================
    // SESSION SECTION
    // =========================================================================
    /// Domain path the message applies to.
    pub domain: DomainPath,
    /// Network zone.
    pub network_zone: Identifier,
    /// Session category.
    pub session_type: SessionType,
    /// Session name.
    pub session_name: Identifier,

    // =========================================================================
    // INTERACTION SECTION
    // =========================================================================
    /// The interaction pattern this message belongs to.
    pub interaction: InteractionType,
    /// The stage within the pattern (see [`crate::structures::stage`]).
    pub stage: u8,
    /// Correlates this message to its in-flight interaction.
    pub transaction_id: TransactionId,
    /// Owning service of the operation.
    pub service: Identifier,
    /// Operation name.
    pub operation: Identifier,
    /// Service interface version.
    pub service_version: u8,
    /// True if the body carries a [`StandardError`] instead of a payload.
    pub is_error: bool,
}

/// The body of a MAL message, opaque to the interaction engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MessageBody {
    /// No payload (acks and deregistrations commonly carry none).
    #[default]
    Empty,
    /// An encoded application payload; decoding it is the application's
    /// concern, not the engine's.
    Data(Blob),
    /// A standard error, present iff the header's error flag is set.
    Error(StandardError),
}

/// One complete MAL message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalMessage {
    /// The protocol header.
    pub header: MessageHeader,
    /// The opaque body.
    pub body: MessageBody,
}

impl MalMessage {
    /// The standard error carried in the body, if this is an error message.
    #[must_use]
    pub fn error_body(&self) -> Option<&StandardError> {
        match &self.body {
            MessageBody::Error(err) => Some(err),
            _ => None,
        }
    }
}
