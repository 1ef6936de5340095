//! # Core MAL Structures
//!
//! Identifiers, URIs, session descriptors, interaction patterns and the
//! per-pattern stage numbering carried in every message header.
//!
//! ## Clusters
//!
//! - **Naming**: [`Identifier`], [`Uri`], [`Blob`], [`DomainPath`]
//! - **Session**: [`SessionType`], [`QosLevel`]
//! - **Interaction**: [`InteractionType`], [`stage`], [`TransactionId`]
//! - **Keys**: [`ScopeKey`], [`OperationIdent`]

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// CLUSTER A: NAMING
// =============================================================================

/// An opaque MAL identifier (service names, session names, network zones,
/// domain segments).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Identifier(pub String);

impl Identifier {
    /// Create an identifier from anything string-like.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// The address of a MAL endpoint, opaque to the engine.
///
/// The concrete scheme (`rmi://`, `maltcp://`, in-process names) belongs to
/// the transport binding; the engine only compares and forwards URIs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Uri(pub String);

impl Uri {
    /// Create a URI from anything string-like.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The URI as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Uri {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// An opaque byte blob (authentication tokens, encoded bodies).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Blob(pub Vec<u8>);

impl Blob {
    /// Create a blob from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// True if the blob carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An ordered sequence of domain segments, e.g. `esa.missions.ops`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct DomainPath(pub Vec<Identifier>);

impl DomainPath {
    /// Build a domain path from its segments.
    pub fn new(segments: impl IntoIterator<Item = Identifier>) -> Self {
        Self(segments.into_iter().collect())
    }

    /// Convenience constructor from string segments.
    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        Self(segments.into_iter().map(Identifier::from).collect())
    }
}

impl fmt::Display for DomainPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            f.write_str(segment.as_str())?;
            first = false;
        }
        Ok(())
    }
}

// =============================================================================
// CLUSTER B: SESSION
// =============================================================================

/// The session category a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SessionType {
    /// Live operations session.
    #[default]
    Live,
    /// Simulation session.
    Simulation,
    /// Replay of recorded data.
    Replay,
}

/// Delivery-quality hint carried in the header, opaque to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QosLevel {
    /// No delivery guarantee.
    #[default]
    BestEffort,
    /// Guaranteed delivery.
    Assured,
    /// Guaranteed and queued while the consumer is offline.
    Queued,
    /// Guaranteed and timely, stale messages are dropped.
    Timely,
}

// =============================================================================
// CLUSTER C: INTERACTION
// =============================================================================

/// The six MAL interaction patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionType {
    /// One-way, no reply stages.
    Send,
    /// init -> ack.
    Submit,
    /// init -> response.
    Request,
    /// init -> ack -> response.
    Invoke,
    /// init -> ack -> update* -> response.
    Progress,
    /// Broker-mediated publish/subscribe control and delivery stages.
    PubSub,
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InteractionType::Send => "SEND",
            InteractionType::Submit => "SUBMIT",
            InteractionType::Request => "REQUEST",
            InteractionType::Invoke => "INVOKE",
            InteractionType::Progress => "PROGRESS",
            InteractionType::PubSub => "PUBSUB",
        };
        f.write_str(name)
    }
}

/// Interaction stage numbers, per pattern, as carried in the header.
///
/// The numbering follows the MAL book: stage 1 is always the initiation
/// message sent by the consumer, the remaining stages are provider replies
/// (or, for PUBSUB, further control round-trips).
pub mod stage {
    /// SEND has a single, unacknowledged stage.
    pub const SEND: u8 = 1;

    /// SUBMIT initiation.
    pub const SUBMIT: u8 = 1;
    /// SUBMIT acknowledgement (terminal).
    pub const SUBMIT_ACK: u8 = 2;

    /// REQUEST initiation.
    pub const REQUEST: u8 = 1;
    /// REQUEST response (terminal).
    pub const REQUEST_RESPONSE: u8 = 2;

    /// INVOKE initiation.
    pub const INVOKE: u8 = 1;
    /// INVOKE acknowledgement.
    pub const INVOKE_ACK: u8 = 2;
    /// INVOKE response (terminal).
    pub const INVOKE_RESPONSE: u8 = 3;

    /// PROGRESS initiation.
    pub const PROGRESS: u8 = 1;
    /// PROGRESS acknowledgement.
    pub const PROGRESS_ACK: u8 = 2;
    /// PROGRESS update (zero or more).
    pub const PROGRESS_UPDATE: u8 = 3;
    /// PROGRESS response (terminal).
    pub const PROGRESS_RESPONSE: u8 = 4;

    /// PUBSUB consumer subscription registration.
    pub const REGISTER: u8 = 1;
    /// Broker acknowledgement of REGISTER (terminal).
    pub const REGISTER_ACK: u8 = 2;
    /// PUBSUB publisher registration.
    pub const PUBLISH_REGISTER: u8 = 3;
    /// Broker acknowledgement of PUBLISH REGISTER (terminal).
    pub const PUBLISH_REGISTER_ACK: u8 = 4;
    /// Publisher update push, fire-and-forget.
    pub const PUBLISH: u8 = 5;
    /// Broker delivery to subscribed consumers.
    pub const NOTIFY: u8 = 6;
    /// PUBSUB consumer subscription removal.
    pub const DEREGISTER: u8 = 7;
    /// Broker acknowledgement of DEREGISTER (terminal).
    pub const DEREGISTER_ACK: u8 = 8;
    /// PUBSUB publisher deregistration.
    pub const PUBLISH_DEREGISTER: u8 = 9;
    /// Broker acknowledgement of PUBLISH DEREGISTER (terminal).
    pub const PUBLISH_DEREGISTER_ACK: u8 = 10;
}

/// Process-unique identifier for one in-flight interaction.
///
/// Minted when an interaction begins and stable for its lifetime; never
/// reused while a correlation record referencing it is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    /// Mint a fresh transaction identifier.
    #[must_use]
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// CLUSTER D: COMPOSITE KEYS
// =============================================================================

/// Identity of the operation an interaction belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationIdent {
    /// Owning service.
    pub service: Identifier,
    /// Operation name within the service.
    pub operation: Identifier,
    /// Service interface version.
    pub version: u8,
    /// The interaction pattern this operation uses.
    pub interaction: InteractionType,
}

/// The namespace of a publish/subscribe registration.
///
/// Two registrations are the same registration iff every component matches;
/// the composite is a value type so embedded delimiters in any component can
/// never collide two distinct scopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    /// The broker endpoint this registration was made against.
    pub broker_uri: Uri,
    /// Domain the registration applies to.
    pub domain: DomainPath,
    /// Network zone.
    pub network_zone: Identifier,
    /// Session category.
    pub session_type: SessionType,
    /// Session name.
    pub session_name: Identifier,
}
