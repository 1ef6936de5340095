//! # MAL Interaction Engine
//!
//! Drives the six MAL interaction patterns (SEND, SUBMIT, REQUEST, INVOKE,
//! PROGRESS, PUBSUB) over any pluggable byte transport: validates stage
//! sequences, correlates replies to the call that triggered them, and
//! exposes both a blocking and a callback-based consumer API from one
//! state machine.
//!
//! ## Architecture
//!
//! ```text
//! caller ──→ [MessageSend] ──security check──→ transport.send()
//!                 │ mints
//!                 ▼
//!        [InteractionMap] ←──────────────┐
//!        [PubSubMap]                     │ on_message / notify
//!                 ▲                      │
//!                 └── [InboundDispatcher] ←──decode── raw bytes
//! ```
//!
//! The two tables are the only shared mutable state; they are owned
//! explicitly and passed by handle into the send and receive halves at
//! construction, so their lifecycle follows the owning endpoint rather
//! than the process.
//!
//! ## Concurrency Contract
//!
//! - Any number of tasks may initiate interactions and dispatch inbound
//!   messages concurrently.
//! - Only [`InteractionMap::wait_for_response`] suspends its caller, and it
//!   is cancel-safe (wrap it in `tokio::time::timeout` for deadlines).
//! - Listener callbacks run outside every engine lock; starting a new
//!   interaction from inside a callback is safe.

pub mod address;
pub mod interaction_map;
pub mod ports;
pub mod pubsub_map;
pub mod receive;
pub mod send;
pub mod state;

// Re-export main types
pub use address::{Address, SendDetails};
pub use interaction_map::InteractionMap;
pub use ports::{
    AccessControl, InteractionListener, MessageDecoder, MessageSender, PermissiveAccessControl,
    ReceptionChannel,
};
pub use pubsub_map::PubSubMap;
pub use receive::InboundDispatcher;
pub use send::MessageSend;
pub use state::{CompletionMode, OperationHandler, PatternKind, PubSubOp};
