//! # Error Types
//!
//! The MAL standard error model plus the engine-level error taxonomy.

use crate::structures::{TransactionId, Uri};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The MAL standard error numbers.
///
/// These are the wire-level numbers defined by the MAL book; they travel in
/// error bodies and must survive round-trips through any transport binding.
pub mod error_number {
    /// Message delivery failed.
    pub const DELIVERY_FAILED: u64 = 65536;
    /// Message delivery timed out.
    pub const DELIVERY_TIMEDOUT: u64 = 65537;
    /// Message delivery delayed.
    pub const DELIVERY_DELAYED: u64 = 65538;
    /// Destination endpoint unknown.
    pub const DESTINATION_UNKNOWN: u64 = 65539;
    /// Destination temporarily unreachable.
    pub const DESTINATION_TRANSIENT: u64 = 65540;
    /// Destination permanently lost.
    pub const DESTINATION_LOST: u64 = 65541;
    /// Authentication of the message failed.
    pub const AUTHENTICATION_FAIL: u64 = 65542;
    /// Sender not authorised for the operation.
    pub const AUTHORISATION_FAIL: u64 = 65543;
    /// Encryption or decryption failed.
    pub const ENCRYPTION_FAIL: u64 = 65544;
    /// Service area not supported by the peer.
    pub const UNSUPPORTED_AREA: u64 = 65545;
    /// Operation not supported by the peer.
    pub const UNSUPPORTED_OPERATION: u64 = 65546;
    /// Service version not supported by the peer.
    pub const UNSUPPORTED_VERSION: u64 = 65547;
    /// Message body could not be decoded.
    pub const BAD_ENCODING: u64 = 65548;
    /// Internal error in the peer.
    pub const INTERNAL: u64 = 65549;
    /// Unknown error.
    pub const UNKNOWN: u64 = 65550;
    /// Message received in an illegal interaction state.
    pub const INCORRECT_STATE: u64 = 65551;
    /// Too many outstanding operations at the peer.
    pub const TOO_MANY: u64 = 65552;
    /// The peer is shutting down.
    pub const SHUTDOWN: u64 = 65553;
}

/// A MAL standard error as carried in an error-flagged message body.
///
/// This is a wire value, not a Rust error in its own right; it surfaces to
/// callers wrapped in [`MalError::Interaction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardError {
    /// One of the [`error_number`] constants (or a service-defined number).
    pub error_number: u64,
    /// Optional human-readable detail.
    pub extra_information: Option<String>,
}

impl std::fmt::Display for StandardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MAL error {} ({})", self.error_number, self.name())?;
        if let Some(info) = &self.extra_information {
            write!(f, ": {info}")?;
        }
        Ok(())
    }
}

impl StandardError {
    /// Create an error with no extra information.
    #[must_use]
    pub fn new(error_number: u64) -> Self {
        Self {
            error_number,
            extra_information: None,
        }
    }

    /// Create an error carrying extra information.
    pub fn with_info(error_number: u64, info: impl Into<String>) -> Self {
        Self {
            error_number,
            extra_information: Some(info.into()),
        }
    }

    /// An `INCORRECT_STATE` protocol-violation error.
    #[must_use]
    pub fn incorrect_state() -> Self {
        Self::new(error_number::INCORRECT_STATE)
    }

    /// A `BAD_ENCODING` error with detail.
    pub fn bad_encoding(info: impl Into<String>) -> Self {
        Self::with_info(error_number::BAD_ENCODING, info)
    }

    /// A `DELIVERY_FAILED` error with detail.
    pub fn delivery_failed(info: impl Into<String>) -> Self {
        Self::with_info(error_number::DELIVERY_FAILED, info)
    }

    /// The symbolic name of a standard error number, `SERVICE_DEFINED`
    /// for anything outside the standard range.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.error_number {
            error_number::DELIVERY_FAILED => "DELIVERY_FAILED",
            error_number::DELIVERY_TIMEDOUT => "DELIVERY_TIMEDOUT",
            error_number::DELIVERY_DELAYED => "DELIVERY_DELAYED",
            error_number::DESTINATION_UNKNOWN => "DESTINATION_UNKNOWN",
            error_number::DESTINATION_TRANSIENT => "DESTINATION_TRANSIENT",
            error_number::DESTINATION_LOST => "DESTINATION_LOST",
            error_number::AUTHENTICATION_FAIL => "AUTHENTICATION_FAIL",
            error_number::AUTHORISATION_FAIL => "AUTHORISATION_FAIL",
            error_number::ENCRYPTION_FAIL => "ENCRYPTION_FAIL",
            error_number::UNSUPPORTED_AREA => "UNSUPPORTED_AREA",
            error_number::UNSUPPORTED_OPERATION => "UNSUPPORTED_OPERATION",
            error_number::UNSUPPORTED_VERSION => "UNSUPPORTED_VERSION",
            error_number::BAD_ENCODING => "BAD_ENCODING",
            error_number::INTERNAL => "INTERNAL",
            error_number::UNKNOWN => "UNKNOWN",
            error_number::INCORRECT_STATE => "INCORRECT_STATE",
            error_number::TOO_MANY => "TOO_MANY",
            error_number::SHUTDOWN => "SHUTDOWN",
            _ => "SERVICE_DEFINED",
        }
    }
}

/// Errors reported by a transport binding when sending.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The destination endpoint cannot be reached.
    #[error("destination unreachable: {uri}")]
    Unreachable {
        /// The URI that could not be reached.
        uri: Uri,
    },

    /// The transport failed to transmit the message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}

/// Errors surfaced by the interaction engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalError {
    /// The peer terminated the interaction with a standard error, or the
    /// interaction was terminated locally by a protocol violation.
    #[error("interaction failed: {0}")]
    Interaction(StandardError),

    /// The transport could not deliver an outgoing message.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The security hook rejected an outgoing message; it was never handed
    /// to the transport.
    #[error("security check rejected message: {0}")]
    Security(StandardError),

    /// No live correlation record for the transaction.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(TransactionId),

    /// The blocking waiter for this transaction was already claimed.
    #[error("response already claimed for transaction: {0}")]
    AlreadyWaited(TransactionId),

    /// `publish` was attempted for a scope with no registered publish
    /// transaction.
    #[error("no publish registration for broker {broker}")]
    PublishNotRegistered {
        /// The broker the publish was aimed at.
        broker: Uri,
    },

    /// An inbound raw message could not be decoded.
    #[error("bad encoding: {0}")]
    BadEncoding(String),

    /// The terminal message carried an error flag but no error body.
    #[error("error-flagged message without an error body")]
    MissingErrorBody,
}

impl MalError {
    /// The standard error carried by this error, if any.
    #[must_use]
    pub fn standard_error(&self) -> Option<&StandardError> {
        match self {
            MalError::Interaction(err) | MalError::Security(err) => Some(err),
            _ => None,
        }
    }
}
