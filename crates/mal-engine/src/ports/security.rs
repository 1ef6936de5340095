//! Access control boundary.

use async_trait::async_trait;
use mal_types::{MalMessage, StandardError};

/// Security hook applied to every outgoing message before it reaches the
/// transport.
///
/// An implementation may rewrite the message (e.g. stamp a fresh
/// authentication token) or reject it; a rejected message is never handed
/// to the transport and the rejection surfaces synchronously to the caller
/// that attempted the send.
#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Check (and possibly rewrite) one outgoing message.
    async fn check(&self, msg: MalMessage) -> Result<MalMessage, StandardError>;
}

/// Pass-through access control for deployments without a security provider.
pub struct PermissiveAccessControl;

#[async_trait]
impl AccessControl for PermissiveAccessControl {
    async fn check(&self, msg: MalMessage) -> Result<MalMessage, StandardError> {
        Ok(msg)
    }
}
