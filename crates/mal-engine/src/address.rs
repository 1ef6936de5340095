//! Bound-endpoint descriptors used when constructing outgoing headers.

use crate::ports::MessageSender;
use mal_types::{
    Blob, DomainPath, Identifier, OperationIdent, QosLevel, ScopeKey, SessionType, Uri,
};
use std::sync::Arc;

/// A bound local endpoint, as needed to derive return headers.
///
/// Never mutated after creation; providers keep one per endpoint they
/// answer on.
#[derive(Clone)]
pub struct Address {
    /// The endpoint replies are sent through.
    pub endpoint: Arc<dyn MessageSender>,
    /// The URI replies claim as their source.
    pub uri: Uri,
    /// Authentication token stamped on replies.
    pub authentication_id: Blob,
}

/// The static send-side details an outgoing header is built from.
///
/// One value per (endpoint, destination, session) combination; the
/// per-interaction pieces (operation, stage, transaction id, body) are
/// passed alongside it.
#[derive(Clone)]
pub struct SendDetails {
    /// The endpoint the message leaves through.
    pub endpoint: Arc<dyn MessageSender>,
    /// Source URI override; defaults to the endpoint's bound URI.
    pub uri_from: Option<Uri>,
    /// Direct peer destination (non-PUBSUB patterns).
    pub uri_to: Uri,
    /// Broker destination (PUBSUB patterns).
    pub broker_uri: Uri,
    /// Authentication token for outgoing headers.
    pub authentication_id: Blob,
    /// Delivery-quality hint.
    pub qos_level: QosLevel,
    /// Delivery priority hint.
    pub priority: u32,
    /// Domain the interaction applies to.
    pub domain: DomainPath,
    /// Network zone.
    pub network_zone: Identifier,
    /// Session category.
    pub session_type: SessionType,
    /// Session name.
    pub session_name: Identifier,
}

impl SendDetails {
    /// The publish/subscribe scope these details address.
    #[must_use]
    pub fn scope_key(&self) -> ScopeKey {
        ScopeKey {
            broker_uri: self.broker_uri.clone(),
            domain: self.domain.clone(),
            network_zone: self.network_zone.clone(),
            session_type: self.session_type,
            session_name: self.session_name.clone(),
        }
    }

    /// The source URI outgoing headers will carry.
    #[must_use]
    pub fn source_uri(&self) -> Uri {
        self.uri_from
            .clone()
            .unwrap_or_else(|| self.endpoint.local_uri())
    }

    /// The destination for one interaction of `op`: the broker for PUBSUB,
    /// the direct peer otherwise.
    #[must_use]
    pub fn destination_uri(&self, op: &OperationIdent) -> Uri {
        if op.interaction == mal_types::InteractionType::PubSub {
            self.broker_uri.clone()
        } else {
            self.uri_to.clone()
        }
    }
}
