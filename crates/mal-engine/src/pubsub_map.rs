//! # Publish/Subscribe Registration Table
//!
//! Tracks the registration bookkeeping the correlation engine needs on both
//! sides of a broker: which listener receives NOTIFY deliveries for a scope
//! (consumer side) and which transaction id a local publisher registered
//! for a scope (publisher side). Filter evaluation and broker persistence
//! live with the broker, not here.

use crate::ports::InteractionListener;
use mal_types::{ScopeKey, TransactionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registration table for publish/subscribe scopes.
///
/// Two independent mappings, both keyed by [`ScopeKey`]; each mutation is
/// atomic under the owning map's mutex.
#[derive(Default)]
pub struct PubSubMap {
    /// Consumer-side subscription listeners, added on register, removed on
    /// deregister.
    notify_listeners: Mutex<HashMap<ScopeKey, Arc<dyn InteractionListener>>>,

    /// Local-publisher transaction id per scope, added on publish-register,
    /// removed on publish-deregister.
    publish_transactions: Mutex<HashMap<ScopeKey, TransactionId>>,
}

impl PubSubMap {
    /// Create an empty registration table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the NOTIFY listener for a scope, replacing any previous one.
    pub fn register_notify_listener(&self, key: ScopeKey, listener: Arc<dyn InteractionListener>) {
        debug!(broker = %key.broker_uri, session = %key.session_name, "notify listener registered");
        self.notify_listeners.lock().insert(key, listener);
    }

    /// Remove the NOTIFY listener for a scope.
    pub fn deregister_notify_listener(&self, key: &ScopeKey) -> Option<Arc<dyn InteractionListener>> {
        let removed = self.notify_listeners.lock().remove(key);
        if removed.is_some() {
            debug!(broker = %key.broker_uri, session = %key.session_name, "notify listener deregistered");
        }
        removed
    }

    /// The NOTIFY listener for a scope, if one is registered.
    #[must_use]
    pub fn notify_listener(&self, key: &ScopeKey) -> Option<Arc<dyn InteractionListener>> {
        self.notify_listeners.lock().get(key).cloned()
    }

    /// Record the publish transaction for a scope.
    ///
    /// Idempotent: a second registration for the same scope keeps the first
    /// transaction id. Returns the id retained for the scope.
    pub fn register_publish_transaction(
        &self,
        key: ScopeKey,
        id: TransactionId,
    ) -> TransactionId {
        let mut map = self.publish_transactions.lock();
        if let Some(existing) = map.get(&key) {
            debug!(
                broker = %key.broker_uri,
                transaction_id = %existing,
                "publish transaction already registered for scope, keeping it"
            );
            return *existing;
        }
        debug!(broker = %key.broker_uri, transaction_id = %id, "publish transaction registered");
        map.insert(key, id);
        id
    }

    /// The registered publish transaction for a scope, if any.
    #[must_use]
    pub fn publish_transaction(&self, key: &ScopeKey) -> Option<TransactionId> {
        self.publish_transactions.lock().get(key).copied()
    }

    /// True if the scope currently has a registered publisher.
    #[must_use]
    pub fn is_publish_registered(&self, key: &ScopeKey) -> bool {
        self.publish_transactions.lock().contains_key(key)
    }

    /// Remove the publish transaction for a scope.
    pub fn remove_publish_transaction(&self, key: &ScopeKey) -> Option<TransactionId> {
        let removed = self.publish_transactions.lock().remove(key);
        if let Some(id) = removed {
            debug!(broker = %key.broker_uri, transaction_id = %id, "publish transaction removed");
        }
        removed
    }

    /// Number of scopes with a registered NOTIFY listener.
    #[must_use]
    pub fn notify_listener_count(&self) -> usize {
        self.notify_listeners.lock().len()
    }
}
