//! # Transaction Correlation Table
//!
//! Maps transaction identifiers to their pending interactions. This is one
//! of the two shared mutable structures in the engine (the other being the
//! publish/subscribe registration table); every mutation happens under a
//! single mutex, and listener callbacks always run after the lock is
//! released.

use crate::ports::InteractionListener;
use crate::state::{CompletionMode, OperationHandler, PatternKind, WaitResult};
use mal_types::{MalError, MalMessage, MessageHeader, StandardError, TransactionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Correlation table for in-flight interactions.
///
/// Owned explicitly by the send orchestrator and the inbound dispatcher
/// (shared via `Arc`); its lifecycle matches the owning endpoint, not the
/// process.
#[derive(Default)]
pub struct InteractionMap {
    /// Live transaction records. At most one entry per id; removed exactly
    /// once, on the first access that observes the handler finished.
    transactions: Mutex<HashMap<TransactionId, Arc<OperationHandler>>>,

    /// Unclaimed blocking waiters for synchronous transactions.
    ///
    /// Kept separate from the handler record so a terminal result delivered
    /// *before* `wait_for_response` is called survives the reaping of the
    /// transaction entry and still resolves the waiter immediately.
    pending_waits: Mutex<HashMap<TransactionId, oneshot::Receiver<WaitResult>>>,
}

impl InteractionMap {
    /// Create an empty correlation table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a transaction id and register a handler for it.
    ///
    /// Safe under concurrent calls from many consumer tasks.
    pub fn create_transaction(&self, kind: PatternKind, mode: CompletionMode) -> TransactionId {
        let id = TransactionId::mint();
        let handler = match mode {
            CompletionMode::Synchronous => {
                let (handler, rx) = OperationHandler::new_synchronous(kind);
                self.pending_waits.lock().insert(id, rx);
                handler
            }
            CompletionMode::Asynchronous(listener) => {
                OperationHandler::new_asynchronous(kind, listener)
            }
        };
        self.transactions.lock().insert(id, Arc::new(handler));
        debug!(transaction_id = %id, ?kind, "transaction created");
        id
    }

    /// Register a handler reconstructed from a mid-sequence snapshot: the
    /// interaction already exists at the peer and `last_stage` was the last
    /// stage observed for it.
    pub fn resume_transaction(
        &self,
        id: TransactionId,
        kind: PatternKind,
        last_stage: u8,
        listener: Arc<dyn InteractionListener>,
    ) {
        let handler = OperationHandler::resumed(kind, last_stage, listener);
        self.transactions.lock().insert(id, Arc::new(handler));
        debug!(transaction_id = %id, ?kind, last_stage, "transaction resumed from snapshot");
    }

    /// Await the terminal message of a synchronous transaction.
    ///
    /// Resolves immediately if the terminal result was delivered before the
    /// wait began. Returns exactly once per transaction id; a second wait
    /// observes [`MalError::AlreadyWaited`] (or `UnknownTransaction` once
    /// the record is gone). The returned future is cancel-safe, so callers
    /// may wrap it in `tokio::time::timeout`.
    pub async fn wait_for_response(&self, id: TransactionId) -> Result<MalMessage, MalError> {
        let receiver = self.pending_waits.lock().remove(&id);
        let Some(receiver) = receiver else {
            if self.transactions.lock().contains_key(&id) {
                return Err(MalError::AlreadyWaited(id));
            }
            return Err(MalError::UnknownTransaction(id));
        };

        match receiver.await {
            Ok(result) => result,
            // Sender dropped without signalling: the transaction was
            // cancelled out from under the waiter.
            Err(_) => Err(MalError::UnknownTransaction(id)),
        }
    }

    /// Route one inbound message to its transaction.
    ///
    /// Unknown or late transaction ids are dropped with a diagnostic; that
    /// is not an engine error.
    pub async fn on_message(&self, msg: MalMessage) {
        let id = msg.header.transaction_id;
        let handler = self.transactions.lock().get(&id).cloned();
        let Some(handler) = handler else {
            warn!(
                transaction_id = %id,
                interaction = %msg.header.interaction,
                stage = msg.header.stage,
                "no live transaction for inbound stage, dropping"
            );
            return;
        };

        let decision = handler.handle_stage(msg);
        handler.process_stage(decision).await;
        self.reap_if_finished(id, &handler);
    }

    /// Terminate a transaction with a transport-level failure (decode
    /// failure attributed to it, peer unreachable, ...).
    pub async fn handle_error(&self, header: &MessageHeader, error: StandardError) {
        let id = header.transaction_id;
        let handler = self.transactions.lock().get(&id).cloned();
        let Some(handler) = handler else {
            warn!(transaction_id = %id, %error, "transport error for unknown transaction, dropping");
            return;
        };

        handler.handle_error(header, error).await;
        self.reap_if_finished(id, &handler);
    }

    /// Remove a transaction mid-flight (send failure, caller cancellation).
    ///
    /// Race-safe against a concurrent `on_message` for the same id:
    /// whichever wins, the loser observes an unknown transaction and drops
    /// silently.
    pub fn cancel_transaction(&self, id: TransactionId) -> bool {
        let removed = self.transactions.lock().remove(&id).is_some();
        self.pending_waits.lock().remove(&id);
        if removed {
            debug!(transaction_id = %id, "transaction cancelled");
        }
        removed
    }

    /// Number of live transaction records.
    #[must_use]
    pub fn live_transactions(&self) -> usize {
        self.transactions.lock().len()
    }

    fn reap_if_finished(&self, id: TransactionId, handler: &Arc<OperationHandler>) {
        if handler.finished() && self.transactions.lock().remove(&id).is_some() {
            debug!(transaction_id = %id, "transaction finished, record reaped");
        }
    }
}
