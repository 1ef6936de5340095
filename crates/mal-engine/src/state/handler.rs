//! The per-transaction operation handler.
//!
//! One handler instance tracks one in-flight interaction. Stage validation
//! happens in [`OperationHandler::handle_stage`] under the handler's own
//! lock; the resulting [`StageDecision`] is then acted on by
//! [`OperationHandler::process_stage`] with no lock held, so listener
//! callbacks can themselves start new interactions without deadlocking.

use crate::ports::InteractionListener;
use crate::state::pattern::{CallbackClass, PatternKind};
use mal_types::{MalError, MalMessage, MessageHeader, StandardError};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// How the caller of an interaction wants to learn about its stages.
pub enum CompletionMode {
    /// The caller blocks on `wait_for_response` and receives only the
    /// terminal message; intermediate stages are bookkeeping.
    Synchronous,
    /// Every stage is delivered through the listener as it arrives.
    Asynchronous(Arc<dyn InteractionListener>),
}

/// Result channel payload for synchronous interactions.
pub(crate) type WaitResult = Result<MalMessage, MalError>;

/// The completion notifier chosen at creation time.
enum Notifier {
    /// Blocking-wait slot; the sender is consumed by the single terminal
    /// signal.
    Slot(Mutex<Option<oneshot::Sender<WaitResult>>>),
    /// Listener handle for asynchronous delivery.
    Listener(Arc<dyn InteractionListener>),
}

/// The two booleans every pattern's graph projects onto.
#[derive(Default)]
struct StageState {
    received_ack: bool,
    received_response: bool,
}

/// What `handle_stage` decided, to be acted on outside the lock.
pub(crate) enum StageDecision {
    /// Deliver the stage (or its violation error) to the notifier.
    Deliver {
        msg: MalMessage,
        class: CallbackClass,
        terminal: bool,
        /// Set when the stage violated the pattern graph; the interaction
        /// is terminated with this error instead of the message payload.
        violation: Option<StandardError>,
    },
    /// The interaction was already terminal; the stage is dropped.
    AlreadyTerminal { msg: MalMessage },
}

/// State machine for one in-flight interaction.
pub struct OperationHandler {
    kind: PatternKind,
    notifier: Notifier,
    state: Mutex<StageState>,
}

impl OperationHandler {
    /// Create a handler whose terminal stage resolves a blocking waiter.
    pub(crate) fn new_synchronous(kind: PatternKind) -> (Self, oneshot::Receiver<WaitResult>) {
        let (tx, rx) = oneshot::channel();
        let handler = Self {
            kind,
            notifier: Notifier::Slot(Mutex::new(Some(tx))),
            state: Mutex::new(StageState::default()),
        };
        (handler, rx)
    }

    /// Create a handler that delivers every stage through `listener`.
    pub(crate) fn new_asynchronous(kind: PatternKind, listener: Arc<dyn InteractionListener>) -> Self {
        Self {
            kind,
            notifier: Notifier::Listener(listener),
            state: Mutex::new(StageState::default()),
        }
    }

    /// Reconstruct a handler from a mid-sequence snapshot.
    ///
    /// `last_stage` is the last stage already observed for the transaction;
    /// if it implies the ack went by, the handler starts with its ack
    /// projection set so the next update/response is legal.
    pub(crate) fn resumed(
        kind: PatternKind,
        last_stage: u8,
        listener: Arc<dyn InteractionListener>,
    ) -> Self {
        let handler = Self::new_asynchronous(kind, listener);
        handler.state.lock().received_ack = kind.stage_implies_ack(last_stage);
        handler
    }

    /// True once the interaction has reached a terminal stage (or was
    /// terminated by a violation or transport error).
    pub fn finished(&self) -> bool {
        self.state.lock().received_response
    }

    /// Validate one inbound stage and update the handler state.
    ///
    /// Must be followed by [`Self::process_stage`] on the returned
    /// decision; the split keeps listener callbacks outside this lock.
    pub(crate) fn handle_stage(&self, msg: MalMessage) -> StageDecision {
        let mut st = self.state.lock();
        if st.received_response {
            return StageDecision::AlreadyTerminal { msg };
        }

        match self.kind.transition(st.received_ack, &msg.header) {
            Some(transition) => {
                if transition.class == CallbackClass::Ack {
                    st.received_ack = true;
                }
                if transition.terminal {
                    st.received_response = true;
                }
                StageDecision::Deliver {
                    msg,
                    class: transition.class,
                    terminal: transition.terminal,
                    violation: None,
                }
            }
            None => {
                // Out-of-graph stage: terminate the transaction with
                // INCORRECT_STATE, surfaced on the ack side iff no ack was
                // seen yet.
                let class = if st.received_ack {
                    CallbackClass::Response
                } else {
                    CallbackClass::Ack
                };
                st.received_response = true;
                warn!(
                    transaction_id = %msg.header.transaction_id,
                    interaction = %msg.header.interaction,
                    stage = msg.header.stage,
                    is_error = msg.header.is_error,
                    "unexpected stage for interaction state, terminating transaction"
                );
                StageDecision::Deliver {
                    msg,
                    class,
                    terminal: true,
                    violation: Some(StandardError::incorrect_state()),
                }
            }
        }
    }

    /// Act on a [`StageDecision`]: unblock the waiter or invoke the
    /// listener. No handler or table lock is held here.
    pub(crate) async fn process_stage(&self, decision: StageDecision) {
        let (msg, class, terminal, violation) = match decision {
            StageDecision::AlreadyTerminal { msg } => {
                warn!(
                    transaction_id = %msg.header.transaction_id,
                    stage = msg.header.stage,
                    "stage arrived after terminal state, dropping"
                );
                return;
            }
            StageDecision::Deliver {
                msg,
                class,
                terminal,
                violation,
            } => (msg, class, terminal, violation),
        };

        match &self.notifier {
            Notifier::Slot(_) => {
                if let Some(err) = violation {
                    self.signal(Err(MalError::Interaction(err)));
                } else if terminal {
                    self.signal(Ok(msg));
                } else {
                    debug!(
                        transaction_id = %msg.header.transaction_id,
                        stage = msg.header.stage,
                        "intermediate stage recorded for synchronous interaction"
                    );
                }
            }
            Notifier::Listener(listener) => {
                let header = &msg.header;
                if let Some(err) = &violation {
                    Self::deliver_error(listener.as_ref(), class, header, err).await;
                } else if header.is_error {
                    let err = msg.error_body().cloned().unwrap_or_else(|| {
                        StandardError::bad_encoding("error-flagged message without an error body")
                    });
                    Self::deliver_error(listener.as_ref(), class, header, &err).await;
                } else {
                    match class {
                        CallbackClass::Ack => listener.ack_received(header, &msg.body).await,
                        CallbackClass::Update => listener.update_received(header, &msg.body).await,
                        CallbackClass::Response => {
                            listener.response_received(header, &msg.body).await;
                        }
                    }
                }
            }
        }
    }

    /// Terminate the interaction with a transport-level failure unrelated
    /// to a well-formed reply.
    ///
    /// Chooses ack-error vs response-error the same way a violation does
    /// and, for synchronous mode, unblocks the waiter with the synthetic
    /// error.
    pub(crate) async fn handle_error(&self, header: &MessageHeader, error: StandardError) {
        let was_acked = {
            let mut st = self.state.lock();
            if st.received_response {
                debug!(
                    transaction_id = %header.transaction_id,
                    "transport error after terminal state, ignoring"
                );
                return;
            }
            st.received_response = true;
            st.received_ack
        };

        match &self.notifier {
            Notifier::Slot(_) => self.signal(Err(MalError::Interaction(error))),
            Notifier::Listener(listener) => {
                let class = if was_acked {
                    CallbackClass::Response
                } else {
                    CallbackClass::Ack
                };
                Self::deliver_error(listener.as_ref(), class, header, &error).await;
            }
        }
    }

    async fn deliver_error(
        listener: &dyn InteractionListener,
        class: CallbackClass,
        header: &MessageHeader,
        error: &StandardError,
    ) {
        match class {
            CallbackClass::Ack => listener.ack_error_received(header, error).await,
            CallbackClass::Update => listener.update_error_received(header, error).await,
            CallbackClass::Response => listener.response_error_received(header, error).await,
        }
    }

    /// Resolve the blocking waiter. At most one signal ever lands; later
    /// calls find the slot empty and drop the result.
    fn signal(&self, result: WaitResult) {
        let Notifier::Slot(slot) = &self.notifier else {
            return;
        };
        let Some(sender) = slot.lock().take() else {
            debug!("terminal result already signalled, dropping duplicate");
            return;
        };
        if sender.send(result).is_err() {
            debug!("waiter gone before terminal result, dropping");
        }
    }
}
