//! The closed set of consumer-side interaction patterns and their legal
//! stage-transition tables.

use mal_types::{stage, InteractionType, MessageHeader};

/// The pattern an [`super::OperationHandler`] is driving.
///
/// PUBSUB contributes four distinct single-round-trip control operations;
/// everything else maps one-to-one onto its interaction type. SEND never
/// creates a handler (nothing to correlate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// `init -> ack`, ack terminal.
    Submit,
    /// `init -> response`, response terminal.
    Request,
    /// `init -> ack -> response`; an error ack is terminal.
    Invoke,
    /// `init -> ack -> update* -> response`; error ack or error update is
    /// terminal.
    Progress,
    /// A PUBSUB control round-trip, `init -> ack` shaped like SUBMIT.
    PubSubOp(PubSubOp),
}

/// The four PUBSUB control operations tracked by the correlation table.
///
/// `publish` itself is fire-and-forget and never enters the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PubSubOp {
    /// Consumer subscription registration.
    Register,
    /// Consumer subscription removal.
    Deregister,
    /// Publisher registration.
    PublishRegister,
    /// Publisher deregistration.
    PublishDeregister,
}

impl PubSubOp {
    /// The initiation stage number of this control operation.
    #[must_use]
    pub fn init_stage(self) -> u8 {
        match self {
            PubSubOp::Register => stage::REGISTER,
            PubSubOp::Deregister => stage::DEREGISTER,
            PubSubOp::PublishRegister => stage::PUBLISH_REGISTER,
            PubSubOp::PublishDeregister => stage::PUBLISH_DEREGISTER,
        }
    }

    /// The terminal acknowledgement stage of this control operation.
    #[must_use]
    pub fn ack_stage(self) -> u8 {
        match self {
            PubSubOp::Register => stage::REGISTER_ACK,
            PubSubOp::Deregister => stage::DEREGISTER_ACK,
            PubSubOp::PublishRegister => stage::PUBLISH_REGISTER_ACK,
            PubSubOp::PublishDeregister => stage::PUBLISH_DEREGISTER_ACK,
        }
    }
}

/// Which listener callback pair a validated stage is delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallbackClass {
    Ack,
    Update,
    Response,
}

/// A legal transition out of the handler's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    /// Delivery target for the stage.
    pub class: CallbackClass,
    /// True if this stage ends the interaction.
    pub terminal: bool,
}

impl PatternKind {
    /// Resolve the pattern started by `initial_stage` of `interaction`.
    ///
    /// Returns `None` for stages that do not initiate a correlated
    /// interaction (SEND, PUBLISH, NOTIFY, reply stages).
    #[must_use]
    pub fn from_initial(interaction: InteractionType, initial_stage: u8) -> Option<Self> {
        match (interaction, initial_stage) {
            (InteractionType::Submit, stage::SUBMIT) => Some(PatternKind::Submit),
            (InteractionType::Request, stage::REQUEST) => Some(PatternKind::Request),
            (InteractionType::Invoke, stage::INVOKE) => Some(PatternKind::Invoke),
            (InteractionType::Progress, stage::PROGRESS) => Some(PatternKind::Progress),
            (InteractionType::PubSub, stage::REGISTER) => {
                Some(PatternKind::PubSubOp(PubSubOp::Register))
            }
            (InteractionType::PubSub, stage::DEREGISTER) => {
                Some(PatternKind::PubSubOp(PubSubOp::Deregister))
            }
            (InteractionType::PubSub, stage::PUBLISH_REGISTER) => {
                Some(PatternKind::PubSubOp(PubSubOp::PublishRegister))
            }
            (InteractionType::PubSub, stage::PUBLISH_DEREGISTER) => {
                Some(PatternKind::PubSubOp(PubSubOp::PublishDeregister))
            }
            _ => None,
        }
    }

    /// The interaction type this pattern's messages must carry.
    #[must_use]
    pub fn interaction(&self) -> InteractionType {
        match self {
            PatternKind::Submit => InteractionType::Submit,
            PatternKind::Request => InteractionType::Request,
            PatternKind::Invoke => InteractionType::Invoke,
            PatternKind::Progress => InteractionType::Progress,
            PatternKind::PubSubOp(_) => InteractionType::PubSub,
        }
    }

    /// True if `last_stage` implies the ack has already been observed, for
    /// handlers reconstructed from a mid-sequence snapshot.
    #[must_use]
    pub fn stage_implies_ack(&self, last_stage: u8) -> bool {
        match self {
            PatternKind::Invoke => last_stage == stage::INVOKE_ACK,
            PatternKind::Progress => {
                last_stage == stage::PROGRESS_ACK || last_stage == stage::PROGRESS_UPDATE
            }
            _ => false,
        }
    }

    /// The legal-transition table.
    ///
    /// Given the ack projection of the handler state and an incoming
    /// non-terminal-state header, returns the transition to apply, or
    /// `None` when the stage violates the pattern's graph.
    pub(crate) fn transition(&self, received_ack: bool, header: &MessageHeader) -> Option<Transition> {
        if header.interaction != self.interaction() {
            return None;
        }

        match self {
            PatternKind::Submit => (!received_ack && header.stage == stage::SUBMIT_ACK)
                .then_some(Transition {
                    class: CallbackClass::Ack,
                    terminal: true,
                }),

            PatternKind::Request => (header.stage == stage::REQUEST_RESPONSE).then_some(
                Transition {
                    class: CallbackClass::Response,
                    terminal: true,
                },
            ),

            PatternKind::Invoke => {
                if !received_ack {
                    (header.stage == stage::INVOKE_ACK).then_some(Transition {
                        class: CallbackClass::Ack,
                        // An error ack means no response will follow.
                        terminal: header.is_error,
                    })
                } else {
                    (header.stage == stage::INVOKE_RESPONSE).then_some(Transition {
                        class: CallbackClass::Response,
                        terminal: true,
                    })
                }
            }

            PatternKind::Progress => {
                if !received_ack {
                    (header.stage == stage::PROGRESS_ACK).then_some(Transition {
                        class: CallbackClass::Ack,
                        terminal: header.is_error,
                    })
                } else if header.stage == stage::PROGRESS_UPDATE {
                    Some(Transition {
                        class: CallbackClass::Update,
                        // An error update ends the stream early.
                        terminal: header.is_error,
                    })
                } else if header.stage == stage::PROGRESS_RESPONSE {
                    Some(Transition {
                        class: CallbackClass::Response,
                        terminal: true,
                    })
                } else {
                    None
                }
            }

            PatternKind::PubSubOp(op) => (!received_ack && header.stage == op.ack_stage())
                .then_some(Transition {
                    class: CallbackClass::Ack,
                    terminal: true,
                }),
        }
    }
}
