use thiserror::Error;
use tracing::info;

use crate::domain::catalog::ArtworkId;
use crate::domain::session::{PendingStep, SessionState};
use crate::flows::states::{NegotiationEvent, PersonaDirective, TransitionOutcome};
use crate::knowledge::KnowledgeBase;

pub const DEFAULT_MAX_REASKS: u32 = 3;

pub trait FlowDefinition {
    fn initial_state(&self) -> PendingStep;
    fn transition(
        &self,
        session: &SessionState,
        event: &NegotiationEvent,
        knowledge: &KnowledgeBase,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Two-step consent: permission to navigate, then permission to disclose.
#[derive(Clone, Debug)]
pub struct ConsentFlow {
    /// Unanswered re-asks tolerated before the negotiation is cancelled. Zero never cancels.
    pub max_reasks: u32,
}

impl Default for ConsentFlow {
    fn default() -> Self {
        Self { max_reasks: DEFAULT_MAX_REASKS }
    }
}

impl FlowDefinition for ConsentFlow {
    fn initial_state(&self) -> PendingStep {
        PendingStep::Idle
    }

    fn transition(
        &self,
        session: &SessionState,
        event: &NegotiationEvent,
        knowledge: &KnowledgeBase,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_consent(self.max_reasks, session, event, knowledge)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> PendingStep {
        self.flow.initial_state()
    }

    pub fn evaluate(
        &self,
        session: &SessionState,
        event: &NegotiationEvent,
        knowledge: &KnowledgeBase,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(session, event, knowledge)
    }

    /// Evaluates the event and commits the outcome to the session.
    pub fn apply(
        &self,
        session: &mut SessionState,
        event: &NegotiationEvent,
        knowledge: &KnowledgeBase,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let outcome = self.evaluate(session, event, knowledge)?;

        session.pending = outcome.to.clone();
        session.reask_count = outcome.reask_count;
        if let Some(room) = &outcome.commit_room {
            session.current_room = room.clone();
        }
        if let Some(artwork) = &outcome.reveal_artwork {
            session.active_artwork = Some(artwork.clone());
        }

        if outcome.consumed() {
            info!(
                event_name = "conversation.negotiation.transition",
                from = ?outcome.from,
                to = ?outcome.to.kind(),
                event = ?outcome.event,
                reasked = outcome.reasked,
                "negotiation transition applied"
            );
        }
        Ok(outcome)
    }
}

impl Default for FlowEngine<ConsentFlow> {
    fn default() -> Self {
        Self::new(ConsentFlow::default())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("cannot negotiate unknown artwork `{0}`")]
    UnknownArtwork(ArtworkId),
}

fn transition_consent(
    max_reasks: u32,
    session: &SessionState,
    event: &NegotiationEvent,
    knowledge: &KnowledgeBase,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use NegotiationEvent::{Affirmative, ArtworkRequested, Negative, Other};
    use PendingStep::{AwaitDisclosureConfirm, AwaitNavigateConfirm, Idle};

    let from = session.pending.kind();
    let outcome = |to: PendingStep, directive: Option<PersonaDirective>| TransitionOutcome {
        from,
        to,
        event: event.clone(),
        directive,
        commit_room: None,
        reveal_artwork: None,
        reasked: false,
        reask_count: 0,
    };

    let result = match (&session.pending, event) {
        (Idle, ArtworkRequested(key)) => {
            let artwork = knowledge
                .artwork(key)
                .ok_or_else(|| FlowTransitionError::UnknownArtwork(key.clone()))?;
            let room = artwork.room.clone();
            outcome(
                AwaitNavigateConfirm { room: room.clone(), artwork: key.clone() },
                Some(PersonaDirective::AskNavigatePermission { room, artwork: key.clone() }),
            )
        }
        (Idle, Affirmative | Negative | Other) => outcome(Idle, None),
        (AwaitNavigateConfirm { room, artwork }, Affirmative) => TransitionOutcome {
            commit_room: Some(room.clone()),
            ..outcome(
                AwaitDisclosureConfirm { room: room.clone(), artwork: artwork.clone() },
                Some(PersonaDirective::AskDisclosurePermission {
                    room: room.clone(),
                    artwork: artwork.clone(),
                }),
            )
        },
        (AwaitDisclosureConfirm { artwork, .. }, Affirmative) => TransitionOutcome {
            reveal_artwork: Some(artwork.clone()),
            ..outcome(Idle, Some(PersonaDirective::DescribeArtwork { artwork: artwork.clone() }))
        },
        (pending @ (AwaitNavigateConfirm { .. } | AwaitDisclosureConfirm { .. }), Negative) => {
            outcome(Idle, Some(cancellation(session, pending)))
        }
        (pending, ArtworkRequested(_) | Other) => {
            let reask_count = session.reask_count.saturating_add(1);
            if max_reasks > 0 && reask_count > max_reasks {
                outcome(Idle, Some(cancellation(session, pending)))
            } else {
                TransitionOutcome {
                    reasked: true,
                    reask_count,
                    ..outcome(pending.clone(), pending_question(pending))
                }
            }
        }
    };

    Ok(result)
}

fn cancellation(session: &SessionState, pending: &PendingStep) -> PersonaDirective {
    match pending {
        // The room was already committed when navigation was confirmed.
        PendingStep::AwaitDisclosureConfirm { room, .. } => {
            PersonaDirective::OfferNextSteps { room: room.clone() }
        }
        _ => PersonaDirective::OfferNextSteps { room: session.current_room.clone() },
    }
}

fn pending_question(pending: &PendingStep) -> Option<PersonaDirective> {
    match pending {
        PendingStep::Idle => None,
        PendingStep::AwaitNavigateConfirm { room, artwork } => {
            Some(PersonaDirective::AskNavigatePermission {
                room: room.clone(),
                artwork: artwork.clone(),
            })
        }
        PendingStep::AwaitDisclosureConfirm { room, artwork } => {
            Some(PersonaDirective::AskDisclosurePermission {
                room: room.clone(),
                artwork: artwork.clone(),
            })
        }
    }
}
