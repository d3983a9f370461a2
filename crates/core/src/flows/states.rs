use serde::{Deserialize, Serialize};

use crate::domain::catalog::{ArtworkId, RoomId};
use crate::domain::conversation::Persona;
use crate::domain::session::{PendingKind, PendingStep};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationEvent {
    ArtworkRequested(ArtworkId),
    Affirmative,
    Negative,
    /// Anything else the visitor says while a question is pending.
    Other,
}

/// What the orchestrator must ask a persona to say after a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaDirective {
    AskNavigatePermission { room: RoomId, artwork: ArtworkId },
    AskDisclosurePermission { room: RoomId, artwork: ArtworkId },
    OfferNextSteps { room: RoomId },
    DescribeArtwork { artwork: ArtworkId },
}

impl PersonaDirective {
    pub fn persona(&self) -> Persona {
        match self {
            Self::AskNavigatePermission { .. }
            | Self::AskDisclosurePermission { .. }
            | Self::OfferNextSteps { .. } => Persona::Nav,
            Self::DescribeArtwork { .. } => Persona::Art,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: PendingKind,
    pub to: PendingStep,
    pub event: NegotiationEvent,
    /// `None` when the event does not belong to a negotiation and the turn is routed normally.
    pub directive: Option<PersonaDirective>,
    pub commit_room: Option<RoomId>,
    pub reveal_artwork: Option<ArtworkId>,
    pub reasked: bool,
    pub reask_count: u32,
}

impl TransitionOutcome {
    pub fn consumed(&self) -> bool {
        self.directive.is_some()
    }
}
