use docent_core::domain::catalog::{ArtworkId, RoomId};
use docent_core::domain::conversation::Persona;

/// A state change proposed by a directive in model output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectiveProposal {
    MoveRoom { persona: Persona, room: RoomId, negotiated: bool },
    FocusArtwork { persona: Persona, artwork: ArtworkId, negotiated: bool },
}

impl DirectiveProposal {
    pub fn action_key(&self) -> &'static str {
        match self {
            Self::MoveRoom { .. } => "directive.move_room",
            Self::FocusArtwork { .. } => "directive.focus_artwork",
        }
    }

    fn negotiated(&self) -> bool {
        match self {
            Self::MoveRoom { negotiated, .. } | Self::FocusArtwork { negotiated, .. } => *negotiated,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectiveDecision {
    Allow,
    Deny { reason_code: &'static str },
}

/// Decides which model directives may touch session state. The model never reveals an
/// artwork; only the negotiation does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectivePolicy {
    pub art_persona_can_navigate: bool,
}

impl Default for DirectivePolicy {
    fn default() -> Self {
        Self { art_persona_can_navigate: false }
    }
}

impl DirectivePolicy {
    pub fn evaluate(&self, proposal: &DirectiveProposal) -> DirectiveDecision {
        if proposal.negotiated() {
            return DirectiveDecision::Deny { reason_code: "negotiation_owns_state" };
        }

        match proposal {
            DirectiveProposal::MoveRoom { persona: Persona::Art, .. }
                if !self.art_persona_can_navigate =>
            {
                DirectiveDecision::Deny { reason_code: "art_persona_cannot_navigate" }
            }
            DirectiveProposal::MoveRoom { .. } | DirectiveProposal::FocusArtwork { .. } => {
                DirectiveDecision::Allow
            }
        }
    }
}
