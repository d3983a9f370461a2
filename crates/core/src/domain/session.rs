use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::catalog::{ArtworkId, RoomId};
use crate::domain::conversation::{BoundedHistory, ConversationTurn, Persona};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    Idle,
    AwaitNavigateConfirm,
    AwaitDisclosureConfirm,
}

/// The single in-flight negotiation. The subject fields only exist while a negotiation does.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PendingStep {
    #[default]
    Idle,
    AwaitNavigateConfirm {
        room: RoomId,
        artwork: ArtworkId,
    },
    AwaitDisclosureConfirm {
        room: RoomId,
        artwork: ArtworkId,
    },
}

impl PendingStep {
    pub fn kind(&self) -> PendingKind {
        match self {
            Self::Idle => PendingKind::Idle,
            Self::AwaitNavigateConfirm { .. } => PendingKind::AwaitNavigateConfirm,
            Self::AwaitDisclosureConfirm { .. } => PendingKind::AwaitDisclosureConfirm,
        }
    }

    pub fn room(&self) -> Option<&RoomId> {
        match self {
            Self::Idle => None,
            Self::AwaitNavigateConfirm { room, .. } | Self::AwaitDisclosureConfirm { room, .. } => {
                Some(room)
            }
        }
    }

    pub fn artwork(&self) -> Option<&ArtworkId> {
        match self {
            Self::Idle => None,
            Self::AwaitNavigateConfirm { artwork, .. }
            | Self::AwaitDisclosureConfirm { artwork, .. } => Some(artwork),
        }
    }
}

/// Flat view of the pending negotiation, as exchanged with the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSnapshot {
    pub pending_step: PendingKind,
    pub pending_room: Option<RoomId>,
    pub pending_artwork_key: Option<ArtworkId>,
}

impl From<&PendingStep> for PendingSnapshot {
    fn from(step: &PendingStep) -> Self {
        Self {
            pending_step: step.kind(),
            pending_room: step.room().cloned(),
            pending_artwork_key: step.artwork().cloned(),
        }
    }
}

impl TryFrom<PendingSnapshot> for PendingStep {
    type Error = DomainError;

    fn try_from(snapshot: PendingSnapshot) -> Result<Self, Self::Error> {
        match (snapshot.pending_step, snapshot.pending_room, snapshot.pending_artwork_key) {
            (PendingKind::Idle, None, None) => Ok(Self::Idle),
            (PendingKind::AwaitNavigateConfirm, Some(room), Some(artwork)) => {
                Ok(Self::AwaitNavigateConfirm { room, artwork })
            }
            (PendingKind::AwaitDisclosureConfirm, Some(room), Some(artwork)) => {
                Ok(Self::AwaitDisclosureConfirm { room, artwork })
            }
            (step, room, artwork) => Err(DomainError::MalformedState {
                step,
                has_room: room.is_some(),
                has_artwork: artwork.is_some(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub current_room: RoomId,
    pub active_artwork: Option<ArtworkId>,
    pub pending: PendingStep,
    pub last_responder: Persona,
    pub visitor_name: Option<String>,
    pub history: BoundedHistory,
    /// Consecutive turns that re-asked the pending question without an answer.
    pub reask_count: u32,
}

impl SessionState {
    pub fn new(initial_room: RoomId, history_window: usize) -> Self {
        Self {
            current_room: initial_room,
            active_artwork: None,
            pending: PendingStep::Idle,
            // The opening exchange ends with the art guide, so ambiguous turns start with navigation.
            last_responder: Persona::Art,
            visitor_name: None,
            history: BoundedHistory::new(history_window),
            reask_count: 0,
        }
    }

    pub fn pending_kind(&self) -> PendingKind {
        self.pending.kind()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.pending, PendingStep::Idle)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_room: self.current_room.clone(),
            active_artwork: self.active_artwork.clone(),
            pending: PendingSnapshot::from(&self.pending),
            last_responder: self.last_responder,
            visitor_name: self.visitor_name.clone(),
            history: self.history.turns().cloned().collect(),
        }
    }

    /// Rebuilds a session from a snapshot. Callers validate untrusted snapshots first: an
    /// inconsistent pending negotiation panics in debug builds and resumes idle otherwise.
    pub fn restore(snapshot: SessionSnapshot, history_window: usize) -> Self {
        let pending = PendingStep::try_from(snapshot.pending);
        debug_assert!(pending.is_ok(), "restored a malformed session: {pending:?}");
        let pending = match pending {
            Ok(pending) => pending,
            Err(error) => {
                warn!(
                    event_name = "conversation.session.malformed_state",
                    error = %error,
                    "pending negotiation is inconsistent, resetting to idle"
                );
                PendingStep::Idle
            }
        };

        let mut history = BoundedHistory::new(history_window);
        for turn in snapshot.history {
            history.push(turn.speaker, turn.text);
        }

        Self {
            current_room: snapshot.current_room,
            active_artwork: snapshot.active_artwork,
            pending,
            last_responder: snapshot.last_responder,
            visitor_name: snapshot.visitor_name,
            history,
            reask_count: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub current_room: RoomId,
    pub active_artwork: Option<ArtworkId>,
    #[serde(flatten)]
    pub pending: PendingSnapshot,
    pub last_responder: Persona,
    pub visitor_name: Option<String>,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}
