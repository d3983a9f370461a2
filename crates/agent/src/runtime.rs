use std::sync::Arc;

use docent_core::config::{AppConfig, ConversationConfig};
use docent_core::domain::catalog::{ArtworkId, RoomId};
use docent_core::domain::conversation::{Persona, Speaker};
use docent_core::domain::session::{PendingKind, PendingStep, SessionSnapshot, SessionState};
use docent_core::errors::{ApplicationError, DomainError};
use docent_core::flows::{ConsentFlow, FlowEngine, FlowTransitionError};
use docent_core::knowledge::KnowledgeBase;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::guardrails::{DirectiveDecision, DirectivePolicy, DirectiveProposal};
use crate::intent::{select_responder, Intent, IntentClassifier};
use crate::invoker::{CompletionInvoker, InvokerSettings};
use crate::llm::CompletionBackend;
use crate::prompt::{name_followup_message, name_greeting_message, PromptBuilder};
use crate::sanitizer::{Extraction, OutputSanitizer};

pub const SERVICE_APOLOGY: &str =
    "Sorry, I couldn't reach the guide service just now. Please try again.";

pub const NAV_OPENING: &str = "Hi! Welcome to the museum. I'm the Tour Guide.";
pub const ART_OPENING: &str = "Hello! I'm the Art Guide. Ask me about any masterpiece.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub initial_room: RoomId,
    pub history_window: usize,
    pub max_reasks: u32,
}

impl RuntimeSettings {
    pub fn from_config(config: &ConversationConfig) -> Self {
        Self {
            initial_room: RoomId::new(config.initial_room.trim().to_ascii_lowercase()),
            history_window: config.history_window,
            max_reasks: config.max_reasks,
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default().conversation)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PersonaReply {
    pub persona: Persona,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    pub intent: &'static str,
    pub replies: Vec<PersonaReply>,
    pub room_changed: Option<RoomId>,
    pub artwork_revealed: Option<ArtworkId>,
    pub current_room: RoomId,
    pub pending_step: PendingKind,
}

/// A turn that could not be completed. The session is left exactly as it was.
#[derive(Clone, Debug, Error)]
#[error("turn failed: {error}")]
pub struct TurnFailure {
    /// Apology bubbles for each persona that was meant to reply.
    pub replies: Vec<PersonaReply>,
    pub error: ApplicationError,
}

impl TurnFailure {
    fn new(personas: &[Persona], error: ApplicationError) -> Self {
        let replies = personas
            .iter()
            .map(|persona| PersonaReply { persona: *persona, text: SERVICE_APOLOGY.to_string() })
            .collect();
        Self { replies, error }
    }
}

struct PlannedCall {
    persona: Persona,
    message: String,
}

struct TurnPlan {
    calls: Vec<PlannedCall>,
    negotiated: bool,
    room_changed: Option<RoomId>,
    artwork_revealed: Option<ArtworkId>,
}

/// The dialogue orchestrator: classify, negotiate, prompt, invoke, sanitize, commit.
pub struct AgentRuntime {
    knowledge: Arc<KnowledgeBase>,
    classifier: IntentClassifier,
    flow: FlowEngine<ConsentFlow>,
    prompts: PromptBuilder,
    invoker: CompletionInvoker,
    sanitizer: OutputSanitizer,
    directives: DirectivePolicy,
    settings: RuntimeSettings,
}

impl AgentRuntime {
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        invoker: CompletionInvoker,
        settings: RuntimeSettings,
    ) -> Result<Self, ApplicationError> {
        if knowledge.room(&settings.initial_room).is_none() {
            return Err(DomainError::UnknownRoom(settings.initial_room.to_string()).into());
        }

        Ok(Self {
            classifier: IntentClassifier::new(knowledge.clone()),
            flow: FlowEngine::new(ConsentFlow { max_reasks: settings.max_reasks }),
            prompts: PromptBuilder::new(knowledge.clone()),
            sanitizer: OutputSanitizer::new(knowledge.clone()),
            directives: DirectivePolicy::default(),
            knowledge,
            invoker,
            settings,
        })
    }

    /// Wires a runtime from loaded configuration around the given backend.
    pub fn from_config(
        config: &AppConfig,
        knowledge: Arc<KnowledgeBase>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Result<Self, ApplicationError> {
        let invoker =
            CompletionInvoker::new(backend, InvokerSettings::from_config(&config.completion));
        Self::new(knowledge, invoker, RuntimeSettings::from_config(&config.conversation))
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    /// A fresh session with both personas' welcome lines already in its history.
    pub fn open_session(&self) -> (SessionState, Vec<PersonaReply>) {
        let mut session =
            SessionState::new(self.settings.initial_room.clone(), self.settings.history_window);
        let replies = vec![
            PersonaReply { persona: Persona::Nav, text: NAV_OPENING.to_string() },
            PersonaReply { persona: Persona::Art, text: ART_OPENING.to_string() },
        ];
        for reply in &replies {
            session.history.push(reply.persona, reply.text.clone());
        }
        (session, replies)
    }

    pub fn restore_session(&self, snapshot: SessionSnapshot) -> Result<SessionState, ApplicationError> {
        if self.knowledge.room(&snapshot.current_room).is_none() {
            return Err(DomainError::UnknownRoom(snapshot.current_room.to_string()).into());
        }
        if let Some(artwork) = &snapshot.active_artwork {
            if self.knowledge.artwork(artwork).is_none() {
                return Err(DomainError::UnknownArtwork(artwork.to_string()).into());
            }
        }

        let pending = PendingStep::try_from(snapshot.pending.clone())?;
        if let (Some(room), Some(artwork)) = (pending.room(), pending.artwork()) {
            if self.knowledge.room(room).is_none() {
                return Err(DomainError::UnknownRoom(room.to_string()).into());
            }
            let record = self
                .knowledge
                .artwork(artwork)
                .ok_or_else(|| DomainError::UnknownArtwork(artwork.to_string()))?;
            if record.room != *room {
                return Err(DomainError::PendingRoomMismatch {
                    room: room.to_string(),
                    artwork: artwork.to_string(),
                }
                .into());
            }
        }

        Ok(SessionState::restore(snapshot, self.settings.history_window))
    }

    /// Runs one visitor turn. The session is only modified when every completion call succeeds.
    pub async fn send_turn(
        &self,
        session: &mut SessionState,
        utterance: &str,
    ) -> Result<TurnOutcome, TurnFailure> {
        let utterance = utterance.trim();
        let mut draft = session.clone();
        let intent = self.classifier.classify(utterance, &draft);
        draft.history.push(Speaker::Visitor, utterance);

        let plan = self.plan(&mut draft, &intent, utterance).map_err(|error| {
            warn!(event_name = "conversation.turn.rejected", intent = intent.label(), error = %error, "turn rejected");
            TurnFailure::new(&[], error)
        })?;

        let prompts = plan
            .calls
            .iter()
            .map(|call| self.prompts.build(call.persona, &draft, &call.message))
            .collect::<Vec<_>>();
        let results = join_all(prompts.iter().map(|prompt| self.invoker.invoke(prompt))).await;

        let mut outputs = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(output) => outputs.push(output),
                Err(error) => {
                    let personas = plan.calls.iter().map(|call| call.persona).collect::<Vec<_>>();
                    warn!(
                        event_name = "conversation.turn.failed",
                        intent = intent.label(),
                        error = %error,
                        "completion failed, session left unchanged"
                    );
                    return Err(TurnFailure::new(&personas, error));
                }
            }
        }

        let mut room_changed = plan.room_changed;
        let mut replies = Vec::with_capacity(outputs.len());
        for (call, output) in plan.calls.iter().zip(outputs) {
            let extraction = self.sanitizer.extract(&output);
            if let Some(room) = self.apply_directives(&mut draft, call.persona, plan.negotiated, &extraction) {
                room_changed = Some(room);
            }
            draft.history.push(call.persona, extraction.clean_text.clone());
            draft.last_responder = call.persona;
            replies.push(PersonaReply { persona: call.persona, text: extraction.clean_text });
        }

        *session = draft;
        info!(
            event_name = "conversation.turn.completed",
            intent = intent.label(),
            replies = replies.len(),
            room = %session.current_room,
            pending = ?session.pending_kind(),
            "turn completed"
        );

        Ok(TurnOutcome {
            intent: intent.label(),
            replies,
            room_changed,
            artwork_revealed: plan.artwork_revealed,
            current_room: session.current_room.clone(),
            pending_step: session.pending_kind(),
        })
    }

    fn plan(
        &self,
        draft: &mut SessionState,
        intent: &Intent,
        utterance: &str,
    ) -> Result<TurnPlan, ApplicationError> {
        if !draft.is_idle() || matches!(intent, Intent::ArtworkRequest(_)) {
            let room_before = draft.current_room.clone();
            let outcome = self
                .flow
                .apply(draft, &intent.negotiation_event(), &self.knowledge)
                .map_err(|error| match error {
                    FlowTransitionError::UnknownArtwork(artwork) => {
                        ApplicationError::from(DomainError::UnknownArtwork(artwork.to_string()))
                    }
                })?;

            let calls = outcome
                .directive
                .iter()
                .map(|directive| PlannedCall {
                    persona: directive.persona(),
                    message: self.prompts.directive_message(directive),
                })
                .collect();
            return Ok(TurnPlan {
                calls,
                negotiated: true,
                room_changed: outcome.commit_room.filter(|room| *room != room_before),
                artwork_revealed: outcome.reveal_artwork,
            });
        }

        let routed = |persona: Persona, message: String| TurnPlan {
            calls: vec![PlannedCall { persona, message }],
            negotiated: false,
            room_changed: None,
            artwork_revealed: None,
        };

        let plan = match intent {
            Intent::NameDeclaration(name) => {
                draft.visitor_name = Some(name.clone());
                TurnPlan {
                    calls: vec![
                        PlannedCall { persona: Persona::Nav, message: name_greeting_message(name) },
                        PlannedCall { persona: Persona::Art, message: name_followup_message(name) },
                    ],
                    negotiated: false,
                    room_changed: None,
                    artwork_revealed: None,
                }
            }
            Intent::RoomRequest(room) if *room != draft.current_room => {
                draft.current_room = room.clone();
                TurnPlan {
                    room_changed: Some(room.clone()),
                    ..routed(Persona::Nav, self.prompts.room_move_message(draft, utterance))
                }
            }
            _ => {
                let persona = select_responder(utterance, intent, draft.last_responder);
                routed(persona, utterance.to_string())
            }
        };
        Ok(plan)
    }

    /// Applies permitted directives from one reply. Returns the room moved to, if any.
    fn apply_directives(
        &self,
        draft: &mut SessionState,
        persona: Persona,
        negotiated: bool,
        extraction: &Extraction,
    ) -> Option<RoomId> {
        let mut moved = None;

        if let Some(room) = &extraction.directives.room {
            let proposal = DirectiveProposal::MoveRoom { persona, room: room.clone(), negotiated };
            match self.directives.evaluate(&proposal) {
                DirectiveDecision::Allow if *room != draft.current_room => {
                    draft.current_room = room.clone();
                    moved = Some(room.clone());
                }
                DirectiveDecision::Allow => {}
                DirectiveDecision::Deny { reason_code } => debug!(
                    event_name = "conversation.directive.suppressed",
                    action = proposal.action_key(),
                    reason_code,
                    "room directive suppressed"
                ),
            }
        }

        if let Some(artwork) = &extraction.directives.artwork {
            let proposal =
                DirectiveProposal::FocusArtwork { persona, artwork: artwork.clone(), negotiated };
            match self.directives.evaluate(&proposal) {
                DirectiveDecision::Allow => draft.active_artwork = Some(artwork.clone()),
                DirectiveDecision::Deny { reason_code } => debug!(
                    event_name = "conversation.directive.suppressed",
                    action = proposal.action_key(),
                    reason_code,
                    "artwork directive suppressed"
                ),
            }
        }

        moved
    }
}
