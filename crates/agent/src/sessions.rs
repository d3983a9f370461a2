use std::collections::HashMap;
use std::sync::Arc;

use docent_core::domain::session::{SessionSnapshot, SessionState};
use docent_core::errors::ApplicationError;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::runtime::{AgentRuntime, PersonaReply, TurnFailure, TurnOutcome};

type SharedSession = Arc<Mutex<SessionState>>;

/// Live conversations. Each session sits behind its own mutex so turns run one at a time.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionRegistry {
    pub async fn insert(&self, session: SessionState) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StartedSession {
    pub session_id: Uuid,
    pub replies: Vec<PersonaReply>,
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("unknown session `{0}`")]
    UnknownSession(Uuid),
    #[error("message must not be empty")]
    EmptyUtterance,
    #[error(transparent)]
    Rejected(ApplicationError),
    #[error(transparent)]
    Turn(#[from] TurnFailure),
}

pub struct ConversationService {
    runtime: Arc<AgentRuntime>,
    registry: SessionRegistry,
}

impl ConversationService {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime, registry: SessionRegistry::default() }
    }

    pub fn runtime(&self) -> &Arc<AgentRuntime> {
        &self.runtime
    }

    /// Opens a conversation, or resumes one from a snapshot without replaying the welcome.
    pub async fn start(
        &self,
        resume: Option<SessionSnapshot>,
    ) -> Result<StartedSession, ConversationError> {
        let (session, replies) = match resume {
            Some(snapshot) => {
                let session =
                    self.runtime.restore_session(snapshot).map_err(ConversationError::Rejected)?;
                (session, Vec::new())
            }
            None => self.runtime.open_session(),
        };

        let session_id = self.registry.insert(session).await;
        info!(event_name = "conversation.session.started", %session_id, "session started");
        Ok(StartedSession { session_id, replies })
    }

    pub async fn send_turn(
        &self,
        session_id: Uuid,
        utterance: &str,
    ) -> Result<TurnOutcome, ConversationError> {
        if utterance.trim().is_empty() {
            return Err(ConversationError::EmptyUtterance);
        }
        let session = self
            .registry
            .get(&session_id)
            .await
            .ok_or(ConversationError::UnknownSession(session_id))?;

        let mut state = session.lock().await;
        Ok(self.runtime.send_turn(&mut state, utterance).await?)
    }

    pub async fn snapshot(&self, session_id: Uuid) -> Result<SessionSnapshot, ConversationError> {
        let session = self
            .registry
            .get(&session_id)
            .await
            .ok_or(ConversationError::UnknownSession(session_id))?;
        let state = session.lock().await;
        Ok(state.snapshot())
    }

    pub async fn end(&self, session_id: Uuid) -> Result<(), ConversationError> {
        if self.registry.remove(&session_id).await {
            info!(event_name = "conversation.session.ended", %session_id, "session ended");
            Ok(())
        } else {
            Err(ConversationError::UnknownSession(session_id))
        }
    }

    pub async fn active_sessions(&self) -> usize {
        self.registry.len().await
    }
}
