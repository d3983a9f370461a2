use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use docent_agent::runtime::PersonaReply;
use docent_agent::{ConversationError, ConversationService, StartedSession, TurnOutcome};
use docent_core::domain::session::SessionSnapshot;
use docent_core::errors::InterfaceError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    conversations: Arc<ConversationService>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    /// Session to continue, as previously returned by `GET /api/v1/sessions/{id}`.
    #[serde(default)]
    pub resume: Option<SessionSnapshot>,
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatError {
    pub error: String,
    pub correlation_id: String,
    /// Fallback bubbles to show in place of the persona replies.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<PersonaReply>,
}

type ChatResult<T> = Result<T, (StatusCode, Json<ChatError>)>;

pub fn router(conversations: Arc<ConversationService>) -> Router {
    Router::new()
        .route("/api/v1/sessions", post(start_session))
        .route("/api/v1/sessions/{session_id}", get(session_snapshot).delete(end_session))
        .route("/api/v1/sessions/{session_id}/turns", post(send_turn))
        .with_state(ChatState { conversations })
}

pub async fn start_session(
    State(state): State<ChatState>,
    request: Option<Json<StartSessionRequest>>,
) -> ChatResult<(StatusCode, Json<StartedSession>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let resume = request.and_then(|Json(request)| request.resume);

    let started = state
        .conversations
        .start(resume)
        .await
        .map_err(|error| conversation_error(error, &correlation_id))?;
    Ok((StatusCode::CREATED, Json(started)))
}

pub async fn send_turn(
    Path(session_id): Path<Uuid>,
    State(state): State<ChatState>,
    Json(request): Json<TurnRequest>,
) -> ChatResult<Json<TurnOutcome>> {
    let correlation_id = Uuid::new_v4().to_string();
    info!(
        event_name = "conversation.turn.received",
        %correlation_id,
        %session_id,
        "visitor turn received"
    );

    state
        .conversations
        .send_turn(session_id, &request.message)
        .await
        .map(Json)
        .map_err(|error| conversation_error(error, &correlation_id))
}

pub async fn session_snapshot(
    Path(session_id): Path<Uuid>,
    State(state): State<ChatState>,
) -> ChatResult<Json<SessionSnapshot>> {
    let correlation_id = Uuid::new_v4().to_string();
    state
        .conversations
        .snapshot(session_id)
        .await
        .map(Json)
        .map_err(|error| conversation_error(error, &correlation_id))
}

pub async fn end_session(
    Path(session_id): Path<Uuid>,
    State(state): State<ChatState>,
) -> ChatResult<StatusCode> {
    let correlation_id = Uuid::new_v4().to_string();
    state
        .conversations
        .end(session_id)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|error| conversation_error(error, &correlation_id))
}

fn conversation_error(error: ConversationError, correlation_id: &str) -> (StatusCode, Json<ChatError>) {
    let (interface, replies) = match error {
        ConversationError::UnknownSession(session_id) => (
            InterfaceError::NotFound {
                message: format!("session `{session_id}` not found"),
                correlation_id: correlation_id.to_string(),
            },
            Vec::new(),
        ),
        ConversationError::EmptyUtterance => (
            InterfaceError::BadRequest {
                message: "message must not be empty".to_string(),
                correlation_id: correlation_id.to_string(),
            },
            Vec::new(),
        ),
        ConversationError::Rejected(error) => (error.into_interface(correlation_id), Vec::new()),
        ConversationError::Turn(failure) => {
            (failure.error.into_interface(correlation_id), failure.replies)
        }
    };

    warn!(
        event_name = "interface.request.failed",
        correlation_id = interface.correlation_id(),
        error = %interface,
        "chat request failed"
    );

    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ChatError {
        error: interface.user_message().to_string(),
        correlation_id: interface.correlation_id().to_string(),
        replies,
    };
    (status, Json(body))
}
