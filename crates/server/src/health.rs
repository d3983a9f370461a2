use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use docent_core::config::AppConfig;
use docent_core::knowledge::KnowledgeBase;
use serde::Serialize;
use tracing::debug;

#[derive(Clone)]
pub struct HealthState {
    has_key: bool,
    has_file_id: bool,
    knowledge: Arc<KnowledgeBase>,
}

impl HealthState {
    pub fn new(config: &AppConfig, knowledge: Arc<KnowledgeBase>) -> Self {
        Self { has_key: config.has_api_key(), has_file_id: config.has_grounding_file(), knowledge }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// `ready` when completions can be attempted, `degraded` when the API key is missing.
    pub status: &'static str,
    pub has_key: bool,
    pub has_file_id: bool,
    pub rooms: usize,
    pub artworks: usize,
    pub checked_at: String,
}

pub fn router(config: &AppConfig, knowledge: Arc<KnowledgeBase>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState::new(config, knowledge))
}

/// Always answers 200: a missing credential degrades replies but the service stays up.
pub async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    let payload = HealthResponse {
        ok: true,
        status: if state.has_key { "ready" } else { "degraded" },
        has_key: state.has_key,
        has_file_id: state.has_file_id,
        rooms: state.knowledge.room_count(),
        artworks: state.knowledge.artwork_count(),
        checked_at: Utc::now().to_rfc3339(),
    };
    debug!(event_name = "system.health.checked", status = payload.status, "health checked");
    Json(payload)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, extract::State, http::Request, http::StatusCode, Json};
    use docent_core::config::AppConfig;
    use docent_core::knowledge::KnowledgeBase;
    use secrecy::SecretString;
    use tower::ServiceExt;

    use super::{health, router, HealthState};

    fn knowledge() -> Arc<KnowledgeBase> {
        Arc::new(KnowledgeBase::builtin().expect("builtin catalog"))
    }

    #[tokio::test]
    async fn health_reports_degraded_without_api_key() {
        let Json(payload) =
            health(State(HealthState::new(&AppConfig::default(), knowledge()))).await;

        assert!(payload.ok);
        assert_eq!(payload.status, "degraded");
        assert!(!payload.has_key);
        assert!(!payload.has_file_id);
        assert_eq!(payload.rooms, 5);
        assert_eq!(payload.artworks, 12);
    }

    #[tokio::test]
    async fn health_reports_configured_credentials() {
        let mut config = AppConfig::default();
        config.completion.api_key = Some(SecretString::from("sk-test".to_string()));
        config.completion.grounding_file_id = Some("file-abc".to_string());

        let response = router(&config, knowledge())
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health responds");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(payload["status"], "ready");
        assert_eq!(payload["has_key"], true);
        assert_eq!(payload["has_file_id"], true);
        assert!(payload["checked_at"].as_str().is_some());
    }
}
