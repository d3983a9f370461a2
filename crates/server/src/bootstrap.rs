use std::sync::Arc;

use axum::Router;
use docent_agent::llm::{CompletionBackend, CompletionError, OpenAiBackend};
use docent_agent::{AgentRuntime, ConversationService};
use docent_core::config::AppConfig;
use docent_core::errors::ApplicationError;
use docent_core::knowledge::{KnowledgeBase, KnowledgeError};
use thiserror::Error;
use tracing::{info, warn};

use crate::{chat, health};

pub struct Application {
    pub config: AppConfig,
    pub knowledge: Arc<KnowledgeBase>,
    pub conversations: Arc<ConversationService>,
}

impl Application {
    pub fn router(&self) -> Router {
        chat::router(self.conversations.clone()).merge(health::router(
            &self.config,
            self.knowledge.clone(),
        ))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("catalog could not be loaded: {0}")]
    Knowledge(#[from] KnowledgeError),
    #[error("completion client could not be built: {0}")]
    Backend(#[source] CompletionError),
    #[error("conversation runtime rejected the configuration: {0}")]
    Runtime(#[source] ApplicationError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let backend = OpenAiBackend::from_config(&config.completion).map_err(BootstrapError::Backend)?;
    bootstrap_with_backend(config, Arc::new(backend))
}

pub fn bootstrap_with_backend(
    config: AppConfig,
    backend: Arc<dyn CompletionBackend>,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    for credential in config.missing_credentials() {
        warn!(
            event_name = "system.config.credential_missing",
            correlation_id = "bootstrap",
            credential,
            "credential not configured; affected completion calls will degrade"
        );
    }

    let knowledge = Arc::new(KnowledgeBase::from_config(&config.knowledge)?);
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        rooms = knowledge.room_count(),
        artworks = knowledge.artwork_count(),
        source = if config.knowledge.path.is_some() { "file" } else { "builtin" },
        "museum catalog loaded"
    );

    let runtime = AgentRuntime::from_config(&config, knowledge.clone(), backend)
        .map_err(BootstrapError::Runtime)?;

    Ok(Application {
        config,
        knowledge,
        conversations: Arc::new(ConversationService::new(Arc::new(runtime))),
    })
}
