use std::sync::Arc;

use docent_core::config::CompletionConfig;
use docent_core::errors::ApplicationError;
use tracing::{error, warn};

use crate::llm::{CallShape, CompletionBackend, CompletionError, CompletionOutput, CompletionRequest};
use crate::prompt::BuiltPrompt;

#[derive(Clone, Debug, PartialEq)]
pub struct InvokerSettings {
    pub model: String,
    pub temperature: f32,
    pub grounding_file_id: Option<String>,
}

impl InvokerSettings {
    pub fn from_config(config: &CompletionConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            grounding_file_id: config.grounding_file_id.clone(),
        }
    }
}

impl Default for InvokerSettings {
    fn default() -> Self {
        Self { model: "gpt-4o-mini".to_string(), temperature: 0.4, grounding_file_id: None }
    }
}

/// Sends one prompt through the fallback chain. First success wins; there are no retries.
#[derive(Clone)]
pub struct CompletionInvoker {
    backend: Arc<dyn CompletionBackend>,
    settings: InvokerSettings,
}

impl CompletionInvoker {
    pub fn new(backend: Arc<dyn CompletionBackend>, settings: InvokerSettings) -> Self {
        Self { backend, settings }
    }

    pub fn chain(&self) -> Vec<CallShape> {
        let mut chain = Vec::with_capacity(3);
        if let Some(file_id) = &self.settings.grounding_file_id {
            chain.push(CallShape::GroundedResponses { file_id: file_id.clone() });
        }
        chain.push(CallShape::Responses);
        chain.push(CallShape::ChatCompletions);
        chain
    }

    pub async fn invoke(&self, prompt: &BuiltPrompt) -> Result<CompletionOutput, ApplicationError> {
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            system_prompt: prompt.system_prompt.clone(),
            user_turn: prompt.user_turn.clone(),
        };

        let mut last_error = None;
        for shape in self.chain() {
            match self.backend.call(&shape, &request).await {
                Ok(output) => return Ok(output),
                Err(failure) => {
                    warn!(
                        event_name = "completion.attempt_failed",
                        shape = shape.label(),
                        status = ?failure.status(),
                        error = %failure,
                        "completion attempt failed, trying next call shape"
                    );
                    last_error = Some(failure);
                }
            }
        }

        error!(
            event_name = "completion.exhausted",
            model = %self.settings.model,
            error = ?last_error,
            "every completion call shape failed"
        );
        Err(match last_error {
            Some(CompletionError::MissingCredential(name)) => {
                ApplicationError::ConfigMissing(name.to_string())
            }
            Some(failure) => ApplicationError::CompletionServiceFailure {
                status: failure.status(),
                message: failure.to_string(),
            },
            None => ApplicationError::CompletionServiceFailure {
                status: None,
                message: "no call shape attempted".to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docent_core::errors::ApplicationError;

    use super::{CompletionInvoker, InvokerSettings};
    use crate::llm::{CallShape, CompletionError, CompletionOutput, ScriptedBackend};
    use crate::prompt::BuiltPrompt;

    fn prompt() -> BuiltPrompt {
        BuiltPrompt { system_prompt: "rules".to_string(), user_turn: "User said: \"hi\"".to_string() }
    }

    fn grounded() -> InvokerSettings {
        InvokerSettings { grounding_file_id: Some("file-9".to_string()), ..InvokerSettings::default() }
    }

    fn unavailable() -> Result<CompletionOutput, CompletionError> {
        Err(CompletionError::Status { status: 503, message: "overloaded".to_string() })
    }

    #[tokio::test]
    async fn first_success_short_circuits_the_chain() {
        let backend = Arc::new(ScriptedBackend::replies(["Welcome!"]));
        let invoker = CompletionInvoker::new(backend.clone(), grounded());

        let output = invoker.invoke(&prompt()).await.expect("grounded call succeeds");

        assert_eq!(output.text, "Welcome!");
        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, CallShape::GroundedResponses { file_id: "file-9".to_string() });
        assert_eq!(calls[0].1.model, "gpt-4o-mini");
        assert!((calls[0].1.temperature - 0.4).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn failures_fall_through_in_order() {
        let backend = Arc::new(ScriptedBackend::new([
            unavailable(),
            unavailable(),
            Ok(CompletionOutput::text("From chat.")),
        ]));
        let invoker = CompletionInvoker::new(backend.clone(), grounded());

        let output = invoker.invoke(&prompt()).await.expect("chat completions succeeds");

        assert_eq!(output.text, "From chat.");
        let shapes = backend.calls().into_iter().map(|(shape, _)| shape).collect::<Vec<_>>();
        assert_eq!(
            shapes,
            vec![
                CallShape::GroundedResponses { file_id: "file-9".to_string() },
                CallShape::Responses,
                CallShape::ChatCompletions,
            ]
        );
    }

    #[tokio::test]
    async fn grounded_shape_is_skipped_without_a_file() {
        let backend = Arc::new(ScriptedBackend::replies(["ok"]));
        let invoker = CompletionInvoker::new(backend.clone(), InvokerSettings::default());

        invoker.invoke(&prompt()).await.expect("responses call succeeds");
        assert_eq!(backend.calls()[0].0, CallShape::Responses);
        assert_eq!(invoker.chain().len(), 2);
    }

    #[tokio::test]
    async fn exhaustion_reports_the_last_failure() {
        let backend = Arc::new(ScriptedBackend::new([
            unavailable(),
            Err(CompletionError::Status { status: 429, message: "slow down".to_string() }),
        ]));
        let invoker = CompletionInvoker::new(backend, InvokerSettings::default());

        let error = invoker.invoke(&prompt()).await.expect_err("chain exhausted");
        assert!(matches!(
            error,
            ApplicationError::CompletionServiceFailure { status: Some(429), ref message }
                if message.contains("slow down")
        ));
    }

    #[tokio::test]
    async fn missing_credential_degrades_to_config_missing() {
        let backend = Arc::new(ScriptedBackend::new(
            (0..3).map(|_| Err(CompletionError::MissingCredential("completion.api_key"))),
        ));
        let invoker = CompletionInvoker::new(backend, grounded());

        let error = invoker.invoke(&prompt()).await.expect_err("no key");
        assert_eq!(error, ApplicationError::ConfigMissing("completion.api_key".to_string()));
    }
}
