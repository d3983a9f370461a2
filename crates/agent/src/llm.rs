use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use docent_core::config::CompletionConfig;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// One way of asking the completion service for a reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallShape {
    /// Responses endpoint with `file_search` over an uploaded grounding document.
    GroundedResponses { file_id: String },
    Responses,
    ChatCompletions,
}

impl CallShape {
    pub fn label(&self) -> &'static str {
        match self {
            Self::GroundedResponses { .. } => "responses_file_search",
            Self::Responses => "responses",
            Self::ChatCompletions => "chat_completions",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    pub user_turn: String,
}

/// Directive fields a backend reports alongside its text, when it can.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct StructuredDirectives {
    pub room: Option<String>,
    pub artwork: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionOutput {
    pub text: String,
    pub directives: Option<StructuredDirectives>,
}

impl CompletionOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), directives: None }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("credential `{0}` is not configured")]
    MissingCredential(&'static str),
    #[error("completion endpoint returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("completion transport failed: {0}")]
    Transport(String),
    #[error("completion response was malformed: {0}")]
    Malformed(String),
}

impl CompletionError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::Status { status: status.as_u16(), message: error.to_string() },
            None => Self::Transport(error.to_string()),
        }
    }
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn call(
        &self,
        shape: &CallShape,
        request: &CompletionRequest,
    ) -> Result<CompletionOutput, CompletionError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

/// OpenAI-compatible HTTP backend.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl OpenAiBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url, api_key })
    }

    pub fn from_config(config: &CompletionConfig) -> Result<Self, CompletionError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn bearer(&self) -> Result<String, CompletionError> {
        let key = self
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(CompletionError::MissingCredential("completion.api_key"))?;
        Ok(format!("Bearer {key}"))
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, CompletionError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .header("Authorization", self.bearer()?)
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    /// Uploads a document for `file_search` grounding.
    pub async fn upload_file(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<UploadedFile, CompletionError> {
        let part = Part::bytes(contents).file_name(file_name.to_string()).mime_str("application/json")?;
        let form = Form::new().text("purpose", "assistants").part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .header("Authorization", self.bearer()?)
            .multipart(form)
            .send()
            .await?;
        let raw = read_json(response).await?;
        serde_json::from_value(raw).map_err(|error| CompletionError::Malformed(error.to_string()))
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, CompletionError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(CompletionError::Status { status: status.as_u16(), message });
    }
    Ok(response.json::<Value>().await?)
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn call(
        &self,
        shape: &CallShape,
        request: &CompletionRequest,
    ) -> Result<CompletionOutput, CompletionError> {
        let body = request_body(shape, request);
        let raw = match shape {
            CallShape::GroundedResponses { .. } | CallShape::Responses => {
                self.post_json("responses", &body).await?
            }
            CallShape::ChatCompletions => self.post_json("chat/completions", &body).await?,
        };

        let text = match shape {
            CallShape::ChatCompletions => chat_text(&raw),
            _ => responses_text(&raw),
        }
        .ok_or_else(|| CompletionError::Malformed(format!("no text in {} reply", shape.label())))?;

        Ok(CompletionOutput::text(text))
    }
}

pub fn request_body(shape: &CallShape, request: &CompletionRequest) -> Value {
    let messages = json!([
        { "role": "system", "content": request.system_prompt },
        { "role": "user", "content": request.user_turn },
    ]);

    match shape {
        CallShape::GroundedResponses { file_id } => json!({
            "model": request.model,
            "input": messages,
            "tools": [{ "type": "file_search" }],
            "attachments": [{ "file_id": file_id, "tools": [{ "type": "file_search" }] }],
            "temperature": request.temperature,
        }),
        CallShape::Responses => json!({
            "model": request.model,
            "input": messages,
            "temperature": request.temperature,
        }),
        CallShape::ChatCompletions => json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
        }),
    }
}

/// `output_text` when present, else the first text chunk of the first output item.
pub fn responses_text(raw: &Value) -> Option<String> {
    if let Some(text) = raw["output_text"].as_str().filter(|text| !text.is_empty()) {
        return Some(text.to_string());
    }

    let chunk = &raw["output"][0]["content"][0];
    if chunk.is_null() {
        return raw.get("output").map(|_| String::new());
    }
    chunk["text"]
        .as_str()
        .or_else(|| chunk["text"]["value"].as_str())
        .map(str::to_string)
        .or(Some(String::new()))
}

pub fn chat_text(raw: &Value) -> Option<String> {
    let choice = raw["choices"].as_array()?.first()?;
    Some(choice["message"]["content"].as_str().unwrap_or_default().to_string())
}

/// Replays a fixed script of results and records every call it receives.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<CompletionOutput, CompletionError>>>,
    calls: Mutex<Vec<(CallShape, CompletionRequest)>>,
}

impl ScriptedBackend {
    pub fn new(script: impl IntoIterator<Item = Result<CompletionOutput, CompletionError>>) -> Self {
        Self { script: Mutex::new(script.into_iter().collect()), calls: Mutex::default() }
    }

    pub fn replies<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(texts.into_iter().map(|text| Ok(CompletionOutput::text(text))))
    }

    pub fn calls(&self) -> Vec<(CallShape, CompletionRequest)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn call(
        &self,
        shape: &CallShape,
        request: &CompletionRequest,
    ) -> Result<CompletionOutput, CompletionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((shape.clone(), request.clone()));
        }
        self.script
            .lock()
            .map_err(|_| CompletionError::Transport("script lock poisoned".to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Transport("script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::{
        chat_text, request_body, responses_text, CallShape, CompletionBackend, CompletionError,
        CompletionRequest, OpenAiBackend,
    };

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.4,
            system_prompt: "system".to_string(),
            user_turn: "User said: \"hi\"".to_string(),
        }
    }

    #[test]
    fn grounded_body_attaches_the_file_for_search() {
        let body =
            request_body(&CallShape::GroundedResponses { file_id: "file-1".into() }, &request());

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["input"][0]["role"], "system");
        assert_eq!(body["input"][1]["content"], "User said: \"hi\"");
        assert_eq!(body["tools"][0]["type"], "file_search");
        assert_eq!(body["attachments"][0]["file_id"], "file-1");
    }

    #[test]
    fn chat_body_uses_messages() {
        let body = request_body(&CallShape::ChatCompletions, &request());
        assert_eq!(body["messages"][0]["content"], "system");
        assert!(body.get("input").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn responses_text_prefers_output_text() {
        let raw = json!({ "output_text": "Hello there.", "output": [] });
        assert_eq!(responses_text(&raw).as_deref(), Some("Hello there."));
    }

    #[test]
    fn responses_text_reads_nested_chunks() {
        let plain = json!({ "output": [{ "content": [{ "type": "output_text", "text": "A" }] }] });
        let wrapped = json!({ "output": [{ "content": [{ "text": { "value": "B" } }] }] });

        assert_eq!(responses_text(&plain).as_deref(), Some("A"));
        assert_eq!(responses_text(&wrapped).as_deref(), Some("B"));
        assert_eq!(responses_text(&json!({ "error": "nope" })), None);
    }

    #[test]
    fn chat_text_reads_first_choice() {
        let raw = json!({ "choices": [{ "message": { "content": "Welcome." } }] });
        assert_eq!(chat_text(&raw).as_deref(), Some("Welcome."));
        assert_eq!(chat_text(&json!({ "choices": [] })), None);
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_a_network_call() {
        let backend = OpenAiBackend::new("http://127.0.0.1:9", None, Duration::from_secs(1))
            .expect("client builds");
        let error = backend
            .call(&CallShape::Responses, &request())
            .await
            .expect_err("no credential configured");
        assert_eq!(error, CompletionError::MissingCredential("completion.api_key"));
    }
}
