use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::conversation::DEFAULT_HISTORY_WINDOW;
use crate::flows::DEFAULT_MAX_REASKS;

pub const DEFAULT_CONFIG_FILE: &str = "docent.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub completion: CompletionConfig,
    pub conversation: ConversationConfig,
    pub knowledge: KnowledgeConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct CompletionConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Uploaded catalog file used to ground the first call shape.
    pub grounding_file_id: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub history_window: usize,
    pub max_reasks: u32,
    pub initial_room: String,
}

#[derive(Clone, Debug, Default)]
pub struct KnowledgeConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub grounding_file_id: Option<String>,
    pub knowledge_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            completion: CompletionConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                temperature: 0.4,
                grounding_file_id: None,
                timeout_secs: 30,
            },
            conversation: ConversationConfig {
                history_window: DEFAULT_HISTORY_WINDOW,
                max_reasks: DEFAULT_MAX_REASKS,
                initial_room: "entrance".to_string(),
            },
            knowledge: KnowledgeConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3001,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Credentials whose absence degrades completion calls without stopping startup.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.has_api_key() {
            missing.push("completion.api_key");
        }
        missing
    }

    pub fn has_api_key(&self) -> bool {
        self.completion
            .api_key
            .as_ref()
            .map(|value| !value.expose_secret().trim().is_empty())
            .unwrap_or(false)
    }

    pub fn has_grounding_file(&self) -> bool {
        self.completion.grounding_file_id.is_some()
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(completion) = patch.completion {
            if let Some(api_key_value) = completion.api_key {
                self.completion.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = completion.base_url {
                self.completion.base_url = base_url;
            }
            if let Some(model) = completion.model {
                self.completion.model = model;
            }
            if let Some(temperature) = completion.temperature {
                self.completion.temperature = temperature;
            }
            if let Some(grounding_file_id) = completion.grounding_file_id {
                self.completion.grounding_file_id = Some(grounding_file_id);
            }
            if let Some(timeout_secs) = completion.timeout_secs {
                self.completion.timeout_secs = timeout_secs;
            }
        }

        if let Some(conversation) = patch.conversation {
            if let Some(history_window) = conversation.history_window {
                self.conversation.history_window = history_window;
            }
            if let Some(max_reasks) = conversation.max_reasks {
                self.conversation.max_reasks = max_reasks;
            }
            if let Some(initial_room) = conversation.initial_room {
                self.conversation.initial_room = initial_room;
            }
        }

        if let Some(knowledge) = patch.knowledge {
            if let Some(path) = knowledge.path {
                self.knowledge.path = Some(path);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let api_key =
            read_env("DOCENT_COMPLETION_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.completion.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("DOCENT_COMPLETION_BASE_URL") {
            self.completion.base_url = value;
        }
        if let Some(value) = read_env("DOCENT_COMPLETION_MODEL") {
            self.completion.model = value;
        }
        if let Some(value) = read_env("DOCENT_COMPLETION_TEMPERATURE") {
            self.completion.temperature = parse_f32("DOCENT_COMPLETION_TEMPERATURE", &value)?;
        }
        let grounding = read_env("DOCENT_COMPLETION_GROUNDING_FILE_ID")
            .or_else(|| read_env("ASSISTANTS_FILE_ID"));
        if let Some(value) = grounding {
            self.completion.grounding_file_id = Some(value);
        }
        if let Some(value) = read_env("DOCENT_COMPLETION_TIMEOUT_SECS") {
            self.completion.timeout_secs = parse_u64("DOCENT_COMPLETION_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("DOCENT_CONVERSATION_HISTORY_WINDOW") {
            self.conversation.history_window =
                parse_usize("DOCENT_CONVERSATION_HISTORY_WINDOW", &value)?;
        }
        if let Some(value) = read_env("DOCENT_CONVERSATION_MAX_REASKS") {
            self.conversation.max_reasks = parse_u32("DOCENT_CONVERSATION_MAX_REASKS", &value)?;
        }
        if let Some(value) = read_env("DOCENT_CONVERSATION_INITIAL_ROOM") {
            self.conversation.initial_room = value;
        }

        if let Some(value) = read_env("DOCENT_KNOWLEDGE_PATH") {
            self.knowledge.path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("DOCENT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("DOCENT_SERVER_PORT").or_else(|| read_env("PORT"));
        if let Some(value) = port {
            self.server.port = parse_u16("DOCENT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("DOCENT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DOCENT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("DOCENT_LOGGING_LEVEL").or_else(|| read_env("DOCENT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("DOCENT_LOGGING_FORMAT").or_else(|| read_env("DOCENT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_key) = overrides.api_key {
            self.completion.api_key = Some(secret_value(api_key));
        }
        if let Some(model) = overrides.model {
            self.completion.model = model;
        }
        if let Some(grounding_file_id) = overrides.grounding_file_id {
            self.completion.grounding_file_id = Some(grounding_file_id);
        }
        if let Some(path) = overrides.knowledge_path {
            self.knowledge.path = Some(path);
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_completion(&self.completion)?;
        validate_conversation(&self.conversation)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_completion(completion: &CompletionConfig) -> Result<(), ConfigError> {
    let base_url = completion.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "completion.base_url must start with http:// or https://".to_string(),
        ));
    }

    if completion.model.trim().is_empty() {
        return Err(ConfigError::Validation("completion.model must not be empty".to_string()));
    }

    if !(0.0..=2.0).contains(&completion.temperature) {
        return Err(ConfigError::Validation(
            "completion.temperature must be in range 0..=2".to_string(),
        ));
    }

    if completion.timeout_secs == 0 || completion.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "completion.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if let Some(file_id) = &completion.grounding_file_id {
        if file_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "completion.grounding_file_id must not be blank when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_conversation(conversation: &ConversationConfig) -> Result<(), ConfigError> {
    if conversation.history_window == 0 || conversation.history_window > 64 {
        return Err(ConfigError::Validation(
            "conversation.history_window must be in range 1..=64".to_string(),
        ));
    }

    if conversation.initial_room.trim().is_empty() {
        return Err(ConfigError::Validation(
            "conversation.initial_room must name a room".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.trim().parse::<f32>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    completion: Option<CompletionPatch>,
    conversation: Option<ConversationPatch>,
    knowledge: Option<KnowledgePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    grounding_file_id: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationPatch {
    history_window: Option<usize>,
    max_reasks: Option<u32>,
    initial_room: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
pub(crate) mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    pub(crate) fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    const DOCENT_VARS: &[&str] = &[
        "DOCENT_COMPLETION_API_KEY",
        "OPENAI_API_KEY",
        "DOCENT_COMPLETION_MODEL",
        "DOCENT_COMPLETION_TEMPERATURE",
        "DOCENT_COMPLETION_GROUNDING_FILE_ID",
        "ASSISTANTS_FILE_ID",
        "DOCENT_CONVERSATION_HISTORY_WINDOW",
        "DOCENT_CONVERSATION_MAX_REASKS",
        "DOCENT_SERVER_PORT",
        "PORT",
        "DOCENT_LOG_LEVEL",
        "DOCENT_LOG_FORMAT",
        "TEST_DOCENT_KEY",
    ];

    fn clear_vars() {
        for var in DOCENT_VARS {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_the_guide_service_contract() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.completion.model == "gpt-4o-mini", "default model")?;
        ensure((config.completion.temperature - 0.4).abs() < f32::EPSILON, "default temperature")?;
        ensure(config.conversation.history_window == 8, "default history window")?;
        ensure(config.conversation.max_reasks == 3, "default re-ask limit")?;
        ensure(config.conversation.initial_room == "entrance", "default room")?;
        ensure(config.server.port == 3001, "default port")?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "default log format")
    }

    #[test]
    fn missing_api_key_is_reported_but_not_fatal() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("missing key must not fail load: {err}"))?;

        ensure(!config.has_api_key(), "no key configured")?;
        ensure(
            config.missing_credentials() == vec!["completion.api_key"],
            "missing api key should be listed",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("TEST_DOCENT_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("docent.toml");
            fs::write(
                &path,
                r#"
[completion]
api_key = "${TEST_DOCENT_KEY}"
grounding_file_id = "file-abc"

[conversation]
history_window = 12
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.completion.api_key.as_ref().map(|key| key.expose_secret().to_string())
                    == Some("sk-from-env".to_string()),
                "api key should be interpolated from environment",
            )?;
            ensure(config.has_grounding_file(), "grounding file id should be loaded")?;
            ensure(config.conversation.history_window == 12, "history window from file")?;
            ensure(config.missing_credentials().is_empty(), "nothing missing")
        })();

        clear_vars();
        result
    }

    #[test]
    fn legacy_env_names_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("OPENAI_API_KEY", "sk-legacy");
        env::set_var("ASSISTANTS_FILE_ID", "file-legacy");
        env::set_var("PORT", "4000");
        env::set_var("DOCENT_LOG_LEVEL", "warn");
        env::set_var("DOCENT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.has_api_key(), "OPENAI_API_KEY should be honoured")?;
            ensure(
                config.completion.grounding_file_id.as_deref() == Some("file-legacy"),
                "ASSISTANTS_FILE_ID should be honoured",
            )?;
            ensure(config.server.port == 4000, "PORT should be honoured")?;
            ensure(config.logging.level == "warn", "log level alias")?;
            ensure(matches!(config.logging.format, LogFormat::Pretty), "log format alias")
        })();

        clear_vars();
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("DOCENT_COMPLETION_MODEL", "model-from-env");
        env::set_var("DOCENT_CONVERSATION_MAX_REASKS", "5");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("docent.toml");
            fs::write(
                &path,
                r#"
[completion]
model = "model-from-file"
temperature = 0.7

[conversation]
max_reasks = 1

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    port: Some(8088),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.completion.model == "model-from-env", "env model should win over file")?;
            ensure(
                (config.completion.temperature - 0.7).abs() < f32::EPSILON,
                "file temperature should win over default",
            )?;
            ensure(config.conversation.max_reasks == 5, "env re-ask limit should win")?;
            ensure(config.logging.level == "debug", "override log level should win")?;
            ensure(config.server.port == 8088, "override port should win")
        })();

        clear_vars();
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("DOCENT_COMPLETION_TEMPERATURE", "3.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("completion.temperature")
            );
            ensure(has_message, "validation failure should mention completion.temperature")
        })();

        clear_vars();
        result
    }

    #[test]
    fn non_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("DOCENT_CONVERSATION_HISTORY_WINDOW", "lots");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "DOCENT_CONVERSATION_HISTORY_WINDOW", "key should be named")
            }
            other => Err(format!("expected invalid override, got {other:?}")),
        };

        clear_vars();
        result
    }

    #[test]
    fn required_file_must_exist() {
        let error = AppConfig::load(LoadOptions {
            config_path: Some("/definitely/not/here/docent.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect_err("missing required file");
        assert!(matches!(error, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars();
        env::set_var("DOCENT_COMPLETION_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")
        })();

        clear_vars();
        result
    }
}
