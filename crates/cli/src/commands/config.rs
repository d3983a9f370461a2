use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use docent_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

/// One reported setting: dotted key, rendered value, and the env vars that can set it.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let completion = &config.completion;
    let api_key = completion
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field {
            key: "completion.api_key",
            value: api_key,
            env_keys: &["DOCENT_COMPLETION_API_KEY", "OPENAI_API_KEY"],
        },
        Field {
            key: "completion.base_url",
            value: completion.base_url.clone(),
            env_keys: &["DOCENT_COMPLETION_BASE_URL"],
        },
        Field {
            key: "completion.model",
            value: completion.model.clone(),
            env_keys: &["DOCENT_COMPLETION_MODEL"],
        },
        Field {
            key: "completion.temperature",
            value: completion.temperature.to_string(),
            env_keys: &["DOCENT_COMPLETION_TEMPERATURE"],
        },
        Field {
            key: "completion.grounding_file_id",
            value: completion.grounding_file_id.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["DOCENT_COMPLETION_GROUNDING_FILE_ID", "ASSISTANTS_FILE_ID"],
        },
        Field {
            key: "completion.timeout_secs",
            value: completion.timeout_secs.to_string(),
            env_keys: &["DOCENT_COMPLETION_TIMEOUT_SECS"],
        },
        Field {
            key: "conversation.history_window",
            value: config.conversation.history_window.to_string(),
            env_keys: &["DOCENT_CONVERSATION_HISTORY_WINDOW"],
        },
        Field {
            key: "conversation.max_reasks",
            value: config.conversation.max_reasks.to_string(),
            env_keys: &["DOCENT_CONVERSATION_MAX_REASKS"],
        },
        Field {
            key: "conversation.initial_room",
            value: config.conversation.initial_room.clone(),
            env_keys: &["DOCENT_CONVERSATION_INITIAL_ROOM"],
        },
        Field {
            key: "knowledge.path",
            value: config
                .knowledge
                .path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<builtin>".to_string()),
            env_keys: &["DOCENT_KNOWLEDGE_PATH"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["DOCENT_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["DOCENT_SERVER_PORT", "PORT"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["DOCENT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["DOCENT_LOGGING_LEVEL", "DOCENT_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["DOCENT_LOGGING_FORMAT", "DOCENT_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from(DEFAULT_CONFIG_FILE);
    if root.exists() {
        return Some(root);
    }

    let nested = Path::new("config").join(DEFAULT_CONFIG_FILE);
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognizable prefix like `sk-` and hides the rest.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
