use std::fs;
use std::path::Path;

use docent_agent::llm::OpenAiBackend;
use docent_core::knowledge::{KnowledgeBase, BUILTIN_CATALOG};
use serde_json::json;

use crate::commands::{load_config, CommandResult};

const BUILTIN_FILE_NAME: &str = "museum.json";

/// Uploads the catalog for file search and prints the id to configure.
pub fn run(file: Option<&Path>) -> CommandResult {
    let config = match load_config("upload-catalog") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    if !config.has_api_key() {
        return CommandResult::failure(
            "upload-catalog",
            "config_missing",
            "set DOCENT_COMPLETION_API_KEY (or OPENAI_API_KEY) before uploading",
            2,
        );
    }

    let source = file.or(config.knowledge.path.as_deref());
    let (file_name, contents) = match read_catalog(source) {
        Ok(document) => document,
        Err(message) => return CommandResult::failure("upload-catalog", "catalog_load", message, 3),
    };

    let backend = match OpenAiBackend::from_config(&config.completion) {
        Ok(backend) => backend,
        Err(error) => {
            return CommandResult::failure("upload-catalog", "client_init", error.to_string(), 4)
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "upload-catalog",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                4,
            );
        }
    };

    match runtime.block_on(backend.upload_file(&file_name, contents)) {
        Ok(uploaded) => CommandResult::success_with(
            "upload-catalog",
            format!(
                "uploaded `{file_name}`; set DOCENT_COMPLETION_GROUNDING_FILE_ID={}",
                uploaded.id
            ),
            Some(json!({ "file_id": uploaded.id, "filename": uploaded.filename, "bytes": uploaded.bytes })),
        ),
        Err(error) => CommandResult::failure("upload-catalog", "upload", error.to_string(), 5),
    }
}

/// The document to upload, validated as a catalog so a broken file never becomes grounding.
pub fn read_catalog(path: Option<&Path>) -> Result<(String, Vec<u8>), String> {
    let Some(path) = path else {
        return Ok((BUILTIN_FILE_NAME.to_string(), BUILTIN_CATALOG.as_bytes().to_vec()));
    };

    let raw = fs::read_to_string(path)
        .map_err(|error| format!("could not read `{}`: {error}", path.display()))?;
    KnowledgeBase::from_json_str(&raw)
        .map_err(|error| format!("`{}` is not a valid catalog: {error}", path.display()))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| BUILTIN_FILE_NAME.to_string());
    Ok((file_name, raw.into_bytes()))
}
