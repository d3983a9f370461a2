use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use docent_agent::llm::OpenAiBackend;
use docent_agent::runtime::PersonaReply;
use docent_agent::{AgentRuntime, ConversationError, ConversationService};
use docent_core::config::AppConfig;
use docent_core::knowledge::KnowledgeBase;
use tokio::runtime::Runtime;

use crate::commands::{load_config, CommandResult};

const QUIT_COMMANDS: [&str; 2] = ["/quit", "/exit"];

pub fn run() -> CommandResult {
    let config = match load_config("chat") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let service = match build_service(&config) {
        Ok(service) => service,
        Err(error) => {
            return CommandResult::failure("chat", "runtime_init", format!("{error:#}"), 3);
        }
    };
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    if !config.has_api_key() {
        eprintln!("warning: no API key configured; the guides can only apologize");
    }
    eprintln!("Type {} to leave.", QUIT_COMMANDS[0]);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    match converse(&runtime, &service, stdin.lock(), &mut stdout) {
        Ok(turns) => CommandResult::plain(format!("conversation ended after {turns} turns")),
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), 5),
    }
}

pub fn build_service(config: &AppConfig) -> anyhow::Result<ConversationService> {
    let knowledge = KnowledgeBase::from_config(&config.knowledge)
        .context("loading the museum catalog")?;
    let backend = OpenAiBackend::from_config(&config.completion)
        .context("building the completion client")?;
    let runtime = AgentRuntime::from_config(config, Arc::new(knowledge), Arc::new(backend))
        .context("wiring the conversation runtime")?;
    Ok(ConversationService::new(Arc::new(runtime)))
}

/// Runs one conversation until the input ends or a quit command is read.
/// Returns the number of turns the guides answered.
pub fn converse(
    runtime: &Runtime,
    service: &ConversationService,
    input: impl BufRead,
    output: &mut impl Write,
) -> io::Result<usize> {
    let started = runtime.block_on(service.start(None)).map_err(io::Error::other)?;
    write_replies(output, &started.replies)?;

    let knowledge = service.runtime().knowledge().clone();
    let mut turns = 0;
    for line in input.lines() {
        let line = line?;
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if QUIT_COMMANDS.contains(&message) {
            break;
        }

        match runtime.block_on(service.send_turn(started.session_id, message)) {
            Ok(outcome) => {
                turns += 1;
                write_replies(output, &outcome.replies)?;
                if let Some(room) = &outcome.room_changed {
                    writeln!(output, "  (you are now in the {})", knowledge.room_title(room))?;
                }
                if let Some(artwork) = outcome.artwork_revealed.as_ref().and_then(|key| knowledge.artwork(key)) {
                    writeln!(output, "  (now viewing {})", artwork.byline())?;
                }
            }
            Err(ConversationError::Turn(failure)) => write_replies(output, &failure.replies)?,
            Err(error) => writeln!(output, "  (error: {error})")?,
        }
        output.flush()?;
    }

    let _ = runtime.block_on(service.end(started.session_id));
    Ok(turns)
}

fn write_replies(output: &mut impl Write, replies: &[PersonaReply]) -> io::Result<()> {
    for reply in replies {
        writeln!(output, "{}: {}", reply.persona.label(), reply.text)?;
    }
    Ok(())
}
