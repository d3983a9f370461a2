pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "docent",
    about = "Docent museum guide operator CLI",
    long_about = "Inspect configuration and catalog readiness, upload the grounding document, and talk to the guides from a terminal.",
    after_help = "Examples:\n  docent doctor --json\n  docent catalog\n  docent upload-catalog\n  docent chat"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Validate config, credential readiness, and catalog loading")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "List the rooms and artworks the guides know about")]
    Catalog {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Upload the catalog as the grounding document for file search")]
    UploadCatalog {
        #[arg(long, help = "Upload this file instead of the configured catalog")]
        file: Option<PathBuf>,
    },
    #[command(about = "Hold a conversation with both guides in the terminal")]
    Chat,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Catalog { json } => commands::catalog::run(json),
        Command::UploadCatalog { file } => commands::upload_catalog::run(file.as_deref()),
        Command::Chat => commands::chat::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
