mod bootstrap;
mod chat;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use docent_core::config::{AppConfig, LoadOptions};
use tokio::sync::Notify;

fn init_logging(config: &AppConfig) {
    use docent_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    run().await
}

pub async fn run() -> Result<()> {
    // Logging depends on the loaded config, so nothing may log before this point.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let router = app.router();

    let shutdown = Arc::new(Notify::new());
    let server = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.notified().await })
                .await
        }
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        rooms = app.knowledge.room_count(),
        "docent-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        active_sessions = app.conversations.active_sessions().await,
        "docent-server stopping"
    );

    shutdown.notify_one();
    let drain = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(drain, server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            drain_secs = drain.as_secs(),
            "in-flight requests did not finish before the shutdown deadline"
        ),
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
