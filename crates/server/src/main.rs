mod bootstrap;
mod health;
mod service;
mod telegram_api;
mod webhook;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use rollcall_core::config::{AppConfig, LoadOptions};
use rollcall_telegram::api::BotTransport;

use crate::telegram_api::HttpBotTransport;
use crate::webhook::WebhookState;

fn init_logging(config: &AppConfig) {
    use rollcall_core::config::LogFormat::*;
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
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other work
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let transport: Arc<dyn BotTransport> =
        Arc::new(HttpBotTransport::new(&app.config.telegram.bot_token));
    let state = WebhookState::new(
        app.router.clone(),
        app.chats.clone(),
        transport,
        app.config.telegram.webhook_secret.clone(),
    );

    let routes = webhook::router(state).merge(health::router(app.db_pool.clone()));
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "rollcall-server accepting webhook deliveries"
    );

    axum::serve(listener, routes).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopping", "rollcall-server stopping");

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, app.db_pool.close()).await.is_err() {
        tracing::warn!(
            event_name = "system.server.pool_close_timeout",
            "database pool did not close within the shutdown grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}
