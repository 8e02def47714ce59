mod api;
mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use tenderdeck_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tenderdeck_core::config::LogFormat::*;
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
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    // First snapshot before accepting traffic; a cold cache would serve an
    // empty dashboard.
    if let Err(error) = app.state.coordinator.refresh(chrono::Utc::now().date_naive()).await {
        tracing::warn!(error = %error, "initial snapshot fetch failed, starting empty");
    }
    tenderdeck_ingest::spawn_periodic(
        app.state.coordinator.clone(),
        app.config.sheets.refresh_interval_secs,
    );

    let router = api::router(app.state.clone()).merge(health::router(app.db_pool.clone()));
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(event_name = "system.server.started", bind_address = %address, "listening");

    let shutdown_grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopping", "draining connections");
    tokio::time::timeout(shutdown_grace, app.db_pool.close()).await.ok();

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
