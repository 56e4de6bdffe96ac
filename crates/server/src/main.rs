mod api;
mod availability;
mod bookings;
mod bootstrap;
mod health;
mod identity;
mod orders;

use std::time::Duration;

use anyhow::Result;
use tailor_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tailor_core::config::LogFormat::*;
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
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    let state = api::ApiState::from_pool(app.db_pool.clone(), &app.config.booking);
    let router = api::router(state);

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "tailor-server started"
    );

    serve_until_shutdown(
        listener,
        router,
        Duration::from_secs(app.config.server.graceful_shutdown_secs),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "tailor-server stopped"
    );

    Ok(())
}

/// Serve until ctrl-c, then drain open connections. Connections that do not
/// drain within `grace` are abandoned so shutdown always terminates.
async fn serve_until_shutdown(
    listener: tokio::net::TcpListener,
    router: axum::Router,
    grace: Duration,
) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!(
            event_name = "system.server.stopping",
            correlation_id = "shutdown",
            "shutdown signal received"
        );
        let _ = shutdown_tx.send(true);
    });

    let mut drain_rx = shutdown_rx.clone();
    let graceful = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = drain_rx.changed().await;
    });

    let mut deadline_rx = shutdown_rx;
    tokio::select! {
        result = graceful => result?,
        _ = async {
            let _ = deadline_rx.changed().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(
                event_name = "system.server.drain_timeout",
                correlation_id = "shutdown",
                "open connections did not drain before the shutdown deadline"
            );
        }
    }

    Ok(())
}
