//! Application startup and initialization logic.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

use crate::app_state::AppState;
use crate::config::Config;
use crate::database::{self, PgStore};

/// Connect to Postgres, migrate, and assemble the services.
pub async fn initialize_app(config: &Config) -> Result<AppState> {
    info!("🚀 Starting prepaid meter API ({})", config.environment);

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
    info!("✅ Prometheus metrics initialized");

    let db_pool = database::setup_database(config).await?;
    info!("✅ PostgreSQL connection established");

    database::run_migrations(&db_pool).await?;
    info!("✅ Database migrations completed");

    let store = Arc::new(PgStore::new(db_pool));
    let app_state = AppState::from_store(store, config.clone(), metrics_handle);
    info!(
        "✅ Services initialized (session ttl {}s, tariff {}/kWh)",
        app_state.sessions.ttl_secs(),
        app_state.ledger.price_per_kwh()
    );

    Ok(app_state)
}

pub fn spawn_background_tasks(app_state: &AppState) {
    info!("📌 Spawning background tasks...");

    let every = Duration::from_secs(app_state.config.session.purge_interval_secs.max(1));
    app_state.sessions.start_purge_task(every);
    info!("✅ Session purge started (interval: {}s)", every.as_secs());
}

/// Wait for shutdown signal.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully");
        },
    }
}
