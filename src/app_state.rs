//! Application state shared across all handlers.
//!
//! Every service receives the same injected store handle, so the API runs
//! unchanged against Postgres or the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::database::Store;
use crate::services::{
    CredentialStore, LedgerEngine, MeterRegistry, MonitoringAggregator, SessionManager,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// User lookup and password verification
    pub credentials: CredentialStore,
    /// Session token lifecycle
    pub sessions: SessionManager,
    /// Meter lookups and energy increments
    pub meters: MeterRegistry,
    /// Usage and top-up ledger
    pub ledger: LedgerEngine,
    /// Fleet-wide summaries
    pub monitoring: MonitoringAggregator,
    /// Renders the `/metrics` exposition
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn from_store<S>(store: Arc<S>, config: Config, metrics_handle: PrometheusHandle) -> Self
    where
        S: Store + 'static,
    {
        let timeout = Duration::from_secs(config.db_timeout_secs);

        let credentials = CredentialStore::new(store.clone(), timeout);
        let sessions = SessionManager::new(
            store.clone(),
            store.clone(),
            config.session.ttl_secs,
            timeout,
        );
        let meters = MeterRegistry::new(store.clone(), timeout);
        let ledger = LedgerEngine::new(store, config.ledger.price_per_kwh, timeout);
        let monitoring = MonitoringAggregator::new(meters.clone(), ledger.clone());

        Self {
            config,
            credentials,
            sessions,
            meters,
            ledger,
            monitoring,
            metrics_handle,
        }
    }
}
