// Business logic services
// Credentials, sessions, meter registry, token ledger and fleet monitoring

pub mod credential_store;
pub mod ledger;
pub mod meter_registry;
pub mod monitoring;
pub mod session_manager;

pub use credential_store::CredentialStore;
pub use ledger::{LedgerEngine, TopUpReceipt};
pub use meter_registry::MeterRegistry;
pub use monitoring::{FleetSummary, MeterSnapshot, MonitoringAggregator, TokenBalanceEntry};
pub use session_manager::SessionManager;
