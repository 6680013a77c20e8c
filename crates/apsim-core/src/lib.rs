pub mod config;
pub use config::{ConfigError, ManagerConfig};

pub mod error;
pub use error::{CoreError, aggregate_message};

mod fsutil;

pub mod ledger;
pub use ledger::{LedgerError, RecoveryLedger};

pub mod manager;
pub use manager::InstanceManager;

pub mod metrics;
pub use metrics::{MetricsBackend, MetricsHandle, NoopMetrics, SwapOutcome};

pub mod store;
pub use store::{FileStore, StoreError};
