//! Repository pattern implementations.
//!
//! One trait per aggregate defines the typed read/write contract the core
//! uses; the `Sqlite*` implementations are the production backend. Row
//! mapping is manual (`Row::try_get`) so the queries stay runtime-checked
//! and the domain types never derive database concerns.

mod alert_repository;
mod benchmark_repository;
mod model_repository;
mod monitoring_repository;
mod provider_repository;

pub use alert_repository::{AlertQuery, AlertRepository, SqliteAlertRepository};
pub use benchmark_repository::{BenchmarkRepository, RunSummary, SqliteBenchmarkRepository};
pub use model_repository::{ModelQuery, ModelRepository, SqliteModelRepository};
pub use monitoring_repository::{
    MonitoringRepository, SqliteMonitoringRepository, UptimeCheckWithModel, UptimeQuery,
};
pub use provider_repository::{ProviderRepository, SqliteProviderRepository};
