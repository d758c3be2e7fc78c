//! Shared utilities for ArgusLM: configuration, credential encryption, retry
//! with exponential backoff, percentile statistics, pagination, and the
//! tracing bootstrap.

pub mod config;
pub mod crypto;
pub mod pagination;
pub mod retry;
pub mod stats;
pub mod telemetry;

pub use config::{AppConfig, ConfigError};
pub use crypto::{CredentialVault, VaultError};
pub use pagination::PaginationParams;
pub use retry::{retry_with_predicate, RetryConfig};
pub use stats::{calculate_statistics, LatencyStatistics};
