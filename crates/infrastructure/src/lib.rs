//! Infrastructure layer for ArgusLM.
//!
//! SQLite persistence via sqlx: connection pool management, embedded schema
//! migrations, and repository implementations for every aggregate. The
//! repository traits are the typed read/write contract the core components
//! depend on; the SQLite implementations can be swapped for testing.

pub mod database;
pub mod migrations;
pub mod repositories;

pub use database::{DatabaseConfig, DatabasePool};
pub use migrations::run_migrations;
pub use repositories::{
    AlertQuery, AlertRepository, BenchmarkRepository, ModelQuery, ModelRepository,
    MonitoringRepository, ProviderRepository, RunSummary, SqliteAlertRepository,
    SqliteBenchmarkRepository, SqliteModelRepository, SqliteMonitoringRepository,
    SqliteProviderRepository, UptimeCheckWithModel, UptimeQuery,
};

/// Infrastructure-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure-level errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database errors from sqlx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored value outside its domain (corrupt enum tag, bad UUID)
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Database(_))
    }

    /// Get HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::Configuration(_) | Error::Serialization(_) => 400,
            Error::Database(_) | Error::CorruptRow(_) => 503,
        }
    }
}
