//! Database module - SQLite connection pool and utilities.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use tracing::{info, instrument};

use crate::Result;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database connection URL (sqlite://path or sqlite::memory:)
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Timeout for acquiring a connection from the pool
    pub acquire_timeout: Duration,
    /// Log SQL statements
    pub echo: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://arguslm.db?mode=rwc".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            echo: false,
        }
    }
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// In-memory configuration for tests.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            echo: false,
        }
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Create a new pool with the given configuration.
    ///
    /// Foreign-key enforcement is enabled on every connection; SQLite keeps
    /// it off by default and the schema relies on cascading deletes.
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!(url = %config.url, "Initializing database connection pool");

        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !config.echo {
            options = options.disable_statement_logging();
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Verify the database answers a trivial query.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close all connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool() {
        let pool = DatabasePool::new(&DatabaseConfig::in_memory()).await.unwrap();
        pool.health_check().await.unwrap();
        pool.close().await;
    }
}
