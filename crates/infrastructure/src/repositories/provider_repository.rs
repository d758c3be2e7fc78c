//! Provider account repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use arguslm_domain::{ProviderAccount, ProviderAccountId, ProviderKind};

use crate::{Error, Result};

/// Repository trait for provider account operations.
#[async_trait]
pub trait ProviderRepository: Send + Sync {
    /// Insert a new provider account.
    async fn create(&self, provider: &ProviderAccount) -> Result<()>;

    /// Get a provider account by id.
    async fn get(&self, id: ProviderAccountId) -> Result<Option<ProviderAccount>>;

    /// List all provider accounts in creation order.
    async fn list(&self) -> Result<Vec<ProviderAccount>>;

    /// Persist mutable fields of an existing account.
    async fn update(&self, provider: &ProviderAccount) -> Result<()>;

    /// Delete an account (models cascade). Returns false when absent.
    async fn delete(&self, id: ProviderAccountId) -> Result<bool>;

    /// Whether any child model of this account has benchmark results.
    /// Deletion is refused while this holds.
    async fn has_benchmark_history(&self, id: ProviderAccountId) -> Result<bool>;
}

/// SQLite implementation of [`ProviderRepository`].
pub struct SqliteProviderRepository {
    pool: SqlitePool,
}

impl SqliteProviderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub(crate) fn map_provider_row(row: &SqliteRow) -> Result<ProviderAccount> {
    let kind: String = row.try_get("provider_kind")?;
    let provider_kind: ProviderKind = kind
        .parse()
        .map_err(|_| Error::CorruptRow(format!("provider_kind: {kind}")))?;

    Ok(ProviderAccount {
        id: row.try_get::<Uuid, _>("id")?.into(),
        provider_kind,
        display_name: row.try_get("display_name")?,
        credentials_encrypted: row.try_get("credentials_encrypted")?,
        enabled: row.try_get("enabled")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl ProviderRepository for SqliteProviderRepository {
    async fn create(&self, provider: &ProviderAccount) -> Result<()> {
        sqlx::query(
            "INSERT INTO provider_accounts \
             (id, provider_kind, display_name, credentials_encrypted, enabled, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(provider.id.into_uuid())
        .bind(provider.provider_kind.as_str())
        .bind(&provider.display_name)
        .bind(&provider.credentials_encrypted)
        .bind(provider.enabled)
        .bind(provider.created_at)
        .bind(provider.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: ProviderAccountId) -> Result<Option<ProviderAccount>> {
        let row = sqlx::query("SELECT * FROM provider_accounts WHERE id = ?")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_provider_row).transpose()
    }

    async fn list(&self) -> Result<Vec<ProviderAccount>> {
        let rows = sqlx::query("SELECT * FROM provider_accounts ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_provider_row).collect()
    }

    async fn update(&self, provider: &ProviderAccount) -> Result<()> {
        sqlx::query(
            "UPDATE provider_accounts \
             SET display_name = ?, credentials_encrypted = ?, enabled = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&provider.display_name)
        .bind(&provider.credentials_encrypted)
        .bind(provider.enabled)
        .bind(Utc::now())
        .bind(provider.id.into_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: ProviderAccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM provider_accounts WHERE id = ?")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn has_benchmark_history(&self, id: ProviderAccountId) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM benchmark_results br \
             JOIN models m ON br.model_id = m.id \
             WHERE m.provider_account_id = ?",
        )
        .bind(id.into_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::{sample_provider, setup_pool};

    #[tokio::test]
    async fn test_create_get_list() {
        let pool = setup_pool().await;
        let repo = SqliteProviderRepository::new(pool);

        let provider = sample_provider(ProviderKind::Openai);
        repo.create(&provider).await.unwrap();

        let fetched = repo.get(provider.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, provider.id);
        assert_eq!(fetched.provider_kind, ProviderKind::Openai);
        assert_eq!(fetched.credentials_encrypted, "encrypted-blob");
        assert!(fetched.enabled);

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let pool = setup_pool().await;
        let repo = SqliteProviderRepository::new(pool);
        assert!(repo.get(ProviderAccountId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update() {
        let pool = setup_pool().await;
        let repo = SqliteProviderRepository::new(pool);

        let mut provider = sample_provider(ProviderKind::Groq);
        repo.create(&provider).await.unwrap();

        provider.display_name = "renamed".to_string();
        provider.enabled = false;
        repo.update(&provider).await.unwrap();

        let fetched = repo.get(provider.id).await.unwrap().unwrap();
        assert_eq!(fetched.display_name, "renamed");
        assert!(!fetched.enabled);
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = setup_pool().await;
        let repo = SqliteProviderRepository::new(pool);

        let provider = sample_provider(ProviderKind::Mistral);
        repo.create(&provider).await.unwrap();

        assert!(repo.delete(provider.id).await.unwrap());
        assert!(repo.get(provider.id).await.unwrap().is_none());
        // Second delete is a no-op
        assert!(!repo.delete(provider.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_no_history_for_fresh_provider() {
        let pool = setup_pool().await;
        let repo = SqliteProviderRepository::new(pool);

        let provider = sample_provider(ProviderKind::Openai);
        repo.create(&provider).await.unwrap();
        assert!(!repo.has_benchmark_history(provider.id).await.unwrap());
    }
}
