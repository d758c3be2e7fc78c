//! Monitoring configuration and uptime check repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use arguslm_domain::{ModelId, MonitoringConfig, UptimeCheck, UptimeStatus};

use crate::{Error, Result};

/// Query parameters for uptime history.
#[derive(Debug, Clone)]
pub struct UptimeQuery {
    pub model_id: Option<ModelId>,
    pub status: Option<UptimeStatus>,
    pub since: Option<DateTime<Utc>>,
    /// Only return checks whose model still has monitoring enabled
    pub enabled_only: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Default for UptimeQuery {
    fn default() -> Self {
        Self {
            model_id: None,
            status: None,
            since: None,
            enabled_only: false,
            limit: 100,
            offset: 0,
        }
    }
}

/// An uptime check joined with its model's display fields.
#[derive(Debug, Clone)]
pub struct UptimeCheckWithModel {
    pub check: UptimeCheck,
    pub model_name: String,
    pub provider_kind: String,
}

/// Repository trait for monitoring state.
#[async_trait]
pub trait MonitoringRepository: Send + Sync {
    /// Read the singleton config, creating it with defaults on first access.
    async fn get_or_create_config(&self) -> Result<MonitoringConfig>;

    /// Persist the singleton config.
    async fn update_config(&self, config: &MonitoringConfig) -> Result<()>;

    /// Persist a batch of checks from one monitoring tick.
    async fn insert_checks(&self, checks: &[UptimeCheck]) -> Result<()>;

    /// Filtered, paginated history with joined model names; returns (items, total).
    async fn history(&self, query: &UptimeQuery) -> Result<(Vec<UptimeCheckWithModel>, u64)>;

    /// Rows for bulk export, newest first.
    async fn export_rows(
        &self,
        model_id: Option<ModelId>,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<UptimeCheckWithModel>>;
}

/// SQLite implementation of [`MonitoringRepository`].
pub struct SqliteMonitoringRepository {
    pool: SqlitePool,
}

impl SqliteMonitoringRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_config_row(row: &SqliteRow) -> Result<MonitoringConfig> {
    Ok(MonitoringConfig {
        id: row.try_get::<Uuid, _>("id")?.into(),
        interval_minutes: row.try_get::<i64, _>("interval_minutes")? as u32,
        prompt_pack: row.try_get("prompt_pack")?,
        enabled: row.try_get("enabled")?,
        last_run_at: row.try_get::<Option<DateTime<Utc>>, _>("last_run_at")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn map_check_row(row: &SqliteRow) -> Result<UptimeCheck> {
    let status: String = row.try_get("status")?;
    let status: UptimeStatus = status.parse().map_err(|e: String| Error::CorruptRow(e))?;
    Ok(UptimeCheck {
        id: row.try_get::<Uuid, _>("id")?.into(),
        model_id: row.try_get::<Uuid, _>("model_id")?.into(),
        status,
        latency_ms: row.try_get("latency_ms")?,
        ttft_ms: row.try_get("ttft_ms")?,
        tps: row.try_get("tps")?,
        output_tokens: row.try_get("output_tokens")?,
        error: row.try_get("error")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn map_check_with_model_row(row: &SqliteRow) -> Result<UptimeCheckWithModel> {
    Ok(UptimeCheckWithModel {
        check: map_check_row(row)?,
        model_name: row.try_get("model_name")?,
        provider_kind: row.try_get("provider_kind")?,
    })
}

const CHECK_SELECT: &str = "SELECT uc.*, \
    COALESCE(m.custom_name, m.model_id) AS model_name, \
    p.provider_kind AS provider_kind \
    FROM uptime_checks uc \
    JOIN models m ON uc.model_id = m.id \
    JOIN provider_accounts p ON m.provider_account_id = p.id \
    WHERE 1=1";

fn push_history_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &UptimeQuery) {
    if let Some(model_id) = query.model_id {
        qb.push(" AND uc.model_id = ").push_bind(model_id.into_uuid());
    }
    if let Some(status) = query.status {
        qb.push(" AND uc.status = ").push_bind(status.as_str());
    }
    if let Some(since) = query.since {
        qb.push(" AND uc.created_at >= ").push_bind(since);
    }
    if query.enabled_only {
        qb.push(" AND m.enabled_for_monitoring = 1");
    }
}

#[async_trait]
impl MonitoringRepository for SqliteMonitoringRepository {
    async fn get_or_create_config(&self) -> Result<MonitoringConfig> {
        let row = sqlx::query("SELECT * FROM monitoring_configs LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = row {
            return map_config_row(&row);
        }

        let config = MonitoringConfig::default();
        sqlx::query(
            "INSERT INTO monitoring_configs \
             (id, interval_minutes, prompt_pack, enabled, last_run_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(config.id.into_uuid())
        .bind(config.interval_minutes as i64)
        .bind(&config.prompt_pack)
        .bind(config.enabled)
        .bind(config.last_run_at)
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(config)
    }

    async fn update_config(&self, config: &MonitoringConfig) -> Result<()> {
        sqlx::query(
            "UPDATE monitoring_configs \
             SET interval_minutes = ?, prompt_pack = ?, enabled = ?, last_run_at = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(config.interval_minutes as i64)
        .bind(&config.prompt_pack)
        .bind(config.enabled)
        .bind(config.last_run_at)
        .bind(Utc::now())
        .bind(config.id.into_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_checks(&self, checks: &[UptimeCheck]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for check in checks {
            sqlx::query(
                "INSERT INTO uptime_checks \
                 (id, model_id, status, latency_ms, ttft_ms, tps, output_tokens, error, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(check.id.into_uuid())
            .bind(check.model_id.into_uuid())
            .bind(check.status.as_str())
            .bind(check.latency_ms)
            .bind(check.ttft_ms)
            .bind(check.tps)
            .bind(check.output_tokens)
            .bind(&check.error)
            .bind(check.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn history(&self, query: &UptimeQuery) -> Result<(Vec<UptimeCheckWithModel>, u64)> {
        let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM uptime_checks uc \
             JOIN models m ON uc.model_id = m.id \
             JOIN provider_accounts p ON m.provider_account_id = p.id \
             WHERE 1=1",
        );
        push_history_filters(&mut count_qb, query);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(CHECK_SELECT);
        push_history_filters(&mut qb, query);
        qb.push(" ORDER BY uc.created_at DESC");
        qb.push(" LIMIT ").push_bind(query.limit.max(1) as i64);
        qb.push(" OFFSET ").push_bind(query.offset as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let items = rows
            .iter()
            .map(map_check_with_model_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((items, total as u64))
    }

    async fn export_rows(
        &self,
        model_id: Option<ModelId>,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<UptimeCheckWithModel>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(CHECK_SELECT);
        if let Some(model_id) = model_id {
            qb.push(" AND uc.model_id = ").push_bind(model_id.into_uuid());
        }
        if let Some(start) = start_date {
            qb.push(" AND uc.created_at >= ").push_bind(start);
        }
        if let Some(end) = end_date {
            qb.push(" AND uc.created_at <= ").push_bind(end);
        }
        qb.push(" ORDER BY uc.created_at DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(map_check_with_model_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::model_repository::{ModelRepository, SqliteModelRepository};
    use crate::repositories::provider_repository::{ProviderRepository, SqliteProviderRepository};
    use crate::repositories::test_support::{sample_model, sample_provider, setup_pool};
    use arguslm_domain::ProviderKind;

    #[tokio::test]
    async fn test_config_created_lazily_with_defaults() {
        let pool = setup_pool().await;
        let repo = SqliteMonitoringRepository::new(pool);

        let config = repo.get_or_create_config().await.unwrap();
        assert_eq!(config.interval_minutes, 15);
        assert_eq!(config.prompt_pack, "health_check");
        assert!(config.enabled);

        // Second read returns the same singleton row
        let again = repo.get_or_create_config().await.unwrap();
        assert_eq!(again.id, config.id);
    }

    #[tokio::test]
    async fn test_config_update() {
        let pool = setup_pool().await;
        let repo = SqliteMonitoringRepository::new(pool);

        let mut config = repo.get_or_create_config().await.unwrap();
        config.interval_minutes = 5;
        config.prompt_pack = "reasoning".to_string();
        config.enabled = false;
        config.last_run_at = Some(Utc::now());
        repo.update_config(&config).await.unwrap();

        let fetched = repo.get_or_create_config().await.unwrap();
        assert_eq!(fetched.interval_minutes, 5);
        assert_eq!(fetched.prompt_pack, "reasoning");
        assert!(!fetched.enabled);
        assert!(fetched.last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_history_filters_and_join() {
        let pool = setup_pool().await;
        let providers = SqliteProviderRepository::new(pool.clone());
        let models = SqliteModelRepository::new(pool.clone());
        let repo = SqliteMonitoringRepository::new(pool);

        let provider = sample_provider(ProviderKind::Openai);
        providers.create(&provider).await.unwrap();
        let mut model = sample_model(&provider, "gpt-4o");
        model.enabled_for_monitoring = true;
        models.create(&model).await.unwrap();
        let other = sample_model(&provider, "gpt-4o-mini");
        models.create(&other).await.unwrap();

        let checks = vec![
            UptimeCheck::up(model.id, 900.0, 120.0, 30.0, 25),
            UptimeCheck::down(model.id, "timeout"),
            UptimeCheck::down(other.id, "rate limited"),
        ];
        repo.insert_checks(&checks).await.unwrap();

        let (all, total) = repo.history(&UptimeQuery::default()).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].provider_kind, "openai");

        let query = UptimeQuery {
            status: Some(UptimeStatus::Down),
            ..Default::default()
        };
        let (down, total) = repo.history(&query).await.unwrap();
        assert_eq!(total, 2);
        assert!(down.iter().all(|c| c.check.status == UptimeStatus::Down));

        let query = UptimeQuery {
            enabled_only: true,
            ..Default::default()
        };
        let (enabled, _) = repo.history(&query).await.unwrap();
        assert_eq!(enabled.len(), 2);
        assert!(enabled.iter().all(|c| c.check.model_id == model.id));
    }

    #[tokio::test]
    async fn test_export_rows_include_provider() {
        let pool = setup_pool().await;
        let providers = SqliteProviderRepository::new(pool.clone());
        let models = SqliteModelRepository::new(pool.clone());
        let repo = SqliteMonitoringRepository::new(pool);

        let provider = sample_provider(ProviderKind::Groq);
        providers.create(&provider).await.unwrap();
        let model = sample_model(&provider, "llama3-8b-8192");
        models.create(&model).await.unwrap();

        repo.insert_checks(&[UptimeCheck::up(model.id, 500.0, 80.0, 60.0, 30)])
            .await
            .unwrap();

        let rows = repo.export_rows(None, None, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].provider_kind, "groq");
        assert_eq!(rows[0].model_name, "llama3-8b-8192");
    }
}
