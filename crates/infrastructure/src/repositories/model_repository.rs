//! Model repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use arguslm_domain::{Model, ModelId, ModelSource, ProviderAccount, ProviderAccountId};

use crate::repositories::provider_repository::map_provider_row;
use crate::{Error, Result};

/// Query parameters for model listings.
#[derive(Debug, Clone, Default)]
pub struct ModelQuery {
    pub provider_id: Option<ProviderAccountId>,
    pub enabled_for_monitoring: Option<bool>,
    pub enabled_for_benchmark: Option<bool>,
    /// Case-insensitive substring over model_id and custom_name
    pub search: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl ModelQuery {
    pub fn new() -> Self {
        Self {
            limit: 50,
            ..Default::default()
        }
    }
}

/// Repository trait for model operations.
#[async_trait]
pub trait ModelRepository: Send + Sync {
    async fn create(&self, model: &Model) -> Result<()>;

    async fn get(&self, id: ModelId) -> Result<Option<Model>>;

    /// Get a model with its provider account eagerly loaded.
    async fn get_with_provider(&self, id: ModelId) -> Result<Option<(Model, ProviderAccount)>>;

    /// List models with filters and pagination; returns (items, total).
    async fn list(&self, query: &ModelQuery) -> Result<(Vec<Model>, u64)>;

    /// Persist mutable fields of an existing model.
    async fn update(&self, model: &Model) -> Result<()>;

    /// Fetch the subset of `ids` that exist.
    async fn find_by_ids(&self, ids: &[ModelId]) -> Result<Vec<Model>>;

    /// Fetch models with their providers for the given ids.
    async fn find_with_providers(&self, ids: &[ModelId]) -> Result<Vec<(Model, ProviderAccount)>>;

    /// All models enabled for monitoring, with providers eagerly loaded.
    async fn list_monitored_with_providers(&self) -> Result<Vec<(Model, ProviderAccount)>>;

    /// Models whose provider-visible id contains `fragment` (case-insensitive).
    async fn find_by_model_id_contains(&self, fragment: &str) -> Result<Vec<Model>>;

    /// Whether the provider already registers this provider-visible model id.
    async fn exists(&self, provider_id: ProviderAccountId, model_id: &str) -> Result<bool>;
}

/// SQLite implementation of [`ModelRepository`].
pub struct SqliteModelRepository {
    pool: SqlitePool,
}

impl SqliteModelRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub(crate) fn map_model_row(row: &SqliteRow) -> Result<Model> {
    let source: String = row.try_get("source")?;
    let source: ModelSource = source
        .parse()
        .map_err(|e: String| Error::CorruptRow(e))?;

    Ok(Model {
        id: row.try_get::<Uuid, _>("id")?.into(),
        provider_account_id: row.try_get::<Uuid, _>("provider_account_id")?.into(),
        model_id: row.try_get("model_id")?,
        custom_name: row.try_get("custom_name")?,
        source,
        enabled_for_monitoring: row.try_get("enabled_for_monitoring")?,
        enabled_for_benchmark: row.try_get("enabled_for_benchmark")?,
        metadata: row.try_get::<Json<serde_json::Value>, _>("metadata")?.0,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &ModelQuery) {
    if let Some(provider_id) = query.provider_id {
        qb.push(" AND provider_account_id = ").push_bind(provider_id.into_uuid());
    }
    if let Some(monitoring) = query.enabled_for_monitoring {
        qb.push(" AND enabled_for_monitoring = ").push_bind(monitoring);
    }
    if let Some(benchmark) = query.enabled_for_benchmark {
        qb.push(" AND enabled_for_benchmark = ").push_bind(benchmark);
    }
    if let Some(search) = &query.search {
        let pattern = format!("%{}%", search.to_lowercase());
        qb.push(" AND (LOWER(model_id) LIKE ").push_bind(pattern.clone());
        qb.push(" OR LOWER(COALESCE(custom_name, '')) LIKE ").push_bind(pattern);
        qb.push(")");
    }
}

#[async_trait]
impl ModelRepository for SqliteModelRepository {
    async fn create(&self, model: &Model) -> Result<()> {
        sqlx::query(
            "INSERT INTO models \
             (id, provider_account_id, model_id, custom_name, source, \
              enabled_for_monitoring, enabled_for_benchmark, metadata, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(model.id.into_uuid())
        .bind(model.provider_account_id.into_uuid())
        .bind(&model.model_id)
        .bind(&model.custom_name)
        .bind(model.source.as_str())
        .bind(model.enabled_for_monitoring)
        .bind(model.enabled_for_benchmark)
        .bind(Json(&model.metadata))
        .bind(model.created_at)
        .bind(model.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: ModelId) -> Result<Option<Model>> {
        let row = sqlx::query("SELECT * FROM models WHERE id = ?")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_model_row).transpose()
    }

    async fn get_with_provider(&self, id: ModelId) -> Result<Option<(Model, ProviderAccount)>> {
        let Some(model) = self.get(id).await? else {
            return Ok(None);
        };
        let row = sqlx::query("SELECT * FROM provider_accounts WHERE id = ?")
            .bind(model.provider_account_id.into_uuid())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some((model, map_provider_row(&row)?))),
            None => Ok(None),
        }
    }

    async fn list(&self, query: &ModelQuery) -> Result<(Vec<Model>, u64)> {
        let mut count_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM models WHERE 1=1");
        push_filters(&mut count_qb, query);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM models WHERE 1=1");
        push_filters(&mut qb, query);
        qb.push(" ORDER BY created_at");
        qb.push(" LIMIT ").push_bind(query.limit.max(1) as i64);
        qb.push(" OFFSET ").push_bind(query.offset as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let models = rows.iter().map(map_model_row).collect::<Result<Vec<_>>>()?;
        Ok((models, total as u64))
    }

    async fn update(&self, model: &Model) -> Result<()> {
        sqlx::query(
            "UPDATE models SET custom_name = ?, enabled_for_monitoring = ?, \
             enabled_for_benchmark = ?, metadata = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&model.custom_name)
        .bind(model.enabled_for_monitoring)
        .bind(model.enabled_for_benchmark)
        .bind(Json(&model.metadata))
        .bind(Utc::now())
        .bind(model.id.into_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_ids(&self, ids: &[ModelId]) -> Result<Vec<Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM models WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.into_uuid());
        }
        qb.push(")");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(map_model_row).collect()
    }

    async fn find_with_providers(&self, ids: &[ModelId]) -> Result<Vec<(Model, ProviderAccount)>> {
        let models = self.find_by_ids(ids).await?;
        let mut out = Vec::with_capacity(models.len());
        for model in models {
            let row = sqlx::query("SELECT * FROM provider_accounts WHERE id = ?")
                .bind(model.provider_account_id.into_uuid())
                .fetch_one(&self.pool)
                .await?;
            let provider = map_provider_row(&row)?;
            out.push((model, provider));
        }
        Ok(out)
    }

    async fn list_monitored_with_providers(&self) -> Result<Vec<(Model, ProviderAccount)>> {
        let rows = sqlx::query(
            "SELECT m.id AS model_pk FROM models m WHERE m.enabled_for_monitoring = 1 \
             ORDER BY m.created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        let ids: Vec<ModelId> = rows
            .iter()
            .map(|row| Ok(row.try_get::<Uuid, _>("model_pk")?.into()))
            .collect::<Result<Vec<_>>>()?;
        self.find_with_providers(&ids).await
    }

    async fn find_by_model_id_contains(&self, fragment: &str) -> Result<Vec<Model>> {
        let pattern = format!("%{}%", fragment.to_lowercase());
        let rows = sqlx::query("SELECT * FROM models WHERE LOWER(model_id) LIKE ?")
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_model_row).collect()
    }

    async fn exists(&self, provider_id: ProviderAccountId, model_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM models WHERE provider_account_id = ? AND model_id = ?",
        )
        .bind(provider_id.into_uuid())
        .bind(model_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}
