//! Benchmark run and result repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use arguslm_common::PaginationParams;
use arguslm_domain::{
    BenchmarkResult, BenchmarkRun, BenchmarkRunId, RunStatus, TriggerSource,
};

use crate::{Error, Result};

/// A run with its persisted result count, for list views.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run: BenchmarkRun,
    pub result_count: i64,
}

/// Repository trait for benchmark persistence.
#[async_trait]
pub trait BenchmarkRepository: Send + Sync {
    async fn create_run(&self, run: &BenchmarkRun) -> Result<()>;

    async fn get_run(&self, id: BenchmarkRunId) -> Result<Option<BenchmarkRun>>;

    /// Newest-first run listing with optional status filter; returns (items, total).
    async fn list_runs(
        &self,
        status: Option<RunStatus>,
        pagination: &PaginationParams,
    ) -> Result<(Vec<RunSummary>, u64)>;

    /// Transition a run's status, stamping `completed_at` for terminal states.
    async fn update_run_status(
        &self,
        id: BenchmarkRunId,
        status: RunStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Persist one run's result set atomically, preserving slice order.
    async fn insert_results(
        &self,
        run_id: BenchmarkRunId,
        results: &[BenchmarkResult],
    ) -> Result<()>;

    /// Results for a run in planning order.
    async fn results_for_run(&self, run_id: BenchmarkRunId) -> Result<Vec<BenchmarkResult>>;
}

/// SQLite implementation of [`BenchmarkRepository`].
pub struct SqliteBenchmarkRepository {
    pool: SqlitePool,
}

impl SqliteBenchmarkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_run_row(row: &SqliteRow) -> Result<BenchmarkRun> {
    let status: String = row.try_get("status")?;
    let status: RunStatus = status.parse().map_err(|e: String| Error::CorruptRow(e))?;
    let triggered_by: String = row.try_get("triggered_by")?;
    let triggered_by: TriggerSource = triggered_by
        .parse()
        .map_err(|e: String| Error::CorruptRow(e))?;
    let model_ids = row
        .try_get::<Json<Vec<Uuid>>, _>("model_ids")?
        .0
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(BenchmarkRun {
        id: row.try_get::<Uuid, _>("id")?.into(),
        name: row.try_get("name")?,
        model_ids,
        prompt_pack: row.try_get("prompt_pack")?,
        status,
        triggered_by,
        started_at: row.try_get::<DateTime<Utc>, _>("started_at")?,
        completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn map_result_row(row: &SqliteRow) -> Result<BenchmarkResult> {
    Ok(BenchmarkResult {
        id: row.try_get::<Uuid, _>("id")?.into(),
        run_id: row.try_get::<Uuid, _>("run_id")?.into(),
        model_id: row.try_get::<Uuid, _>("model_id")?.into(),
        ttft_ms: row.try_get("ttft_ms")?,
        tps: row.try_get("tps")?,
        tps_excluding_ttft: row.try_get("tps_excluding_ttft")?,
        total_latency_ms: row.try_get("total_latency_ms")?,
        input_tokens: row.try_get("input_tokens")?,
        output_tokens: row.try_get("output_tokens")?,
        estimated_cost: row.try_get("estimated_cost")?,
        error: row.try_get("error")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl BenchmarkRepository for SqliteBenchmarkRepository {
    async fn create_run(&self, run: &BenchmarkRun) -> Result<()> {
        let model_ids: Vec<Uuid> = run.model_ids.iter().map(|id| id.into_uuid()).collect();
        sqlx::query(
            "INSERT INTO benchmark_runs \
             (id, name, model_ids, prompt_pack, status, triggered_by, started_at, completed_at, \
              created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(run.id.into_uuid())
        .bind(&run.name)
        .bind(Json(model_ids))
        .bind(&run.prompt_pack)
        .bind(run.status.as_str())
        .bind(run.triggered_by.as_str())
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.created_at)
        .bind(run.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_run(&self, id: BenchmarkRunId) -> Result<Option<BenchmarkRun>> {
        let row = sqlx::query("SELECT * FROM benchmark_runs WHERE id = ?")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_run_row).transpose()
    }

    async fn list_runs(
        &self,
        status: Option<RunStatus>,
        pagination: &PaginationParams,
    ) -> Result<(Vec<RunSummary>, u64)> {
        let mut count_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM benchmark_runs WHERE 1=1");
        if let Some(status) = status {
            count_qb.push(" AND status = ").push_bind(status.as_str());
        }
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT r.*, \
             (SELECT COUNT(*) FROM benchmark_results br WHERE br.run_id = r.id) AS result_count \
             FROM benchmark_runs r WHERE 1=1",
        );
        if let Some(status) = status {
            qb.push(" AND r.status = ").push_bind(status.as_str());
        }
        qb.push(" ORDER BY r.created_at DESC");
        qb.push(" LIMIT ").push_bind(pagination.limit() as i64);
        qb.push(" OFFSET ").push_bind(pagination.offset() as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let summaries = rows
            .iter()
            .map(|row| {
                Ok(RunSummary {
                    run: map_run_row(row)?,
                    result_count: row.try_get("result_count")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((summaries, total as u64))
    }

    async fn update_run_status(
        &self,
        id: BenchmarkRunId,
        status: RunStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE benchmark_runs SET status = ?, \
             completed_at = COALESCE(?, completed_at), updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(completed_at)
        .bind(Utc::now())
        .bind(id.into_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_results(
        &self,
        run_id: BenchmarkRunId,
        results: &[BenchmarkResult],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (seq, result) in results.iter().enumerate() {
            sqlx::query(
                "INSERT INTO benchmark_results \
                 (id, run_id, model_id, ttft_ms, tps, tps_excluding_ttft, total_latency_ms, \
                  input_tokens, output_tokens, estimated_cost, error, seq, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(result.id.into_uuid())
            .bind(run_id.into_uuid())
            .bind(result.model_id.into_uuid())
            .bind(result.ttft_ms)
            .bind(result.tps)
            .bind(result.tps_excluding_ttft)
            .bind(result.total_latency_ms)
            .bind(result.input_tokens)
            .bind(result.output_tokens)
            .bind(result.estimated_cost)
            .bind(&result.error)
            .bind(seq as i64)
            .bind(result.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn results_for_run(&self, run_id: BenchmarkRunId) -> Result<Vec<BenchmarkResult>> {
        let rows = sqlx::query("SELECT * FROM benchmark_results WHERE run_id = ? ORDER BY seq")
            .bind(run_id.into_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_result_row).collect()
    }
}
