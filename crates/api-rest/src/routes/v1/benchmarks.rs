//! Benchmark endpoints: run creation, read paths, export, and the live
//! progress WebSocket.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use arguslm_application::{compute_statistics, BenchmarkConfig};
use arguslm_common::PaginationParams;
use arguslm_domain::{
    is_valid_prompt_pack, BenchmarkResult, BenchmarkRun, ModelId, RunStatus,
    TriggerSource,
};
use arguslm_infrastructure::{BenchmarkRepository as _, ModelRepository as _};

use crate::error::{ApiError, ApiResult};
use crate::responses::{Accepted, FileDownload};
use crate::state::AppState;

/// WebSocket keep-alive idle timeout.
const KEEPALIVE_IDLE: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BenchmarkCreate {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    #[schema(value_type = Vec<Uuid>)]
    pub model_ids: Vec<Uuid>,
    pub prompt_pack: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_num_runs")]
    pub num_runs: u32,
    #[serde(default = "default_warmup_runs")]
    pub warmup_runs: u32,
}

fn default_max_tokens() -> u32 {
    200
}

fn default_num_runs() -> u32 {
    3
}

fn default_warmup_runs() -> u32 {
    1
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkStartResponse {
    #[schema(value_type = Uuid)]
    pub id: Uuid,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkRunResponse {
    #[schema(value_type = Uuid)]
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String)]
    pub status: RunStatus,
    #[schema(value_type = Vec<Uuid>)]
    pub model_ids: Vec<Uuid>,
    pub prompt_pack: String,
    #[schema(value_type = String)]
    pub triggered_by: TriggerSource,
    #[schema(value_type = String)]
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[schema(value_type = Option<String>)]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub result_count: i64,
}

impl BenchmarkRunResponse {
    fn from_run(run: &BenchmarkRun, result_count: i64) -> Self {
        Self {
            id: run.id.into_uuid(),
            name: run.name.clone(),
            status: run.status,
            model_ids: run.model_ids.iter().map(|id| id.into_uuid()).collect(),
            prompt_pack: run.prompt_pack.clone(),
            triggered_by: run.triggered_by,
            started_at: run.started_at,
            completed_at: run.completed_at,
            result_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkListResponse {
    pub runs: Vec<BenchmarkRunResponse>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkResultResponse {
    #[schema(value_type = Uuid)]
    pub id: Uuid,
    #[schema(value_type = Uuid)]
    pub model_id: Uuid,
    pub model_name: Option<String>,
    pub ttft_ms: f64,
    pub tps: f64,
    pub tps_excluding_ttft: f64,
    pub total_latency_ms: f64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub estimated_cost: Option<f64>,
    pub error: Option<String>,
    #[schema(value_type = String)]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl BenchmarkResultResponse {
    fn from_result(result: &BenchmarkResult, model_name: Option<String>) -> Self {
        Self {
            id: result.id.into_uuid(),
            model_id: result.model_id.into_uuid(),
            model_name,
            ttft_ms: result.ttft_ms,
            tps: result.tps,
            tps_excluding_ttft: result.tps_excluding_ttft,
            total_latency_ms: result.total_latency_ms,
            input_tokens: result.input_tokens,
            output_tokens: result.output_tokens,
            estimated_cost: result.estimated_cost,
            error: result.error.clone(),
            created_at: result.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkResultListResponse {
    pub results: Vec<BenchmarkResultResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatisticsResponse {
    pub ttft_p50: f64,
    pub ttft_p95: f64,
    pub ttft_p99: f64,
    pub tps_p50: f64,
    pub tps_p95: f64,
    pub tps_p99: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BenchmarkDetailResponse {
    #[serde(flatten)]
    pub run: BenchmarkRunResponse,
    pub results: Vec<BenchmarkResultResponse>,
    pub statistics: StatisticsResponse,
}

#[derive(Debug, Deserialize)]
pub struct BenchmarkListParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub status: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "json".to_string()
}

/// Benchmark routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/benchmarks", axum::routing::post(create_benchmark).get(list_benchmarks))
        .route("/benchmarks/:id", get(get_benchmark))
        .route("/benchmarks/:id/results", get(get_benchmark_results))
        .route("/benchmarks/:id/export", get(export_benchmark))
        .route("/benchmarks/:id/stream", get(stream_benchmark))
}

/// Start a benchmark run
///
/// Validates the target models, persists the run as `pending`, spawns the
/// orchestrator in the background, and returns immediately.
#[utoipa::path(
    post,
    path = "/api/v1/benchmarks",
    tag = "benchmarks",
    request_body = BenchmarkCreate,
    responses(
        (status = 202, description = "Run accepted", body = BenchmarkStartResponse),
        (status = 400, description = "Unknown model ids or prompt pack"),
    )
)]
async fn create_benchmark(
    State(state): State<AppState>,
    Json(payload): Json<BenchmarkCreate>,
) -> ApiResult<Accepted<BenchmarkStartResponse>> {
    payload.validate()?;

    if !is_valid_prompt_pack(&payload.prompt_pack) {
        return Err(ApiError::Validation(format!(
            "Unknown prompt pack: {}",
            payload.prompt_pack
        )));
    }
    if payload.num_runs < 1 {
        return Err(ApiError::Validation("num_runs must be >= 1".to_string()));
    }

    let requested: Vec<ModelId> = payload.model_ids.iter().map(|id| (*id).into()).collect();
    let found = state.models.find_with_providers(&requested).await?;
    if found.len() != requested.len() {
        let found_ids: std::collections::HashSet<ModelId> =
            found.iter().map(|(model, _)| model.id).collect();
        let missing: Vec<String> = requested
            .iter()
            .filter(|id| !found_ids.contains(id))
            .map(|id| id.to_string())
            .collect();
        return Err(ApiError::Validation(format!(
            "Model IDs not found: {}",
            missing.join(", ")
        )));
    }

    // Snapshot targets in request order
    let by_id: HashMap<ModelId, _> = found
        .into_iter()
        .map(|(model, provider)| (model.id, (model, provider)))
        .collect();
    let mut targets = Vec::with_capacity(requested.len());
    for id in &requested {
        if let Some(target) = by_id.get(id) {
            targets.push(target.clone());
        }
    }

    let name = payload.name.unwrap_or_else(|| {
        format!("Benchmark {}", chrono::Utc::now().format("%Y-%m-%d %H:%M"))
    });
    let run = BenchmarkRun::new(name, requested, &payload.prompt_pack, TriggerSource::User);
    state.benchmarks.create_run(&run).await?;

    let config = BenchmarkConfig {
        models: targets,
        prompt_pack: payload.prompt_pack,
        max_tokens: payload.max_tokens,
        num_runs: payload.num_runs,
        warmup_runs: payload.warmup_runs,
    };

    let orchestrator = state.orchestrator.clone();
    let run_id = run.id;
    let handle = tokio::spawn(async move {
        orchestrator.execute(run_id, config).await;
    });
    state.runs.register(run_id, handle);

    info!(%run_id, "benchmark run accepted");
    Ok(Accepted(BenchmarkStartResponse {
        id: run.id.into_uuid(),
        status: "pending".to_string(),
        message: "Benchmark run started".to_string(),
    }))
}

/// List benchmark runs
#[utoipa::path(
    get,
    path = "/api/v1/benchmarks",
    tag = "benchmarks",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Items per page"),
        ("status" = Option<String>, Query, description = "Filter by run status"),
    ),
    responses(
        (status = 200, description = "Run listing", body = BenchmarkListResponse),
        (status = 400, description = "Invalid status filter"),
    )
)]
async fn list_benchmarks(
    State(state): State<AppState>,
    Query(params): Query<BenchmarkListParams>,
) -> ApiResult<Json<BenchmarkListResponse>> {
    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<RunStatus>().map_err(ApiError::Validation))
        .transpose()?;

    let pagination = PaginationParams::new(params.page, params.per_page);
    let (summaries, total) = state.benchmarks.list_runs(status, &pagination).await?;

    Ok(Json(BenchmarkListResponse {
        runs: summaries
            .iter()
            .map(|summary| BenchmarkRunResponse::from_run(&summary.run, summary.result_count))
            .collect(),
        total,
        page: pagination.page,
        per_page: pagination.per_page,
    }))
}

async fn load_run(state: &AppState, id: Uuid) -> ApiResult<BenchmarkRun> {
    state
        .benchmarks
        .get_run(id.into())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Benchmark run {id} not found")))
}

/// Display names for the models referenced by a result set.
async fn model_display_names(
    state: &AppState,
    results: &[BenchmarkResult],
) -> ApiResult<HashMap<ModelId, String>> {
    let ids: Vec<ModelId> = {
        let mut seen = std::collections::HashSet::new();
        results
            .iter()
            .map(|r| r.model_id)
            .filter(|id| seen.insert(*id))
            .collect()
    };
    let models = state.models.find_by_ids(&ids).await?;
    Ok(models
        .into_iter()
        .map(|model| (model.id, model.display_name().to_string()))
        .collect())
}

/// Benchmark run detail with computed percentile statistics
#[utoipa::path(
    get,
    path = "/api/v1/benchmarks/{id}",
    tag = "benchmarks",
    params(("id" = Uuid, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Run detail", body = BenchmarkDetailResponse),
        (status = 404, description = "Run not found"),
    )
)]
async fn get_benchmark(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BenchmarkDetailResponse>> {
    let run = load_run(&state, id).await?;
    let results = state.benchmarks.results_for_run(run.id).await?;
    let names = model_display_names(&state, &results).await?;

    let statistics = compute_statistics(&results);
    let result_count = results.len() as i64;

    Ok(Json(BenchmarkDetailResponse {
        run: BenchmarkRunResponse::from_run(&run, result_count),
        results: results
            .iter()
            .map(|r| BenchmarkResultResponse::from_result(r, names.get(&r.model_id).cloned()))
            .collect(),
        statistics: StatisticsResponse {
            ttft_p50: statistics.ttft.p50,
            ttft_p95: statistics.ttft.p95,
            ttft_p99: statistics.ttft.p99,
            tps_p50: statistics.tps.p50,
            tps_p95: statistics.tps.p95,
            tps_p99: statistics.tps.p99,
        },
    }))
}

/// Results for a run in planning order
#[utoipa::path(
    get,
    path = "/api/v1/benchmarks/{id}/results",
    tag = "benchmarks",
    params(("id" = Uuid, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Run results", body = BenchmarkResultListResponse),
        (status = 404, description = "Run not found"),
    )
)]
async fn get_benchmark_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BenchmarkResultListResponse>> {
    let run = load_run(&state, id).await?;
    let results = state.benchmarks.results_for_run(run.id).await?;
    let names = model_display_names(&state, &results).await?;

    let total = results.len();
    Ok(Json(BenchmarkResultListResponse {
        results: results
            .iter()
            .map(|r| BenchmarkResultResponse::from_result(r, names.get(&r.model_id).cloned()))
            .collect(),
        total,
    }))
}

/// Export a run's results as JSON or CSV
#[utoipa::path(
    get,
    path = "/api/v1/benchmarks/{id}/export",
    tag = "benchmarks",
    params(
        ("id" = Uuid, Path, description = "Run ID"),
        ("format" = Option<String>, Query, description = "json or csv"),
    ),
    responses(
        (status = 200, description = "Export file"),
        (status = 400, description = "Unknown format"),
        (status = 404, description = "Run not found"),
    )
)]
async fn export_benchmark(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ExportParams>,
) -> ApiResult<FileDownload> {
    if params.format != "json" && params.format != "csv" {
        return Err(ApiError::Validation(
            "format must be 'json' or 'csv'".to_string(),
        ));
    }

    let run = load_run(&state, id).await?;
    let results = state.benchmarks.results_for_run(run.id).await?;

    // Export rows carry provider kinds alongside display names
    let ids: Vec<ModelId> = run.model_ids.clone();
    let with_providers = state.models.find_with_providers(&ids).await?;
    let mut names: HashMap<ModelId, (String, String)> = with_providers
        .into_iter()
        .map(|(model, provider)| {
            (
                model.id,
                (
                    model.display_name().to_string(),
                    provider.provider_kind.to_string(),
                ),
            )
        })
        .collect();
    // Results may reference models the snapshot no longer resolves
    for result in &results {
        names
            .entry(result.model_id)
            .or_insert_with(|| ("Unknown".to_string(), "Unknown".to_string()));
    }

    if params.format == "json" {
        let rows: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                let (model_name, provider) = &names[&r.model_id];
                serde_json::json!({
                    "model_name": model_name,
                    "provider": provider,
                    "ttft_ms": r.ttft_ms,
                    "tps": r.tps,
                    "tps_excluding_ttft": r.tps_excluding_ttft,
                    "total_latency_ms": r.total_latency_ms,
                    "input_tokens": r.input_tokens,
                    "output_tokens": r.output_tokens,
                    "error": r.error,
                    "timestamp": r.created_at.to_rfc3339(),
                })
            })
            .collect();
        let export = serde_json::json!({
            "run_id": run.id.to_string(),
            "run_name": run.name,
            "prompt_pack": run.prompt_pack,
            "started_at": run.started_at.to_rfc3339(),
            "completed_at": run.completed_at.map(|t| t.to_rfc3339()),
            "results": rows,
        });
        let content = serde_json::to_vec_pretty(&export)
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        return Ok(FileDownload {
            content,
            content_type: "application/json",
            filename: format!("benchmark_{id}.json"),
        });
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "model_name",
            "provider",
            "ttft_ms",
            "tps",
            "tps_excluding_ttft",
            "total_latency_ms",
            "input_tokens",
            "output_tokens",
            "error",
            "timestamp",
        ])
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    for r in &results {
        let (model_name, provider) = &names[&r.model_id];
        writer
            .write_record([
                model_name.as_str(),
                provider.as_str(),
                &r.ttft_ms.to_string(),
                &r.tps.to_string(),
                &r.tps_excluding_ttft.to_string(),
                &r.total_latency_ms.to_string(),
                &r.input_tokens.to_string(),
                &r.output_tokens.to_string(),
                r.error.as_deref().unwrap_or(""),
                &r.created_at.to_rfc3339(),
            ])
            .map_err(|err| ApiError::Internal(err.to_string()))?;
    }
    let content = writer
        .into_inner()
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(FileDownload {
        content,
        content_type: "text/csv; charset=utf-8",
        filename: format!("benchmark_{id}.csv"),
    })
}

/// Live progress WebSocket for one run
///
/// Subscribes the socket to the progress bus. The server answers text `ping`
/// with `pong` and sends a `{"type":"ping"}` keep-alive after 30 s of idle;
/// terminal events close the stream after delivery.
async fn stream_benchmark(
    ws: WebSocketUpgrade,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_stream_socket(socket, id, state))
}

async fn handle_stream_socket(mut socket: WebSocket, id: Uuid, state: AppState) {
    let run_id = id.into();
    let mut subscription = state.bus.subscribe(run_id);

    loop {
        tokio::select! {
            event = subscription.receiver.recv() => {
                let Some(event) = event else { break };
                let terminal = event.is_terminal();
                let Ok(payload) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
                if terminal {
                    break;
                }
            }
            incoming = tokio::time::timeout(KEEPALIVE_IDLE, socket.recv()) => {
                match incoming {
                    Ok(Some(Ok(Message::Text(text)))) if text == "ping" => {
                        if socket.send(Message::Text("pong".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(_))) => break,
                    // Idle: send the keep-alive ping
                    Err(_) => {
                        let ping = r#"{"type":"ping"}"#.to_string();
                        if socket.send(Message::Text(ping)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    state.bus.unsubscribe(subscription.handle);
}
