//! Monitoring configuration, manual runs, uptime history, and export.

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use arguslm_domain::{
    is_valid_prompt_pack, list_prompt_packs, MonitoringConfig, UptimeStatus,
};
use arguslm_infrastructure::{MonitoringRepository as _, UptimeCheckWithModel, UptimeQuery};

use crate::error::{ApiError, ApiResult};
use crate::responses::FileDownload;
use crate::state::AppState;

const MAX_HISTORY_LIMIT: u32 = 1000;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MonitoringConfigResponse {
    #[schema(value_type = Uuid)]
    pub id: Uuid,
    pub interval_minutes: u32,
    pub prompt_pack: String,
    pub enabled: bool,
    #[schema(value_type = Option<String>)]
    pub last_run_at: Option<chrono::DateTime<chrono::Utc>>,
    #[schema(value_type = String)]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<MonitoringConfig> for MonitoringConfigResponse {
    fn from(config: MonitoringConfig) -> Self {
        Self {
            id: config.id.into_uuid(),
            interval_minutes: config.interval_minutes,
            prompt_pack: config.prompt_pack,
            enabled: config.enabled,
            last_run_at: config.last_run_at,
            updated_at: config.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MonitoringConfigUpdate {
    pub interval_minutes: Option<u32>,
    pub prompt_pack: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MonitoringRunResponse {
    pub run_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UptimeCheckResponse {
    #[schema(value_type = Uuid)]
    pub id: Uuid,
    #[schema(value_type = Uuid)]
    pub model_id: Uuid,
    pub model_name: String,
    #[schema(value_type = String)]
    pub status: UptimeStatus,
    pub latency_ms: Option<f64>,
    pub ttft_ms: Option<f64>,
    pub tps: Option<f64>,
    pub output_tokens: Option<i64>,
    pub error: Option<String>,
    #[schema(value_type = String)]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&UptimeCheckWithModel> for UptimeCheckResponse {
    fn from(row: &UptimeCheckWithModel) -> Self {
        Self {
            id: row.check.id.into_uuid(),
            model_id: row.check.model_id.into_uuid(),
            model_name: row.model_name.clone(),
            status: row.check.status,
            latency_ms: row.check.latency_ms,
            ttft_ms: row.check.ttft_ms,
            tps: row.check.tps,
            output_tokens: row.check.output_tokens,
            error: row.check.error.clone(),
            created_at: row.check.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UptimeHistoryResponse {
    pub items: Vec<UptimeCheckResponse>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Deserialize)]
pub struct UptimeHistoryParams {
    pub model_id: Option<Uuid>,
    pub status: Option<String>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub enabled_only: bool,
    #[serde(default = "default_history_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_history_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
pub struct UptimeExportParams {
    #[serde(default = "default_format")]
    pub format: String,
    pub model_id: Option<Uuid>,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
}

fn default_format() -> String {
    "json".to_string()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PromptPackResponse {
    pub id: String,
    pub name: String,
    pub prompt: String,
    pub expected_tokens: u32,
}

/// Monitoring routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/monitoring/config",
            get(get_monitoring_config).patch(update_monitoring_config),
        )
        .route("/monitoring/run", post(trigger_monitoring_run))
        .route("/monitoring/uptime", get(get_uptime_history))
        .route("/monitoring/uptime/export", get(export_uptime_history))
        .route("/monitoring/prompt-packs", get(get_prompt_packs))
}

/// Read the monitoring configuration, creating defaults on first access
#[utoipa::path(
    get,
    path = "/api/v1/monitoring/config",
    tag = "monitoring",
    responses((status = 200, description = "Current configuration", body = MonitoringConfigResponse))
)]
async fn get_monitoring_config(
    State(state): State<AppState>,
) -> ApiResult<Json<MonitoringConfigResponse>> {
    let config = state.monitoring.get_or_create_config().await?;
    Ok(Json(config.into()))
}

/// Update the monitoring configuration and reconfigure the scheduler
#[utoipa::path(
    patch,
    path = "/api/v1/monitoring/config",
    tag = "monitoring",
    request_body = MonitoringConfigUpdate,
    responses(
        (status = 200, description = "Updated configuration", body = MonitoringConfigResponse),
        (status = 400, description = "Invalid interval or prompt pack"),
    )
)]
async fn update_monitoring_config(
    State(state): State<AppState>,
    Json(payload): Json<MonitoringConfigUpdate>,
) -> ApiResult<Json<MonitoringConfigResponse>> {
    let mut config = state.monitoring.get_or_create_config().await?;

    if let Some(interval_minutes) = payload.interval_minutes {
        if interval_minutes < 1 {
            return Err(ApiError::Validation(
                "interval_minutes must be >= 1".to_string(),
            ));
        }
        config.interval_minutes = interval_minutes;
    }

    if let Some(prompt_pack) = payload.prompt_pack {
        if !is_valid_prompt_pack(&prompt_pack) {
            let valid: Vec<&str> = list_prompt_packs().map(|p| p.id).collect();
            return Err(ApiError::Validation(format!(
                "prompt_pack must be one of: {}",
                valid.join(", ")
            )));
        }
        config.prompt_pack = prompt_pack;
    }

    if let Some(enabled) = payload.enabled {
        config.enabled = enabled;
    }

    state.monitoring.update_config(&config).await?;

    // The only way interval/enablement changes take effect mid-process
    state.scheduler.configure(config.interval_minutes, config.enabled);

    let config = state.monitoring.get_or_create_config().await?;
    Ok(Json(config.into()))
}

/// Queue a manual monitoring tick
#[utoipa::path(
    post,
    path = "/api/v1/monitoring/run",
    tag = "monitoring",
    responses((status = 200, description = "Tick queued", body = MonitoringRunResponse))
)]
async fn trigger_monitoring_run(
    State(state): State<AppState>,
) -> ApiResult<Json<MonitoringRunResponse>> {
    let run_id = Uuid::new_v4().to_string();
    let scheduler = state.scheduler.clone();
    tokio::spawn(async move {
        scheduler.run_once().await;
    });

    info!(%run_id, "queued manual monitoring run");
    Ok(Json(MonitoringRunResponse {
        run_id,
        status: "queued".to_string(),
        message: "Monitoring run queued for execution".to_string(),
    }))
}

/// Paginated uptime history with joined model names
#[utoipa::path(
    get,
    path = "/api/v1/monitoring/uptime",
    tag = "monitoring",
    params(
        ("model_id" = Option<Uuid>, Query, description = "Filter by model"),
        ("status" = Option<String>, Query, description = "Filter by status (up, down, degraded)"),
        ("since" = Option<String>, Query, description = "Filter by created_at >= since"),
        ("enabled_only" = Option<bool>, Query, description = "Only models still monitored"),
        ("limit" = Option<u32>, Query, description = "Page size (max 1000)"),
        ("offset" = Option<u32>, Query, description = "Pagination offset"),
    ),
    responses(
        (status = 200, description = "Uptime history", body = UptimeHistoryResponse),
        (status = 400, description = "Invalid status filter"),
    )
)]
async fn get_uptime_history(
    State(state): State<AppState>,
    Query(params): Query<UptimeHistoryParams>,
) -> ApiResult<Json<UptimeHistoryResponse>> {
    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<UptimeStatus>().map_err(ApiError::Validation))
        .transpose()?;

    let limit = params.limit.clamp(1, MAX_HISTORY_LIMIT);
    let query = UptimeQuery {
        model_id: params.model_id.map(Into::into),
        status,
        since: params.since,
        enabled_only: params.enabled_only,
        limit,
        offset: params.offset,
    };

    let (rows, total) = state.monitoring.history(&query).await?;
    Ok(Json(UptimeHistoryResponse {
        items: rows.iter().map(UptimeCheckResponse::from).collect(),
        total,
        limit,
        offset: params.offset,
    }))
}

/// Bulk export of uptime history as JSON or CSV
#[utoipa::path(
    get,
    path = "/api/v1/monitoring/uptime/export",
    tag = "monitoring",
    params(
        ("format" = Option<String>, Query, description = "json or csv"),
        ("model_id" = Option<Uuid>, Query, description = "Filter by model"),
        ("start_date" = Option<String>, Query, description = "Filter by created_at >= start_date"),
        ("end_date" = Option<String>, Query, description = "Filter by created_at <= end_date"),
    ),
    responses(
        (status = 200, description = "Export file"),
        (status = 400, description = "Unknown format"),
    )
)]
async fn export_uptime_history(
    State(state): State<AppState>,
    Query(params): Query<UptimeExportParams>,
) -> ApiResult<FileDownload> {
    if params.format != "json" && params.format != "csv" {
        return Err(ApiError::Validation(
            "format must be 'json' or 'csv'".to_string(),
        ));
    }

    let rows = state
        .monitoring
        .export_rows(
            params.model_id.map(Into::into),
            params.start_date,
            params.end_date,
        )
        .await?;

    if params.format == "json" {
        let checks: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                serde_json::json!({
                    "model_name": row.model_name,
                    "provider": row.provider_kind,
                    "status": row.check.status.as_str(),
                    "latency_ms": row.check.latency_ms,
                    "error": row.check.error,
                    "timestamp": row.check.created_at.to_rfc3339(),
                })
            })
            .collect();
        let content = serde_json::to_vec_pretty(&serde_json::json!({ "checks": checks }))
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        return Ok(FileDownload {
            content,
            content_type: "application/json",
            filename: "uptime_history.json".to_string(),
        });
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["model_name", "provider", "status", "latency_ms", "error", "timestamp"])
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    for row in &rows {
        writer
            .write_record([
                row.model_name.as_str(),
                row.provider_kind.as_str(),
                row.check.status.as_str(),
                &row.check
                    .latency_ms
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                row.check.error.as_deref().unwrap_or(""),
                &row.check.created_at.to_rfc3339(),
            ])
            .map_err(|err| ApiError::Internal(err.to_string()))?;
    }
    let content = writer
        .into_inner()
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(FileDownload {
        content,
        content_type: "text/csv; charset=utf-8",
        filename: "uptime_history.csv".to_string(),
    })
}

/// Enumerate the built-in prompt packs
#[utoipa::path(
    get,
    path = "/api/v1/monitoring/prompt-packs",
    tag = "monitoring",
    responses((status = 200, description = "Available prompt packs", body = [PromptPackResponse]))
)]
async fn get_prompt_packs() -> Json<Vec<PromptPackResponse>> {
    Json(
        list_prompt_packs()
            .map(|pack| PromptPackResponse {
                id: pack.id.to_string(),
                name: pack.name.to_string(),
                prompt: pack.prompt.to_string(),
                expected_tokens: pack.expected_tokens,
            })
            .collect(),
    )
}
