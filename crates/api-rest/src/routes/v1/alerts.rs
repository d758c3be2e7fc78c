//! Alert rule CRUD and alert listing/acknowledgement endpoints.

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use arguslm_domain::{Alert, AlertRule, AlertRuleKind};
use arguslm_infrastructure::{AlertQuery, AlertRepository as _};

use crate::error::{ApiError, ApiResult};
use crate::responses::{Created, NoContent};
use crate::state::AppState;

const MAX_ALERT_LIMIT: u32 = 500;
const MAX_RECENT_LIMIT: u32 = 50;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertRuleResponse {
    #[schema(value_type = Uuid)]
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String)]
    pub rule_kind: AlertRuleKind,
    pub enabled: bool,
    #[schema(value_type = Option<Uuid>)]
    pub target_model_id: Option<Uuid>,
    pub target_model_name: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub threshold_config: Option<serde_json::Value>,
    pub notify_in_app: bool,
    pub notify_email: bool,
    pub notify_webhook: bool,
    pub webhook_url: Option<String>,
    #[schema(value_type = String)]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&AlertRule> for AlertRuleResponse {
    fn from(rule: &AlertRule) -> Self {
        Self {
            id: rule.id.into_uuid(),
            name: rule.name.clone(),
            rule_kind: rule.rule_kind,
            enabled: rule.enabled,
            target_model_id: rule.target_model_id.map(|id| id.into_uuid()),
            target_model_name: rule.target_model_name.clone(),
            threshold_config: rule.threshold_config.clone(),
            notify_in_app: rule.notify_in_app,
            notify_email: rule.notify_email,
            notify_webhook: rule.notify_webhook,
            webhook_url: rule.webhook_url.clone(),
            created_at: rule.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AlertRuleCreate {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[schema(value_type = String)]
    pub rule_kind: AlertRuleKind,
    #[schema(value_type = Option<Uuid>)]
    pub target_model_id: Option<Uuid>,
    pub target_model_name: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub threshold_config: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub notify_in_app: bool,
    #[serde(default)]
    pub notify_email: bool,
    #[serde(default)]
    pub notify_webhook: bool,
    pub webhook_url: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AlertRuleUpdate {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub notify_in_app: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertResponse {
    #[schema(value_type = Uuid)]
    pub id: Uuid,
    #[schema(value_type = Uuid)]
    pub rule_id: Uuid,
    #[schema(value_type = Option<Uuid>)]
    pub model_id: Option<Uuid>,
    pub message: String,
    pub acknowledged: bool,
    #[schema(value_type = String)]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Alert> for AlertResponse {
    fn from(alert: &Alert) -> Self {
        Self {
            id: alert.id.into_uuid(),
            rule_id: alert.rule_id.into_uuid(),
            model_id: alert.model_id.map(|id| id.into_uuid()),
            message: alert.message.clone(),
            acknowledged: alert.acknowledged,
            created_at: alert.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertListResponse {
    pub items: Vec<AlertResponse>,
    pub unacknowledged_count: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecentAlertsResponse {
    pub items: Vec<AlertResponse>,
    pub total_unread: u64,
}

#[derive(Debug, Deserialize)]
pub struct AlertListParams {
    pub rule_id: Option<Uuid>,
    pub acknowledged: Option<bool>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default = "default_alert_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_alert_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    #[serde(default = "default_recent_limit")]
    pub limit: u32,
}

fn default_recent_limit() -> u32 {
    10
}

/// Alert routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/rules", get(list_alert_rules).post(create_alert_rule))
        .route(
            "/alerts/rules/:id",
            patch(update_alert_rule).delete(delete_alert_rule),
        )
        .route("/alerts/unread-count", get(get_unread_count))
        .route("/alerts/recent", get(get_recent_alerts))
        .route("/alerts/:id/acknowledge", patch(acknowledge_alert))
}

/// List all alert rules
#[utoipa::path(
    get,
    path = "/api/v1/alerts/rules",
    tag = "alerts",
    responses((status = 200, description = "All alert rules", body = [AlertRuleResponse]))
)]
async fn list_alert_rules(State(state): State<AppState>) -> ApiResult<Json<Vec<AlertRuleResponse>>> {
    let rules = state.alerts.list_rules().await?;
    Ok(Json(rules.iter().map(AlertRuleResponse::from).collect()))
}

/// Create an alert rule
///
/// Validates the cross-field requirements of the rule kind.
#[utoipa::path(
    post,
    path = "/api/v1/alerts/rules",
    tag = "alerts",
    request_body = AlertRuleCreate,
    responses(
        (status = 201, description = "Rule created", body = AlertRuleResponse),
        (status = 400, description = "Cross-field validation failed"),
    )
)]
async fn create_alert_rule(
    State(state): State<AppState>,
    Json(payload): Json<AlertRuleCreate>,
) -> ApiResult<Created<AlertRuleResponse>> {
    payload.validate()?;

    let mut rule = AlertRule::new(payload.name, payload.rule_kind);
    rule.target_model_id = payload.target_model_id.map(Into::into);
    rule.target_model_name = payload.target_model_name;
    rule.threshold_config = payload.threshold_config;
    rule.enabled = payload.enabled;
    rule.notify_in_app = payload.notify_in_app;
    rule.notify_email = payload.notify_email;
    rule.notify_webhook = payload.notify_webhook;
    rule.webhook_url = payload.webhook_url;

    rule.validate()?;
    state.alerts.create_rule(&rule).await?;
    Ok(Created(AlertRuleResponse::from(&rule)))
}

/// Update an alert rule
#[utoipa::path(
    patch,
    path = "/api/v1/alerts/rules/{id}",
    tag = "alerts",
    params(("id" = Uuid, Path, description = "Rule ID")),
    request_body = AlertRuleUpdate,
    responses(
        (status = 200, description = "Updated rule", body = AlertRuleResponse),
        (status = 404, description = "Rule not found"),
    )
)]
async fn update_alert_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AlertRuleUpdate>,
) -> ApiResult<Json<AlertRuleResponse>> {
    payload.validate()?;

    let mut rule = state
        .alerts
        .get_rule(id.into())
        .await?
        .ok_or_else(|| ApiError::NotFound("Alert rule not found".to_string()))?;

    if let Some(name) = payload.name {
        rule.name = name;
    }
    if let Some(enabled) = payload.enabled {
        rule.enabled = enabled;
    }
    if let Some(notify_in_app) = payload.notify_in_app {
        rule.notify_in_app = notify_in_app;
    }

    state.alerts.update_rule(&rule).await?;
    let rule = state
        .alerts
        .get_rule(id.into())
        .await?
        .ok_or_else(|| ApiError::NotFound("Alert rule not found".to_string()))?;
    Ok(Json(AlertRuleResponse::from(&rule)))
}

/// Delete an alert rule (its alerts cascade)
#[utoipa::path(
    delete,
    path = "/api/v1/alerts/rules/{id}",
    tag = "alerts",
    params(("id" = Uuid, Path, description = "Rule ID")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 404, description = "Rule not found"),
    )
)]
async fn delete_alert_rule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<NoContent> {
    if !state.alerts.delete_rule(id.into()).await? {
        return Err(ApiError::NotFound("Alert rule not found".to_string()));
    }
    Ok(NoContent)
}

/// List triggered alerts
#[utoipa::path(
    get,
    path = "/api/v1/alerts",
    tag = "alerts",
    params(
        ("rule_id" = Option<Uuid>, Query, description = "Filter by rule"),
        ("acknowledged" = Option<bool>, Query, description = "Filter by acknowledgement"),
        ("since" = Option<String>, Query, description = "Filter alerts since this time"),
        ("limit" = Option<u32>, Query, description = "Page size (max 500)"),
        ("offset" = Option<u32>, Query, description = "Pagination offset"),
    ),
    responses((status = 200, description = "Alert listing", body = AlertListResponse))
)]
async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertListParams>,
) -> ApiResult<Json<AlertListResponse>> {
    let limit = params.limit.clamp(1, MAX_ALERT_LIMIT);
    let query = AlertQuery {
        rule_id: params.rule_id.map(Into::into),
        acknowledged: params.acknowledged,
        since: params.since,
        limit,
        offset: params.offset,
    };

    let (alerts, _total) = state.alerts.list_alerts(&query).await?;
    let unacknowledged_count = state.alerts.unacknowledged_count().await?;

    Ok(Json(AlertListResponse {
        items: alerts.iter().map(AlertResponse::from).collect(),
        unacknowledged_count,
        limit,
        offset: params.offset,
    }))
}

/// Count of unacknowledged alerts, for the notification badge
#[utoipa::path(
    get,
    path = "/api/v1/alerts/unread-count",
    tag = "alerts",
    responses((status = 200, description = "Unacknowledged count", body = UnreadCountResponse))
)]
async fn get_unread_count(State(state): State<AppState>) -> ApiResult<Json<UnreadCountResponse>> {
    let count = state.alerts.unacknowledged_count().await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// Most recent alerts for the notification dropdown
#[utoipa::path(
    get,
    path = "/api/v1/alerts/recent",
    tag = "alerts",
    params(("limit" = Option<u32>, Query, description = "Maximum alerts (max 50)")),
    responses((status = 200, description = "Recent alerts", body = RecentAlertsResponse))
)]
async fn get_recent_alerts(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> ApiResult<Json<RecentAlertsResponse>> {
    let limit = params.limit.clamp(1, MAX_RECENT_LIMIT);
    let alerts = state.alerts.recent_alerts(limit).await?;
    let total_unread = state.alerts.unacknowledged_count().await?;

    Ok(Json(RecentAlertsResponse {
        items: alerts.iter().map(AlertResponse::from).collect(),
        total_unread,
    }))
}

/// Acknowledge an alert (idempotent)
#[utoipa::path(
    patch,
    path = "/api/v1/alerts/{id}/acknowledge",
    tag = "alerts",
    params(("id" = Uuid, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Acknowledged alert", body = AlertResponse),
        (status = 404, description = "Alert not found"),
    )
)]
async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AlertResponse>> {
    let alert = state
        .alerts
        .acknowledge(id.into())
        .await?
        .ok_or_else(|| ApiError::NotFound("Alert not found".to_string()))?;
    Ok(Json(AlertResponse::from(&alert)))
}
