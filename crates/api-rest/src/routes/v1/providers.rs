//! Provider account endpoints.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use arguslm_application::{
    discovery_for_kind, CompletionRequest, CompletionTarget, DiscoveryError,
};
use arguslm_common::VaultError;
use arguslm_domain::{
    catalog, Model, ProviderAccount, ProviderCredentials, ProviderKind,
};
use arguslm_infrastructure::{ModelRepository as _, ProviderRepository as _};

use crate::error::{ApiError, ApiResult};
use crate::responses::{Created, NoContent};
use crate::state::AppState;

const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECTION_TEST_MAX_TOKENS: u32 = 10;

/// Provider account view. Credentials never appear here; only the
/// non-sensitive display fields extracted from the bundle.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProviderResponse {
    #[schema(value_type = Uuid)]
    pub id: Uuid,
    #[schema(value_type = String)]
    pub provider_kind: ProviderKind,
    pub display_name: String,
    pub enabled: bool,
    pub base_url: Option<String>,
    pub region: Option<String>,
    #[schema(value_type = String)]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[schema(value_type = String)]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProviderListResponse {
    pub providers: Vec<ProviderResponse>,
    pub total: usize,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProviderCreate {
    #[schema(value_type = String)]
    pub provider_kind: ProviderKind,
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
    /// Credential bundle; encrypted before it is stored
    #[schema(value_type = Object)]
    pub credentials: ProviderCredentials,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProviderUpdate {
    #[validate(length(min = 1, max = 255))]
    pub display_name: Option<String>,
    #[schema(value_type = Object)]
    pub credentials: Option<ProviderCredentials>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProviderTestResponse {
    pub success: bool,
    pub message: String,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProviderRefreshResponse {
    pub success: bool,
    pub models_discovered: usize,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderSpecResponse {
    pub id: &'static str,
    pub label: &'static str,
    pub requires_api_key: bool,
    pub requires_base_url: bool,
    pub requires_region: bool,
    pub default_base_url: Option<&'static str>,
}

/// Provider routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/providers", post(create_provider).get(list_providers))
        .route("/providers/catalog", get(provider_catalog))
        .route("/providers/test-connection", post(test_new_provider))
        .route(
            "/providers/:id",
            get(get_provider).patch(update_provider).delete(delete_provider),
        )
        .route("/providers/:id/test", post(test_provider))
        .route("/providers/:id/refresh-models", post(refresh_models))
}

fn build_response(state: &AppState, provider: &ProviderAccount) -> ProviderResponse {
    // Display fields only; a blob that fails to open just renders empty
    let credentials: Option<ProviderCredentials> =
        state.vault.decrypt(&provider.credentials_encrypted).ok();
    ProviderResponse {
        id: provider.id.into_uuid(),
        provider_kind: provider.provider_kind,
        display_name: provider.display_name.clone(),
        enabled: provider.enabled,
        base_url: credentials.as_ref().and_then(|c| c.base_url.clone()),
        region: credentials.as_ref().and_then(|c| c.region.clone()),
        created_at: provider.created_at,
        updated_at: provider.updated_at,
    }
}

async fn load_provider(state: &AppState, id: Uuid) -> ApiResult<ProviderAccount> {
    state
        .providers
        .get(id.into())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Provider account {id} not found")))
}

/// Create provider account
#[utoipa::path(
    post,
    path = "/api/v1/providers",
    tag = "providers",
    request_body = ProviderCreate,
    responses(
        (status = 201, description = "Provider created", body = ProviderResponse),
        (status = 400, description = "Invalid request"),
    )
)]
async fn create_provider(
    State(state): State<AppState>,
    Json(payload): Json<ProviderCreate>,
) -> ApiResult<Created<ProviderResponse>> {
    payload.validate()?;

    let encrypted = state
        .vault
        .encrypt(&payload.credentials)
        .map_err(|err: VaultError| ApiError::Internal(err.to_string()))?;
    let provider = ProviderAccount::new(payload.provider_kind, payload.display_name, encrypted);
    state.providers.create(&provider).await?;

    info!(
        display_name = %provider.display_name,
        kind = %provider.provider_kind,
        "created provider account"
    );
    Ok(Created(build_response(&state, &provider)))
}

/// List provider accounts
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "providers",
    responses((status = 200, description = "All provider accounts", body = ProviderListResponse))
)]
async fn list_providers(State(state): State<AppState>) -> ApiResult<Json<ProviderListResponse>> {
    let providers = state.providers.list().await?;
    let items: Vec<ProviderResponse> = providers
        .iter()
        .map(|provider| build_response(&state, provider))
        .collect();
    let total = items.len();
    Ok(Json(ProviderListResponse {
        providers: items,
        total,
    }))
}

/// Enumerate the provider catalog
#[utoipa::path(
    get,
    path = "/api/v1/providers/catalog",
    tag = "providers",
    responses((status = 200, description = "Supported provider kinds", body = [ProviderSpecResponse]))
)]
async fn provider_catalog() -> Json<Vec<ProviderSpecResponse>> {
    Json(
        catalog::all_provider_specs()
            .into_iter()
            .map(|spec| ProviderSpecResponse {
                id: spec.kind.as_str(),
                label: spec.label,
                requires_api_key: spec.requires_api_key,
                requires_base_url: spec.requires_base_url,
                requires_region: spec.requires_region,
                default_base_url: spec.default_base_url,
            })
            .collect(),
    )
}

/// Get one provider account
#[utoipa::path(
    get,
    path = "/api/v1/providers/{id}",
    tag = "providers",
    params(("id" = Uuid, Path, description = "Provider account ID")),
    responses(
        (status = 200, description = "Provider account", body = ProviderResponse),
        (status = 404, description = "Provider not found"),
    )
)]
async fn get_provider(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProviderResponse>> {
    let provider = load_provider(&state, id).await?;
    Ok(Json(build_response(&state, &provider)))
}

/// Update a provider account
#[utoipa::path(
    patch,
    path = "/api/v1/providers/{id}",
    tag = "providers",
    params(("id" = Uuid, Path, description = "Provider account ID")),
    request_body = ProviderUpdate,
    responses(
        (status = 200, description = "Updated provider", body = ProviderResponse),
        (status = 404, description = "Provider not found"),
    )
)]
async fn update_provider(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProviderUpdate>,
) -> ApiResult<Json<ProviderResponse>> {
    payload.validate()?;
    let mut provider = load_provider(&state, id).await?;

    if let Some(display_name) = payload.display_name {
        provider.display_name = display_name;
    }
    if let Some(credentials) = payload.credentials {
        provider.credentials_encrypted = state
            .vault
            .encrypt(&credentials)
            .map_err(|err| ApiError::Internal(err.to_string()))?;
    }
    if let Some(enabled) = payload.enabled {
        provider.enabled = enabled;
    }

    state.providers.update(&provider).await?;
    let provider = load_provider(&state, id).await?;
    info!(display_name = %provider.display_name, "updated provider account");
    Ok(Json(build_response(&state, &provider)))
}

/// Delete a provider account
///
/// Refused while any child model carries benchmark history.
#[utoipa::path(
    delete,
    path = "/api/v1/providers/{id}",
    tag = "providers",
    params(("id" = Uuid, Path, description = "Provider account ID")),
    responses(
        (status = 204, description = "Provider deleted"),
        (status = 404, description = "Provider not found"),
        (status = 409, description = "Provider has benchmark history"),
    )
)]
async fn delete_provider(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<NoContent> {
    let provider = load_provider(&state, id).await?;

    if state.providers.has_benchmark_history(provider.id).await? {
        return Err(ApiError::Conflict(
            "Cannot delete provider with models that have benchmark history".to_string(),
        ));
    }

    state.providers.delete(provider.id).await?;
    info!(display_name = %provider.display_name, "deleted provider account");
    Ok(NoContent)
}

/// Test connection for an unsaved provider
#[utoipa::path(
    post,
    path = "/api/v1/providers/test-connection",
    tag = "providers",
    request_body = ProviderCreate,
    responses((status = 200, description = "Connection test outcome", body = ProviderTestResponse))
)]
async fn test_new_provider(
    State(state): State<AppState>,
    Json(payload): Json<ProviderCreate>,
) -> ApiResult<Json<ProviderTestResponse>> {
    Ok(Json(
        run_connection_test(&state, payload.provider_kind, &payload.credentials).await,
    ))
}

/// Test connection for a stored provider
#[utoipa::path(
    post,
    path = "/api/v1/providers/{id}/test",
    tag = "providers",
    params(("id" = Uuid, Path, description = "Provider account ID")),
    responses(
        (status = 200, description = "Connection test outcome", body = ProviderTestResponse),
        (status = 404, description = "Provider not found"),
    )
)]
async fn test_provider(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProviderTestResponse>> {
    let provider = load_provider(&state, id).await?;
    let credentials: ProviderCredentials = state
        .vault
        .decrypt(&provider.credentials_encrypted)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Json(
        run_connection_test(&state, provider.provider_kind, &credentials).await,
    ))
}

/// Issue one minimal completion (or a local ping for ollama/lm_studio) and
/// report success with latency. Failures are reported, never raised.
async fn run_connection_test(
    state: &AppState,
    kind: ProviderKind,
    credentials: &ProviderCredentials,
) -> ProviderTestResponse {
    if kind.is_local() {
        let Some(base_url) = credentials.base_url.as_deref().filter(|u| !u.is_empty()) else {
            return ProviderTestResponse {
                success: false,
                message: "Base URL is required for local providers".to_string(),
                details: serde_json::json!({}),
            };
        };
        return ping_local_provider(base_url, kind).await;
    }

    let spec = catalog::provider_spec(kind);
    let target = CompletionTarget::new(kind, spec.test_model, credentials.clone());
    let request = CompletionRequest {
        max_tokens: Some(CONNECTION_TEST_MAX_TOKENS),
        timeout: CONNECTION_TEST_TIMEOUT,
        max_retries: Some(1),
        ..CompletionRequest::user_prompt("test")
    };

    let start = std::time::Instant::now();
    match state.invoker.complete(&target, &request).await {
        Ok(response) => {
            let latency_ms = start.elapsed().as_millis() as u64;
            info!(%kind, latency_ms, "connection test succeeded");
            ProviderTestResponse {
                success: true,
                message: format!("Successfully connected to {kind}"),
                details: serde_json::json!({
                    "model_tested": spec.test_model,
                    "response_id": response.id,
                    "latency_ms": latency_ms,
                }),
            }
        }
        Err(err) => {
            warn!(%kind, error = %err, "connection test failed");
            ProviderTestResponse {
                success: false,
                message: format!("Connection test failed: {err}"),
                details: serde_json::json!({}),
            }
        }
    }
}

/// Local inference servers answer a plain listing GET faster and without
/// loading a model; ollama uses /api/tags, lm_studio /models.
async fn ping_local_provider(base_url: &str, kind: ProviderKind) -> ProviderTestResponse {
    let base = base_url.trim_end_matches('/');
    let url = if kind == ProviderKind::Ollama {
        format!("{}/api/tags", base.trim_end_matches("/v1").trim_end_matches('/'))
    } else {
        format!("{base}/models")
    };

    let client = reqwest::Client::new();
    let start = std::time::Instant::now();
    match client.get(&url).timeout(CONNECTION_TEST_TIMEOUT).send().await {
        Ok(response) if response.status().is_success() => {
            let latency_ms = start.elapsed().as_millis() as u64;
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let model_count = body
                .get("models")
                .or_else(|| body.get("data"))
                .and_then(|v| v.as_array())
                .map(|models| models.len())
                .unwrap_or(0);
            ProviderTestResponse {
                success: true,
                message: format!(
                    "Server reachable, {model_count} model(s) available ({latency_ms}ms)"
                ),
                details: serde_json::json!({
                    "models_found": model_count,
                    "latency_ms": latency_ms,
                }),
            }
        }
        Ok(response) => ProviderTestResponse {
            success: false,
            message: format!("Server returned status {}", response.status().as_u16()),
            details: serde_json::json!({"status_code": response.status().as_u16()}),
        },
        Err(err) => ProviderTestResponse {
            success: false,
            message: format!("Cannot connect to {base_url}. Check if server is running."),
            details: serde_json::json!({"hint": err.to_string()}),
        },
    }
}

/// Run model discovery and register newly seen models
#[utoipa::path(
    post,
    path = "/api/v1/providers/{id}/refresh-models",
    tag = "providers",
    params(("id" = Uuid, Path, description = "Provider account ID")),
    responses(
        (status = 200, description = "Discovery outcome", body = ProviderRefreshResponse),
        (status = 400, description = "Discovery not supported for this kind"),
        (status = 404, description = "Provider not found"),
    )
)]
async fn refresh_models(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProviderRefreshResponse>> {
    let provider = load_provider(&state, id).await?;
    let credentials: ProviderCredentials = state
        .vault
        .decrypt(&provider.credentials_encrypted)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let discovery = discovery_for_kind(provider.provider_kind).map_err(|err| match err {
        DiscoveryError::Unsupported(kind) => {
            ApiError::BadRequest(format!("Model discovery not supported for provider kind: {kind}"))
        }
        other => ApiError::ServiceUnavailable(other.to_string()),
    })?;

    let discovered = discovery
        .list_models(&provider, &credentials)
        .await
        .map_err(|err| match err {
            DiscoveryError::MissingBaseUrl => ApiError::BadRequest(err.to_string()),
            other => ApiError::ServiceUnavailable(format!("Model refresh failed: {other}")),
        })?;

    // Upsert: only model ids not yet present for this account are added
    let mut new_count = 0usize;
    for descriptor in &discovered {
        if state.models.exists(provider.id, &descriptor.model_id).await? {
            continue;
        }
        let model = Model::discovered(
            provider.id,
            descriptor.model_id.clone(),
            descriptor.metadata.clone(),
        );
        state.models.create(&model).await?;
        new_count += 1;
    }

    info!(
        display_name = %provider.display_name,
        discovered = discovered.len(),
        new = new_count,
        "refreshed provider models"
    );

    Ok(Json(ProviderRefreshResponse {
        success: true,
        models_discovered: discovered.len(),
        message: format!(
            "Discovered {} models, added {} new models",
            discovered.len(),
            new_count
        ),
    }))
}
