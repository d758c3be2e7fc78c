//! Model management endpoints.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use arguslm_domain::{validate_model_id, Model, ModelSource, ProviderAccount};
use arguslm_infrastructure::{ModelQuery, ModelRepository as _, ProviderRepository as _};

use crate::error::{ApiError, ApiResult};
use crate::responses::Created;
use crate::state::AppState;

const MAX_PAGE_SIZE: u32 = 200;

/// Model view with its provider's display name joined in.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModelResponse {
    #[schema(value_type = Uuid)]
    pub id: Uuid,
    #[schema(value_type = Uuid)]
    pub provider_account_id: Uuid,
    pub model_id: String,
    pub custom_name: Option<String>,
    #[schema(value_type = String)]
    pub source: ModelSource,
    pub enabled_for_monitoring: bool,
    pub enabled_for_benchmark: bool,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub provider_name: Option<String>,
    #[schema(value_type = String)]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[schema(value_type = String)]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ModelResponse {
    fn from_model(model: &Model, provider_name: Option<String>) -> Self {
        Self {
            id: model.id.into_uuid(),
            provider_account_id: model.provider_account_id.into_uuid(),
            model_id: model.model_id.clone(),
            custom_name: model.custom_name.clone(),
            source: model.source,
            enabled_for_monitoring: model.enabled_for_monitoring,
            enabled_for_benchmark: model.enabled_for_benchmark,
            metadata: model.metadata.clone(),
            provider_name,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ModelListResponse {
    pub items: Vec<ModelResponse>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Deserialize)]
pub struct ModelListParams {
    pub provider_id: Option<Uuid>,
    pub enabled_for_monitoring: Option<bool>,
    pub enabled_for_benchmark: Option<bool>,
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ModelCreate {
    #[schema(value_type = Uuid)]
    pub provider_account_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub model_id: String,
    #[validate(length(min = 1, max = 255))]
    pub custom_name: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: Option<serde_json::Value>,
}

/// PATCH payload. `custom_name` distinguishes "absent" from an explicit
/// `null` so operators can clear the name.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ModelUpdate {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub custom_name: Option<Option<String>>,
    pub enabled_for_monitoring: Option<bool>,
    pub enabled_for_benchmark: Option<bool>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Model routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/models", get(list_models).post(create_model))
        .route("/models/:id", get(get_model).patch(update_model))
}

/// List models with filters
#[utoipa::path(
    get,
    path = "/api/v1/models",
    tag = "models",
    params(
        ("provider_id" = Option<Uuid>, Query, description = "Filter by provider account"),
        ("enabled_for_monitoring" = Option<bool>, Query, description = "Filter by monitoring flag"),
        ("enabled_for_benchmark" = Option<bool>, Query, description = "Filter by benchmark flag"),
        ("search" = Option<String>, Query, description = "Substring over model_id and custom_name"),
        ("limit" = Option<u32>, Query, description = "Page size (max 200)"),
        ("offset" = Option<u32>, Query, description = "Pagination offset"),
    ),
    responses((status = 200, description = "Model listing", body = ModelListResponse))
)]
async fn list_models(
    State(state): State<AppState>,
    Query(params): Query<ModelListParams>,
) -> ApiResult<Json<ModelListResponse>> {
    let limit = params.limit.clamp(1, MAX_PAGE_SIZE);
    let query = ModelQuery {
        provider_id: params.provider_id.map(Into::into),
        enabled_for_monitoring: params.enabled_for_monitoring,
        enabled_for_benchmark: params.enabled_for_benchmark,
        search: params.search.clone(),
        limit,
        offset: params.offset,
    };

    let (models, total) = state.models.list(&query).await?;
    let provider_names = provider_name_map(&state).await?;

    let items = models
        .iter()
        .map(|model| {
            ModelResponse::from_model(model, provider_names.get(&model.provider_account_id.into_uuid()).cloned())
        })
        .collect();

    Ok(Json(ModelListResponse {
        items,
        total,
        limit,
        offset: params.offset,
    }))
}

async fn provider_name_map(state: &AppState) -> ApiResult<HashMap<Uuid, String>> {
    let providers = state.providers.list().await?;
    Ok(providers
        .into_iter()
        .map(|p| (p.id.into_uuid(), display_name(&p)))
        .collect())
}

fn display_name(provider: &ProviderAccount) -> String {
    if provider.display_name.is_empty() {
        provider.provider_kind.to_string()
    } else {
        provider.display_name.clone()
    }
}

/// Get one model
#[utoipa::path(
    get,
    path = "/api/v1/models/{id}",
    tag = "models",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Model", body = ModelResponse),
        (status = 404, description = "Model not found"),
    )
)]
async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ModelResponse>> {
    let (model, provider) = state
        .models
        .get_with_provider(id.into())
        .await?
        .ok_or_else(|| ApiError::NotFound("Model not found".to_string()))?;
    Ok(Json(ModelResponse::from_model(
        &model,
        Some(display_name(&provider)),
    )))
}

/// Create a manual model
#[utoipa::path(
    post,
    path = "/api/v1/models",
    tag = "models",
    request_body = ModelCreate,
    responses(
        (status = 201, description = "Model created", body = ModelResponse),
        (status = 400, description = "Invalid model_id"),
        (status = 404, description = "Provider not found"),
    )
)]
async fn create_model(
    State(state): State<AppState>,
    Json(payload): Json<ModelCreate>,
) -> ApiResult<Created<ModelResponse>> {
    payload.validate()?;

    if !validate_model_id(&payload.model_id) {
        return Err(ApiError::Validation(
            "Invalid model_id format. Must contain only alphanumeric characters, hyphens, and underscores."
                .to_string(),
        ));
    }

    let provider = state
        .providers
        .get(payload.provider_account_id.into())
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Provider account {} not found",
                payload.provider_account_id
            ))
        })?;

    let model = Model::manual(
        provider.id,
        payload.model_id,
        payload.custom_name,
        payload.metadata.unwrap_or_else(|| serde_json::json!({})),
    );
    state.models.create(&model).await?;

    Ok(Created(ModelResponse::from_model(
        &model,
        Some(display_name(&provider)),
    )))
}

/// Update a model's custom name and enabled flags
///
/// The provider-visible `model_id` is immutable.
#[utoipa::path(
    patch,
    path = "/api/v1/models/{id}",
    tag = "models",
    params(("id" = Uuid, Path, description = "Model ID")),
    request_body = ModelUpdate,
    responses(
        (status = 200, description = "Updated model", body = ModelResponse),
        (status = 404, description = "Model not found"),
    )
)]
async fn update_model(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ModelUpdate>,
) -> ApiResult<Json<ModelResponse>> {
    let mut model = state
        .models
        .get(id.into())
        .await?
        .ok_or_else(|| ApiError::NotFound("Model not found".to_string()))?;

    // Explicit null clears the custom name; absence leaves it untouched
    if let Some(custom_name) = payload.custom_name {
        model.custom_name = custom_name;
    }
    if let Some(enabled) = payload.enabled_for_monitoring {
        model.enabled_for_monitoring = enabled;
    }
    if let Some(enabled) = payload.enabled_for_benchmark {
        model.enabled_for_benchmark = enabled;
    }

    state.models.update(&model).await?;

    let (model, provider) = state
        .models
        .get_with_provider(id.into())
        .await?
        .ok_or_else(|| ApiError::NotFound("Model not found".to_string()))?;
    Ok(Json(ModelResponse::from_model(
        &model,
        Some(display_name(&provider)),
    )))
}
