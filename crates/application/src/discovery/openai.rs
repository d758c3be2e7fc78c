//! Discovery over the OpenAI-compatible `/models` listing.
//!
//! Covers OpenAI itself plus every provider exposing the same surface
//! (OpenRouter, Together, Groq, LM Studio, xAI, Fireworks, DeepSeek, and
//! custom endpoints).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use arguslm_domain::{catalog, ProviderAccount, ProviderCredentials};

use super::{DiscoveredModel, DiscoveryError, ModelDiscovery};

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// `/models` adapter for OpenAI-compatible providers.
pub struct OpenAiCompatibleDiscovery {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for OpenAiCompatibleDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiCompatibleDiscovery {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: DISCOVERY_TIMEOUT,
        }
    }

    fn base_url(
        provider: &ProviderAccount,
        credentials: &ProviderCredentials,
    ) -> Result<String, DiscoveryError> {
        credentials
            .base_url
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| {
                catalog::provider_spec(provider.provider_kind)
                    .default_base_url
                    .map(String::from)
            })
            .ok_or(DiscoveryError::MissingBaseUrl)
    }
}

#[async_trait]
impl ModelDiscovery for OpenAiCompatibleDiscovery {
    async fn list_models(
        &self,
        provider: &ProviderAccount,
        credentials: &ProviderCredentials,
    ) -> Result<Vec<DiscoveredModel>, DiscoveryError> {
        let base = Self::base_url(provider, credentials)?;
        let url = format!("{}/models", base.trim_end_matches('/'));

        // Local servers run without auth; only send the header when a key exists
        let mut request = self.client.get(&url).timeout(self.timeout);
        if let Some(key) = credentials.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| DiscoveryError::Http(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Http(format!("HTTP {}", status.as_u16())));
        }

        let body: ModelsResponse = response
            .json()
            .await
            .map_err(|err| DiscoveryError::InvalidResponse(err.to_string()))?;

        let models: Vec<DiscoveredModel> = body
            .data
            .into_iter()
            .filter_map(|entry| {
                let model_id = entry.get("id")?.as_str()?.to_string();
                let owned_by = entry
                    .get("owned_by")
                    .and_then(|v| v.as_str())
                    .map(String::from);
                let created = entry.get("created").and_then(|v| v.as_i64());
                let metadata: serde_json::Map<String, serde_json::Value> = entry
                    .as_object()
                    .map(|object| {
                        object
                            .iter()
                            .filter(|(key, _)| {
                                !matches!(key.as_str(), "id" | "owned_by" | "created" | "object")
                            })
                            .map(|(key, value)| (key.clone(), value.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                Some(DiscoveredModel {
                    model_id,
                    owned_by,
                    created,
                    metadata: serde_json::Value::Object(metadata),
                })
            })
            .collect();

        info!(
            count = models.len(),
            provider = %provider.display_name,
            kind = %provider.provider_kind,
            "discovered models"
        );
        Ok(models)
    }
}
