//! Discovery of locally installed Ollama models via `/api/tags`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use arguslm_domain::{ProviderAccount, ProviderCredentials};

use super::{DiscoveredModel, DiscoveryError, ModelDiscovery};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: Option<i64>,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    modified_at: Option<String>,
    #[serde(default)]
    details: serde_json::Value,
}

/// `/api/tags` adapter for a local Ollama server. No authentication.
pub struct OllamaDiscovery {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for OllamaDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaDiscovery {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: DISCOVERY_TIMEOUT,
        }
    }
}

#[async_trait]
impl ModelDiscovery for OllamaDiscovery {
    async fn list_models(
        &self,
        provider: &ProviderAccount,
        credentials: &ProviderCredentials,
    ) -> Result<Vec<DiscoveredModel>, DiscoveryError> {
        // The completion path appends /v1; tags live at the server root
        let base = credentials
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_OLLAMA_URL)
            .trim_end_matches('/')
            .trim_end_matches("/v1")
            .trim_end_matches('/')
            .to_string();
        let url = format!("{base}/api/tags");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| DiscoveryError::Http(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Http(format!("HTTP {}", status.as_u16())));
        }

        let body: TagsResponse = response
            .json()
            .await
            .map_err(|err| DiscoveryError::InvalidResponse(err.to_string()))?;

        let models: Vec<DiscoveredModel> = body
            .models
            .into_iter()
            .filter(|entry| !entry.name.is_empty())
            .map(|entry| {
                let details = entry.details;
                DiscoveredModel {
                    model_id: entry.name,
                    owned_by: None,
                    created: None,
                    metadata: serde_json::json!({
                        "size": entry.size,
                        "digest": entry.digest,
                        "modified_at": entry.modified_at,
                        "format": details.get("format"),
                        "family": details.get("family"),
                        "parameter_size": details.get("parameter_size"),
                        "quantization_level": details.get("quantization_level"),
                    }),
                }
            })
            .collect();

        info!(
            count = models.len(),
            provider = %provider.display_name,
            "discovered ollama models"
        );
        Ok(models)
    }
}
