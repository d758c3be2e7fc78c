//! Provider model discovery adapters.
//!
//! Each adapter turns a provider's model-listing surface into a uniform
//! descriptor list. Providers without a listing API get a curated static
//! registry; the rest are unsupported and say so in a typed error.

mod ollama;
mod openai;
mod static_catalog;

pub use ollama::OllamaDiscovery;
pub use openai::OpenAiCompatibleDiscovery;
pub use static_catalog::StaticCatalogDiscovery;

use async_trait::async_trait;

use arguslm_domain::{ProviderAccount, ProviderCredentials, ProviderKind};

/// One model as reported by a provider's discovery surface.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredModel {
    /// Provider-visible model id
    pub model_id: String,
    pub owned_by: Option<String>,
    /// Provider-reported creation epoch, when available
    pub created: Option<i64>,
    /// Remaining provider fields, kept for the model's metadata mapping
    pub metadata: serde_json::Value,
}

/// Discovery failures.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The provider kind has no discovery surface
    #[error("model discovery not supported for provider kind: {0}")]
    Unsupported(ProviderKind),

    /// No usable endpoint for the listing call
    #[error("no base URL configured for discovery")]
    MissingBaseUrl,

    /// The listing call failed
    #[error("discovery request failed: {0}")]
    Http(String),

    /// The listing response did not parse
    #[error("invalid discovery response: {0}")]
    InvalidResponse(String),
}

/// Provider-kind-specific model discovery.
#[async_trait]
pub trait ModelDiscovery: Send + Sync {
    async fn list_models(
        &self,
        provider: &ProviderAccount,
        credentials: &ProviderCredentials,
    ) -> Result<Vec<DiscoveredModel>, DiscoveryError>;
}

/// Select the discovery adapter for a provider kind.
pub fn discovery_for_kind(
    kind: ProviderKind,
) -> Result<Box<dyn ModelDiscovery>, DiscoveryError> {
    use ProviderKind::*;
    match kind {
        Ollama => Ok(Box::new(OllamaDiscovery::new())),
        Anthropic | Mistral | Gemini => Ok(Box::new(StaticCatalogDiscovery::new(kind))),
        Openai | Openrouter | Together | Groq | LmStudio | Xai | Fireworks | Deepseek
        | CustomOpenaiCompatible => Ok(Box::new(OpenAiCompatibleDiscovery::new())),
        Azure | Bedrock | Vertex => Err(DiscoveryError::Unsupported(kind)),
    }
}
