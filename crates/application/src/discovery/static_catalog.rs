//! Curated model registries for providers without a listing API.

use async_trait::async_trait;
use tracing::info;

use arguslm_domain::{ProviderAccount, ProviderCredentials, ProviderKind};

use super::{DiscoveredModel, DiscoveryError, ModelDiscovery};

const ANTHROPIC_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

const MISTRAL_MODELS: &[&str] = &[
    "mistral-large-latest",
    "mistral-medium-latest",
    "mistral-small-latest",
    "open-mistral-nemo",
    "codestral-latest",
];

const GEMINI_MODELS: &[&str] = &[
    "gemini-2.0-flash-exp",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
    "gemini-1.5-flash-8b",
];

/// Built-in registry adapter for anthropic, mistral, and gemini.
pub struct StaticCatalogDiscovery {
    kind: ProviderKind,
}

impl StaticCatalogDiscovery {
    pub fn new(kind: ProviderKind) -> Self {
        Self { kind }
    }

    fn registry(&self) -> Option<(&'static [&'static str], &'static str)> {
        match self.kind {
            ProviderKind::Anthropic => Some((ANTHROPIC_MODELS, "anthropic")),
            ProviderKind::Mistral => Some((MISTRAL_MODELS, "mistral")),
            ProviderKind::Gemini => Some((GEMINI_MODELS, "google")),
            _ => None,
        }
    }
}

#[async_trait]
impl ModelDiscovery for StaticCatalogDiscovery {
    async fn list_models(
        &self,
        provider: &ProviderAccount,
        _credentials: &ProviderCredentials,
    ) -> Result<Vec<DiscoveredModel>, DiscoveryError> {
        let (registry, owned_by) = self
            .registry()
            .ok_or(DiscoveryError::Unsupported(self.kind))?;

        let models: Vec<DiscoveredModel> = registry
            .iter()
            .map(|model_id| DiscoveredModel {
                model_id: model_id.to_string(),
                owned_by: Some(owned_by.to_string()),
                created: None,
                metadata: serde_json::json!({}),
            })
            .collect();

        info!(
            count = models.len(),
            provider = %provider.display_name,
            kind = %self.kind,
            "returned curated models"
        );
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(kind: ProviderKind) -> ProviderAccount {
        ProviderAccount::new(kind, "acct", "blob".to_string())
    }

    #[tokio::test]
    async fn test_curated_anthropic_models() {
        let discovery = StaticCatalogDiscovery::new(ProviderKind::Anthropic);
        let models = discovery
            .list_models(&provider(ProviderKind::Anthropic), &ProviderCredentials::default())
            .await
            .unwrap();

        assert_eq!(models.len(), 5);
        assert!(models.iter().any(|m| m.model_id == "claude-3-haiku-20240307"));
        assert!(models.iter().all(|m| m.owned_by.as_deref() == Some("anthropic")));
    }

    #[tokio::test]
    async fn test_curated_gemini_models() {
        let discovery = StaticCatalogDiscovery::new(ProviderKind::Gemini);
        let models = discovery
            .list_models(&provider(ProviderKind::Gemini), &ProviderCredentials::default())
            .await
            .unwrap();
        assert!(models.iter().any(|m| m.model_id == "gemini-1.5-flash"));
    }

    #[tokio::test]
    async fn test_unknown_kind_rejected() {
        let discovery = StaticCatalogDiscovery::new(ProviderKind::Openai);
        let err = discovery
            .list_models(&provider(ProviderKind::Openai), &ProviderCredentials::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Unsupported(_)));
    }
}
