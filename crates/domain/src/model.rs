//! Model entity: a callable model within a provider account.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::identifiers::{ModelId, ProviderAccountId};

/// How a model entered the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    /// Returned by the provider's discovery adapter
    Discovered,
    /// Entered by an operator
    Manual,
}

impl ModelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Manual => "manual",
        }
    }
}

impl std::str::FromStr for ModelSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "discovered" => Ok(Self::Discovered),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown model source: {other}")),
        }
    }
}

// Manual entries only; discovered ids may carry provider-specific characters
// such as `:` tags (ollama) or `.` versions (bedrock).
static MODEL_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("model id pattern is valid"));

/// Validate a manually-entered provider model identifier.
pub fn validate_model_id(model_id: &str) -> bool {
    MODEL_ID_PATTERN.is_match(model_id)
}

/// A specific model (e.g. `gpt-4o`) belonging to a provider account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: ModelId,
    pub provider_account_id: ProviderAccountId,
    /// Provider-visible model identifier
    pub model_id: String,
    pub custom_name: Option<String>,
    pub source: ModelSource,
    pub enabled_for_monitoring: bool,
    pub enabled_for_benchmark: bool,
    /// Free-form per-model metadata (discovery details, notes)
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn discovered(
        provider_account_id: ProviderAccountId,
        model_id: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ModelId::new(),
            provider_account_id,
            model_id: model_id.into(),
            custom_name: None,
            source: ModelSource::Discovered,
            enabled_for_monitoring: false,
            enabled_for_benchmark: true,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn manual(
        provider_account_id: ProviderAccountId,
        model_id: impl Into<String>,
        custom_name: Option<String>,
        metadata: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ModelId::new(),
            provider_account_id,
            model_id: model_id.into(),
            custom_name,
            source: ModelSource::Manual,
            enabled_for_monitoring: false,
            enabled_for_benchmark: true,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Operator-facing name: the custom name when set, else the provider id.
    pub fn display_name(&self) -> &str {
        self.custom_name.as_deref().unwrap_or(&self.model_id)
    }
}
