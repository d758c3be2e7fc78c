//! Provider account types: the identity of an external inference endpoint.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::identifiers::ProviderAccountId;

/// Closed set of supported inference provider kinds.
///
/// The kind selects the model-name prefix, the default endpoint, the
/// credential shape, and the discovery adapter (see [`crate::catalog`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Openai,
    Anthropic,
    Azure,
    Bedrock,
    Vertex,
    Gemini,
    Ollama,
    LmStudio,
    Openrouter,
    Together,
    Groq,
    Mistral,
    Xai,
    Fireworks,
    Deepseek,
    #[serde(rename = "custom_openai_compatible")]
    CustomOpenaiCompatible,
}

impl ProviderKind {
    pub fn all() -> &'static [ProviderKind] {
        &[
            Self::Openai,
            Self::Anthropic,
            Self::Azure,
            Self::Bedrock,
            Self::Vertex,
            Self::Gemini,
            Self::Ollama,
            Self::LmStudio,
            Self::Openrouter,
            Self::Together,
            Self::Groq,
            Self::Mistral,
            Self::Xai,
            Self::Fireworks,
            Self::Deepseek,
            Self::CustomOpenaiCompatible,
        ]
    }

    /// Stable wire/storage tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Azure => "azure",
            Self::Bedrock => "bedrock",
            Self::Vertex => "vertex",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::LmStudio => "lm_studio",
            Self::Openrouter => "openrouter",
            Self::Together => "together",
            Self::Groq => "groq",
            Self::Mistral => "mistral",
            Self::Xai => "xai",
            Self::Fireworks => "fireworks",
            Self::Deepseek => "deepseek",
            Self::CustomOpenaiCompatible => "custom_openai_compatible",
        }
    }

    /// True for local inference servers that are probed with a plain HTTP
    /// ping instead of a completion call.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Ollama | Self::LmStudio)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::all()
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| DomainError::UnknownProviderKind(s.to_string()))
    }
}

/// Opaque credential bundle for a provider account.
///
/// The well-known keys are tagged; anything else a provider needs rides in
/// `extra`. The bundle is serialised only into the encrypted blob and the
/// explicit connection-test path; it never leaves the process in API
/// responses, and `Debug` redacts the key material.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ProviderCredentials {
    /// Bundle with only an API key set.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Bundle for a local OpenAI-compatible server (no key required).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Default::default()
        }
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("base_url", &self.base_url)
            .field("region", &self.region)
            .field("api_version", &self.api_version)
            .field("extra_keys", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Provider account: one configured external inference endpoint.
///
/// Credentials are stored authenticated-encrypted; the plaintext bundle only
/// exists transiently inside the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAccount {
    pub id: ProviderAccountId,
    pub provider_kind: ProviderKind,
    pub display_name: String,
    /// base64(nonce || AES-256-GCM ciphertext) of the credential JSON
    pub credentials_encrypted: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderAccount {
    pub fn new(
        provider_kind: ProviderKind,
        display_name: impl Into<String>,
        credentials_encrypted: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProviderAccountId::new(),
            provider_kind,
            display_name: display_name.into(),
            credentials_encrypted,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }
}
