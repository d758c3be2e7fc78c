//! Provider catalog: single source of truth for per-kind configuration.
//!
//! Each provider kind carries its model-name prefix, default endpoint,
//! credential requirements, and the cheap model used by connection tests.

use crate::provider::ProviderKind;

/// Static configuration for one provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    pub label: &'static str,
    pub requires_api_key: bool,
    pub requires_base_url: bool,
    pub requires_region: bool,
    pub default_base_url: Option<&'static str>,
    /// Inexpensive model used by connection tests.
    pub test_model: &'static str,
}

/// Look up the spec for a provider kind.
pub fn provider_spec(kind: ProviderKind) -> ProviderSpec {
    use ProviderKind::*;
    match kind {
        Openai => ProviderSpec {
            kind,
            label: "OpenAI",
            requires_api_key: true,
            requires_base_url: false,
            requires_region: false,
            default_base_url: Some("https://api.openai.com/v1"),
            test_model: "gpt-3.5-turbo",
        },
        Anthropic => ProviderSpec {
            kind,
            label: "Anthropic",
            requires_api_key: true,
            requires_base_url: false,
            requires_region: false,
            default_base_url: Some("https://api.anthropic.com/v1"),
            test_model: "claude-3-haiku-20240307",
        },
        Azure => ProviderSpec {
            kind,
            label: "Azure OpenAI",
            requires_api_key: true,
            requires_base_url: true,
            requires_region: false,
            default_base_url: None,
            test_model: "gpt-3.5-turbo",
        },
        Bedrock => ProviderSpec {
            kind,
            label: "AWS Bedrock",
            requires_api_key: true,
            requires_base_url: false,
            requires_region: true,
            default_base_url: None,
            test_model: "anthropic.claude-3-haiku-20240307-v1:0",
        },
        Vertex => ProviderSpec {
            kind,
            label: "Google Vertex AI",
            requires_api_key: true,
            requires_base_url: true,
            requires_region: false,
            default_base_url: None,
            test_model: "gemini-1.5-flash",
        },
        Gemini => ProviderSpec {
            kind,
            label: "Google AI Studio",
            requires_api_key: true,
            requires_base_url: false,
            requires_region: false,
            default_base_url: Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            test_model: "gemini-1.5-flash",
        },
        Ollama => ProviderSpec {
            kind,
            label: "Ollama",
            requires_api_key: false,
            requires_base_url: true,
            requires_region: false,
            default_base_url: Some("http://localhost:11434"),
            test_model: "llama3",
        },
        LmStudio => ProviderSpec {
            kind,
            label: "LM Studio",
            requires_api_key: false,
            requires_base_url: true,
            requires_region: false,
            default_base_url: Some("http://localhost:1234/v1"),
            test_model: "local-model",
        },
        Openrouter => ProviderSpec {
            kind,
            label: "OpenRouter",
            requires_api_key: true,
            requires_base_url: false,
            requires_region: false,
            default_base_url: Some("https://openrouter.ai/api/v1"),
            test_model: "meta-llama/llama-3-8b-instruct",
        },
        Together => ProviderSpec {
            kind,
            label: "Together AI",
            requires_api_key: true,
            requires_base_url: false,
            requires_region: false,
            default_base_url: Some("https://api.together.xyz/v1"),
            test_model: "meta-llama/Llama-3-8b-chat-hf",
        },
        Groq => ProviderSpec {
            kind,
            label: "Groq",
            requires_api_key: true,
            requires_base_url: false,
            requires_region: false,
            default_base_url: Some("https://api.groq.com/openai/v1"),
            test_model: "llama3-8b-8192",
        },
        Mistral => ProviderSpec {
            kind,
            label: "Mistral AI",
            requires_api_key: true,
            requires_base_url: false,
            requires_region: false,
            default_base_url: Some("https://api.mistral.ai/v1"),
            test_model: "mistral-small-latest",
        },
        Xai => ProviderSpec {
            kind,
            label: "xAI (Grok)",
            requires_api_key: true,
            requires_base_url: false,
            requires_region: false,
            default_base_url: Some("https://api.x.ai/v1"),
            test_model: "grok-beta",
        },
        Fireworks => ProviderSpec {
            kind,
            label: "Fireworks AI",
            requires_api_key: true,
            requires_base_url: false,
            requires_region: false,
            default_base_url: Some("https://api.fireworks.ai/inference/v1"),
            test_model: "accounts/fireworks/models/llama-v3-8b-instruct",
        },
        Deepseek => ProviderSpec {
            kind,
            label: "DeepSeek",
            requires_api_key: true,
            requires_base_url: false,
            requires_region: false,
            default_base_url: Some("https://api.deepseek.com"),
            test_model: "deepseek-chat",
        },
        CustomOpenaiCompatible => ProviderSpec {
            kind,
            label: "Custom OpenAI Compatible",
            requires_api_key: false,
            requires_base_url: true,
            requires_region: false,
            default_base_url: None,
            test_model: "gpt-3.5-turbo",
        },
    }
}

/// Model-name prefix selected by the provider kind.
///
/// OpenAI itself takes no prefix; OpenAI-compatible targets (LM Studio,
/// custom endpoints) use `openai/`; a handful have dedicated routing tags;
/// everything else defaults to `<kind>/`.
pub fn model_name_prefix(kind: ProviderKind) -> &'static str {
    use ProviderKind::*;
    match kind {
        Openai => "",
        Azure => "azure/",
        Bedrock => "bedrock/",
        Vertex => "vertex_ai/",
        Gemini => "gemini/",
        LmStudio | CustomOpenaiCompatible => "openai/",
        Anthropic => "anthropic/",
        Ollama => "ollama/",
        Openrouter => "openrouter/",
        Together => "together/",
        Groq => "groq/",
        Mistral => "mistral/",
        Xai => "xai/",
        Fireworks => "fireworks/",
        Deepseek => "deepseek/",
    }
}

/// Format a model name with its provider prefix, prepending at most once.
pub fn qualified_model_name(kind: ProviderKind, model_id: &str) -> String {
    let prefix = model_name_prefix(kind);
    if !prefix.is_empty() && !model_id.starts_with(prefix) {
        format!("{prefix}{model_id}")
    } else {
        model_id.to_string()
    }
}

/// All provider specs in catalog order.
pub fn all_provider_specs() -> Vec<ProviderSpec> {
    ProviderKind::all().iter().map(|k| provider_spec(*k)).collect()
}
