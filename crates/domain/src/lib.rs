//! Core domain types for ArgusLM.
//!
//! This crate holds the entities, identifiers, and frozen catalogs shared by
//! every layer: provider accounts and their closed kind set, models, the
//! monitoring configuration singleton, uptime checks, benchmark runs and
//! results, alert rules and alerts, the prompt-pack catalog, and the progress
//! events streamed to benchmark observers. It performs no I/O.
//!
//! Cross-entity references are stored as typed ids rather than object graphs;
//! eager loading at component boundaries replaces navigation.

pub mod alert;
pub mod benchmark;
pub mod catalog;
pub mod errors;
pub mod events;
pub mod identifiers;
pub mod model;
pub mod monitoring;
pub mod prompt_packs;
pub mod provider;

pub use alert::{Alert, AlertRule, AlertRuleKind};
pub use benchmark::{BenchmarkResult, BenchmarkRun, RunStatus, TriggerSource};
pub use catalog::{all_provider_specs, model_name_prefix, provider_spec, qualified_model_name, ProviderSpec};
pub use errors::{DomainError, DomainResult};
pub use events::ProgressEvent;
pub use identifiers::{
    AlertId, AlertRuleId, BenchmarkResultId, BenchmarkRunId, ModelId, MonitoringConfigId,
    ProviderAccountId, UptimeCheckId,
};
pub use model::{validate_model_id, Model, ModelSource};
pub use monitoring::{MonitoringConfig, UptimeCheck, UptimeStatus};
pub use prompt_packs::{get_prompt_pack, is_valid_prompt_pack, list_prompt_packs, PromptPack};
pub use provider::{ProviderAccount, ProviderCredentials, ProviderKind};
