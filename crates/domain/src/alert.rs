//! Alert rules and alert incidents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::{AlertId, AlertRuleId, ModelId};

/// Declarative detector kinds evaluated against each monitoring tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertRuleKind {
    /// Any monitored model reporting `down`
    AnyModelDown,
    /// One specific model (by registry id) reporting `down`
    SpecificModelDown,
    /// A model name down across every provider that offers it
    ModelUnavailableEverywhere,
    /// Reserved until the threshold schema is defined
    PerformanceDegradation,
}

impl AlertRuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnyModelDown => "any_model_down",
            Self::SpecificModelDown => "specific_model_down",
            Self::ModelUnavailableEverywhere => "model_unavailable_everywhere",
            Self::PerformanceDegradation => "performance_degradation",
        }
    }
}

impl std::str::FromStr for AlertRuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any_model_down" => Ok(Self::AnyModelDown),
            "specific_model_down" => Ok(Self::SpecificModelDown),
            "model_unavailable_everywhere" => Ok(Self::ModelUnavailableEverywhere),
            "performance_degradation" => Ok(Self::PerformanceDegradation),
            other => Err(format!("unknown alert rule kind: {other}")),
        }
    }
}

/// Alert rule configuration.
///
/// Cross-field requirements: `specific_model_down` needs `target_model_id`,
/// `model_unavailable_everywhere` needs `target_model_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: AlertRuleId,
    pub name: String,
    pub rule_kind: AlertRuleKind,
    pub enabled: bool,
    pub target_model_id: Option<ModelId>,
    pub target_model_name: Option<String>,
    /// Opaque threshold mapping reserved for performance_degradation
    pub threshold_config: Option<serde_json::Value>,
    pub notify_in_app: bool,
    pub notify_email: bool,
    pub notify_webhook: bool,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRule {
    pub fn new(name: impl Into<String>, rule_kind: AlertRuleKind) -> Self {
        let now = Utc::now();
        Self {
            id: AlertRuleId::new(),
            name: name.into(),
            rule_kind,
            enabled: true,
            target_model_id: None,
            target_model_name: None,
            threshold_config: None,
            notify_in_app: true,
            notify_email: false,
            notify_webhook: false,
            webhook_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate the cross-field requirements for this rule kind.
    pub fn validate(&self) -> Result<(), crate::errors::DomainError> {
        match self.rule_kind {
            AlertRuleKind::SpecificModelDown if self.target_model_id.is_none() => {
                Err(crate::errors::DomainError::Validation(
                    "specific_model_down rule requires target_model_id".to_string(),
                ))
            }
            AlertRuleKind::ModelUnavailableEverywhere
                if self.target_model_name.as_deref().unwrap_or("").is_empty() =>
            {
                Err(crate::errors::DomainError::Validation(
                    "model_unavailable_everywhere rule requires target_model_name".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// One incident occurrence.
///
/// While `acknowledged == false` the alert is an open incident and suppresses
/// duplicates for the same `(rule_id, model_id)` key. Acknowledgement is a
/// monotonic false -> true transition performed by an operator; recovery never
/// acknowledges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub rule_id: AlertRuleId,
    /// Absent for cross-model rules; weak reference, nulled on model delete
    pub model_id: Option<ModelId>,
    pub message: String,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(rule_id: AlertRuleId, model_id: Option<ModelId>, message: impl Into<String>) -> Self {
        Self {
            id: AlertId::new(),
            rule_id,
            model_id,
            message: message.into(),
            acknowledged: false,
            created_at: Utc::now(),
        }
    }
}
