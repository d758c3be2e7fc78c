//! Monitoring configuration singleton and uptime check records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::{ModelId, MonitoringConfigId, UptimeCheckId};

/// Default interval between monitoring ticks.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 15;

/// Default prompt pack used by health probes.
pub const DEFAULT_PROMPT_PACK: &str = "health_check";

/// Process-wide monitoring configuration (at most one row).
///
/// Created lazily with defaults on first read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub id: MonitoringConfigId,
    /// Whole minutes between ticks, >= 1
    pub interval_minutes: u32,
    pub prompt_pack: String,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: MonitoringConfigId::new(),
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            prompt_pack: DEFAULT_PROMPT_PACK.to_string(),
            enabled: true,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Health probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UptimeStatus {
    Up,
    Down,
    /// Reserved for a future latency-threshold predicate; never produced by
    /// the baseline checker.
    Degraded,
}

impl UptimeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Degraded => "degraded",
        }
    }
}

impl std::str::FromStr for UptimeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "degraded" => Ok(Self::Degraded),
            other => Err(format!("unknown uptime status: {other}")),
        }
    }
}

/// Outcome of one health probe of one model at one instant.
///
/// Invariants: `status == Up` implies `latency_ms` and `ttft_ms` are present;
/// `status == Down` implies `error` is present and latency may be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeCheck {
    pub id: UptimeCheckId,
    pub model_id: ModelId,
    pub status: UptimeStatus,
    pub latency_ms: Option<f64>,
    pub ttft_ms: Option<f64>,
    pub tps: Option<f64>,
    pub output_tokens: Option<i64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UptimeCheck {
    /// Successful probe with its measured metrics.
    pub fn up(model_id: ModelId, latency_ms: f64, ttft_ms: f64, tps: f64, output_tokens: i64) -> Self {
        Self {
            id: UptimeCheckId::new(),
            model_id,
            status: UptimeStatus::Up,
            latency_ms: Some(latency_ms),
            ttft_ms: Some(ttft_ms),
            tps: Some(tps),
            output_tokens: Some(output_tokens),
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Failed probe carrying the upstream error text.
    pub fn down(model_id: ModelId, error: impl Into<String>) -> Self {
        Self {
            id: UptimeCheckId::new(),
            model_id,
            status: UptimeStatus::Down,
            latency_ms: None,
            ttft_ms: None,
            tps: None,
            output_tokens: None,
            error: Some(error.into()),
            created_at: Utc::now(),
        }
    }
}
