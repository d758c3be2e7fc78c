//! Benchmark run and result entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::{BenchmarkResultId, BenchmarkRunId, ModelId};

/// Benchmark run lifecycle status.
///
/// ```text
/// pending ──start──► running ──all tasks done──► completed
///                        │
///                        └──unrecoverable error──► failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> to` is a legal lifecycle transition.
    pub fn can_transition(&self, to: RunStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Pending, Self::Failed)
        )
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// Who triggered a benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    User,
    Scheduled,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Scheduled => "scheduled",
        }
    }
}

impl std::str::FromStr for TriggerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "scheduled" => Ok(Self::Scheduled),
            other => Err(format!("unknown trigger source: {other}")),
        }
    }
}

/// One operator-initiated or scheduled benchmark job.
///
/// `model_ids` is an ordered snapshot of the targets at submission time; the
/// run keeps producing results for a model even if it is later disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRun {
    pub id: BenchmarkRunId,
    pub name: String,
    pub model_ids: Vec<ModelId>,
    pub prompt_pack: String,
    pub status: RunStatus,
    pub triggered_by: TriggerSource,
    pub started_at: DateTime<Utc>,
    /// Set when the run reaches a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BenchmarkRun {
    pub fn new(
        name: impl Into<String>,
        model_ids: Vec<ModelId>,
        prompt_pack: impl Into<String>,
        triggered_by: TriggerSource,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: BenchmarkRunId::new(),
            name: name.into(),
            model_ids,
            prompt_pack: prompt_pack.into(),
            status: RunStatus::Pending,
            triggered_by,
            started_at: now,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One measurement within a benchmark run.
///
/// Invariant: `error` is present iff the measurement failed; on failure all
/// numeric fields are zero and cost is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub id: BenchmarkResultId,
    pub run_id: BenchmarkRunId,
    pub model_id: ModelId,
    pub ttft_ms: f64,
    pub tps: f64,
    pub tps_excluding_ttft: f64,
    pub total_latency_ms: f64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub estimated_cost: Option<f64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BenchmarkResult {
    /// All-zeros result recording a failed measurement.
    pub fn failed(run_id: BenchmarkRunId, model_id: ModelId, error: impl Into<String>) -> Self {
        Self {
            id: BenchmarkResultId::new(),
            run_id,
            model_id,
            ttft_ms: 0.0,
            tps: 0.0,
            tps_excluding_ttft: 0.0,
            total_latency_ms: 0.0,
            input_tokens: 0,
            output_tokens: 0,
            estimated_cost: None,
            error: Some(error.into()),
            created_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
