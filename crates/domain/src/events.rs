//! Live progress events published on the benchmark progress bus.
//!
//! These are the exact wire messages WebSocket subscribers receive, so the
//! serde representation is part of the public contract.

use serde::{Deserialize, Serialize};

use crate::benchmark::RunStatus;
use crate::identifiers::ModelId;

/// One message on the live progress bus, keyed by run id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Run entered execution
    Progress { status: RunStatus },
    /// One measurement finished
    Result {
        model_id: ModelId,
        ttft_ms: f64,
        tps: f64,
    },
    /// Terminal success
    Complete { status: RunStatus },
    /// Terminal failure
    Error { error: String, status: RunStatus },
    /// Keep-alive sent on subscriber idle timeout
    Ping,
}

impl ProgressEvent {
    pub fn started() -> Self {
        Self::Progress {
            status: RunStatus::Running,
        }
    }

    pub fn completed() -> Self {
        Self::Complete {
            status: RunStatus::Completed,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
            status: RunStatus::Failed,
        }
    }

    /// Terminal events close subscriber streams after delivery.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}
