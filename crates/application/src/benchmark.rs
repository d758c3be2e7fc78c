//! Benchmark orchestrator: plans (model, run-index) measurement tasks,
//! executes them in parallel under the throttle, streams progress to the
//! bus, and persists an atomic, ordered result set.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use arguslm_common::{calculate_statistics, CredentialVault, LatencyStatistics};
use arguslm_domain::{
    BenchmarkResult, BenchmarkResultId, BenchmarkRunId, Model, ProgressEvent, ProviderAccount,
    ProviderCredentials, RunStatus,
};
use arguslm_infrastructure::BenchmarkRepository;

use crate::invoker::{CompletionRequest, CompletionTarget, ProviderInvoker};
use crate::metrics::{extract_chunk_content, MetricsCollector};
use crate::progress::ProgressBus;
use crate::throttle::ThrottleManager;

/// Parameters for one benchmark run.
#[derive(Clone)]
pub struct BenchmarkConfig {
    /// Ordered snapshot of the targets, providers eagerly attached
    pub models: Vec<(Model, ProviderAccount)>,
    pub prompt_pack: String,
    pub max_tokens: u32,
    /// Measured repetitions per model, >= 1
    pub num_runs: u32,
    /// Discarded warmup repetitions per model
    pub warmup_runs: u32,
}

impl BenchmarkConfig {
    pub fn new(models: Vec<(Model, ProviderAccount)>, prompt_pack: impl Into<String>) -> Self {
        Self {
            models,
            prompt_pack: prompt_pack.into(),
            max_tokens: 200,
            num_runs: 3,
            warmup_runs: 1,
        }
    }
}

/// Percentile statistics over a run's successful results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkStatistics {
    pub ttft: LatencyStatistics,
    pub tps: LatencyStatistics,
}

/// Compute read-through statistics over non-errored results.
pub fn compute_statistics(results: &[BenchmarkResult]) -> BenchmarkStatistics {
    let ttft: Vec<f64> = results
        .iter()
        .filter(|r| !r.is_error())
        .map(|r| r.ttft_ms)
        .collect();
    let tps: Vec<f64> = results
        .iter()
        .filter(|r| !r.is_error())
        .map(|r| r.tps)
        .collect();
    BenchmarkStatistics {
        ttft: calculate_statistics(&ttft),
        tps: calculate_statistics(&tps),
    }
}

#[derive(Debug, thiserror::Error)]
enum OrchestratorError {
    #[error("storage error: {0}")]
    Storage(#[from] arguslm_infrastructure::Error),
}

/// Executes benchmark runs end to end.
pub struct BenchmarkOrchestrator {
    invoker: Arc<ProviderInvoker>,
    throttle: Arc<ThrottleManager>,
    vault: Arc<CredentialVault>,
    repository: Arc<dyn BenchmarkRepository>,
    bus: Arc<ProgressBus>,
}

impl BenchmarkOrchestrator {
    pub fn new(
        invoker: Arc<ProviderInvoker>,
        throttle: Arc<ThrottleManager>,
        vault: Arc<CredentialVault>,
        repository: Arc<dyn BenchmarkRepository>,
        bus: Arc<ProgressBus>,
    ) -> Self {
        Self {
            invoker,
            throttle,
            vault,
            repository,
            bus,
        }
    }

    /// Drive a run to a terminal state. Orchestrator-level failures mark the
    /// run `failed` and emit a terminal error event; event emission failures
    /// are swallowed.
    pub async fn execute(&self, run_id: BenchmarkRunId, config: BenchmarkConfig) {
        if let Err(err) = self.run(run_id, &config).await {
            error!(%run_id, error = %err, "benchmark run failed");
            if let Err(store_err) = self
                .repository
                .update_run_status(run_id, RunStatus::Failed, Some(Utc::now()))
                .await
            {
                error!(%run_id, error = %store_err, "failed to mark run as failed");
            }
            self.bus.publish(run_id, ProgressEvent::failed(err.to_string()));
        }
    }

    async fn run(
        &self,
        run_id: BenchmarkRunId,
        config: &BenchmarkConfig,
    ) -> Result<(), OrchestratorError> {
        self.repository
            .update_run_status(run_id, RunStatus::Running, None)
            .await?;
        self.bus.publish(run_id, ProgressEvent::started());

        let runs_per_model = config.warmup_runs + config.num_runs.max(1);
        let total_tasks = config.models.len() * runs_per_model as usize;
        info!(
            %run_id,
            models = config.models.len(),
            total_tasks,
            warmup_runs = config.warmup_runs,
            "executing benchmark run"
        );

        // One task per (model, run_index); run_index below warmup_runs marks
        // a warmup. Slots remember planning order across completion order.
        let mut tasks: JoinSet<(usize, BenchmarkResult)> = JoinSet::new();
        let mut warmup_slots = vec![false; total_tasks];
        let mut slot_models = vec![None; total_tasks];
        let mut slot = 0usize;

        for (model, provider) in &config.models {
            for run_index in 0..runs_per_model {
                let is_warmup = run_index < config.warmup_runs;
                warmup_slots[slot] = is_warmup;
                slot_models[slot] = Some(model.id);

                let task = MeasureTask {
                    invoker: self.invoker.clone(),
                    throttle: self.throttle.clone(),
                    vault: self.vault.clone(),
                    run_id,
                    model: model.clone(),
                    provider: provider.clone(),
                    prompt_pack: config.prompt_pack.clone(),
                    max_tokens: config.max_tokens,
                };
                let this_slot = slot;
                tasks.spawn(async move { (this_slot, task.measure().await) });
                slot += 1;
            }
        }

        let mut by_slot: Vec<Option<BenchmarkResult>> = vec![None; total_tasks];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, result)) => by_slot[slot] = Some(result),
                Err(err) => warn!(%run_id, error = %err, "benchmark task aborted"),
            }
        }

        // Warmups are dropped; measured results keep planning order. A slot
        // whose task aborted materialises as an error result.
        let mut results = Vec::with_capacity(config.models.len() * config.num_runs as usize);
        for (slot, result) in by_slot.into_iter().enumerate() {
            if warmup_slots[slot] {
                continue;
            }
            match result {
                Some(result) => results.push(result),
                None => {
                    if let Some(model_id) = slot_models[slot] {
                        results.push(BenchmarkResult::failed(run_id, model_id, "task aborted"));
                    }
                }
            }
        }

        self.repository.insert_results(run_id, &results).await?;
        for result in &results {
            self.bus.publish(
                run_id,
                ProgressEvent::Result {
                    model_id: result.model_id,
                    ttft_ms: result.ttft_ms,
                    tps: result.tps,
                },
            );
        }

        self.repository
            .update_run_status(run_id, RunStatus::Completed, Some(Utc::now()))
            .await?;
        self.bus.publish(run_id, ProgressEvent::completed());
        info!(%run_id, results = results.len(), "benchmark run completed");
        Ok(())
    }
}

/// Everything one measurement needs, owned so the task is `'static`.
struct MeasureTask {
    invoker: Arc<ProviderInvoker>,
    throttle: Arc<ThrottleManager>,
    vault: Arc<CredentialVault>,
    run_id: BenchmarkRunId,
    model: Model,
    provider: ProviderAccount,
    prompt_pack: String,
    max_tokens: u32,
}

impl MeasureTask {
    /// Measure once. Task-level failures become error results, never panics.
    async fn measure(self) -> BenchmarkResult {
        match self.try_measure().await {
            Ok(result) => result,
            Err(err) => BenchmarkResult::failed(self.run_id, self.model.id, err),
        }
    }

    async fn try_measure(&self) -> Result<BenchmarkResult, String> {
        let pack = arguslm_domain::get_prompt_pack(&self.prompt_pack)
            .map_err(|err| err.to_string())?;

        let credentials: ProviderCredentials = self
            .vault
            .decrypt(&self.provider.credentials_encrypted)
            .map_err(|err| err.to_string())?;
        let target = CompletionTarget::new(
            self.provider.provider_kind,
            self.model.model_id.clone(),
            credentials,
        );

        let _guard = self
            .throttle
            .acquire(
                self.provider.provider_kind.as_str(),
                &self.model.id.to_string(),
            )
            .await
            .map_err(|err| err.to_string())?;

        let request = CompletionRequest {
            max_tokens: Some(self.max_tokens),
            ..CompletionRequest::user_prompt(pack.prompt)
        };

        let mut collector = MetricsCollector::new();
        collector.start();

        let mut stream = self
            .invoker
            .complete_stream(&target, &request)
            .await
            .map_err(|err| err.to_string())?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| err.to_string())?;
            if let Some(content) = extract_chunk_content(&chunk) {
                collector.record_token(content);
            }
        }

        let metrics = collector.finalize(Some(&self.model.model_id), None, None);
        Ok(BenchmarkResult {
            id: BenchmarkResultId::new(),
            run_id: self.run_id,
            model_id: self.model.id,
            ttft_ms: metrics.ttft_ms,
            tps: metrics.tps,
            tps_excluding_ttft: metrics.tps_excluding_ttft,
            total_latency_ms: metrics.total_latency_ms,
            input_tokens: metrics.input_tokens,
            output_tokens: metrics.output_tokens,
            estimated_cost: metrics.estimated_cost,
            error: None,
            created_at: Utc::now(),
        })
    }
}

/// Tracks in-flight run tasks so shutdown can cancel them and still drive
/// their runs to a terminal state.
#[derive(Default)]
pub struct RunRegistry {
    handles: Mutex<Vec<(BenchmarkRunId, JoinHandle<()>)>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a spawned run task, pruning finished entries as a side effect.
    pub fn register(&self, run_id: BenchmarkRunId, handle: JoinHandle<()>) {
        let mut handles = self.handles.lock();
        handles.retain(|(_, h)| !h.is_finished());
        handles.push((run_id, handle));
    }

    /// Abort every in-flight run, mark each `failed`, and emit terminal
    /// events. Used during process shutdown.
    pub async fn abort_all(
        &self,
        repository: &dyn BenchmarkRepository,
        bus: &ProgressBus,
    ) {
        let handles: Vec<(BenchmarkRunId, JoinHandle<()>)> =
            std::mem::take(&mut *self.handles.lock());
        for (run_id, handle) in handles {
            if handle.is_finished() {
                continue;
            }
            handle.abort();
            warn!(%run_id, "cancelled in-flight benchmark run");
            if let Err(err) = repository
                .update_run_status(run_id, RunStatus::Failed, Some(Utc::now()))
                .await
            {
                error!(%run_id, error = %err, "failed to mark cancelled run as failed");
            }
            bus.publish(run_id, ProgressEvent::failed("run cancelled"));
        }
    }
}
