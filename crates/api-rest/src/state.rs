//! Application state and dependency wiring.
//!
//! Every shared collaborator is built once here and passed to handlers via
//! Axum state extraction; there are no implicit globals.

use std::sync::Arc;

use sqlx::SqlitePool;

use arguslm_application::{
    AlertEvaluator, BenchmarkOrchestrator, MonitoringScheduler, ProgressBus, ProviderInvoker,
    RunRegistry, ThrottleManager, ThrottleProfile, UptimeChecker,
};
use arguslm_common::{AppConfig, CredentialVault, VaultError};
use arguslm_infrastructure::{
    AlertRepository, BenchmarkRepository, ModelRepository, MonitoringRepository,
    ProviderRepository, SqliteAlertRepository, SqliteBenchmarkRepository, SqliteModelRepository,
    SqliteMonitoringRepository, SqliteProviderRepository,
};

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub providers: Arc<dyn ProviderRepository>,
    pub models: Arc<dyn ModelRepository>,
    pub monitoring: Arc<dyn MonitoringRepository>,
    pub benchmarks: Arc<dyn BenchmarkRepository>,
    pub alerts: Arc<dyn AlertRepository>,
    pub vault: Arc<CredentialVault>,
    pub invoker: Arc<ProviderInvoker>,
    pub throttle: Arc<ThrottleManager>,
    pub bus: Arc<ProgressBus>,
    pub checker: Arc<UptimeChecker>,
    pub orchestrator: Arc<BenchmarkOrchestrator>,
    pub scheduler: Arc<MonitoringScheduler>,
    pub runs: Arc<RunRegistry>,
}

impl AppState {
    /// Wire the full dependency graph over one database pool.
    pub fn new(config: AppConfig, pool: SqlitePool) -> Result<Self, VaultError> {
        let vault = Arc::new(CredentialVault::new(&config.encryption_key)?);

        let providers: Arc<dyn ProviderRepository> =
            Arc::new(SqliteProviderRepository::new(pool.clone()));
        let models: Arc<dyn ModelRepository> = Arc::new(SqliteModelRepository::new(pool.clone()));
        let monitoring: Arc<dyn MonitoringRepository> =
            Arc::new(SqliteMonitoringRepository::new(pool.clone()));
        let benchmarks: Arc<dyn BenchmarkRepository> =
            Arc::new(SqliteBenchmarkRepository::new(pool.clone()));
        let alerts: Arc<dyn AlertRepository> = Arc::new(SqliteAlertRepository::new(pool));

        let invoker = Arc::new(ProviderInvoker::new());
        let throttle = Arc::new(ThrottleManager::new(ThrottleProfile::default()));
        let bus = Arc::new(ProgressBus::new());

        let checker = Arc::new(UptimeChecker::new(
            invoker.clone(),
            throttle.clone(),
            vault.clone(),
        ));
        let evaluator = Arc::new(AlertEvaluator::new(alerts.clone(), models.clone()));
        let orchestrator = Arc::new(BenchmarkOrchestrator::new(
            invoker.clone(),
            throttle.clone(),
            vault.clone(),
            benchmarks.clone(),
            bus.clone(),
        ));
        let scheduler = Arc::new(MonitoringScheduler::new(
            models.clone(),
            monitoring.clone(),
            checker.clone(),
            evaluator,
        ));

        Ok(Self {
            config: Arc::new(config),
            providers,
            models,
            monitoring,
            benchmarks,
            alerts,
            vault,
            invoker,
            throttle,
            bus,
            checker,
            orchestrator,
            scheduler,
            runs: Arc::new(RunRegistry::new()),
        })
    }
}
