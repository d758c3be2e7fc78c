//! Monitoring scheduler: the process-wide interval trigger driving uptime
//! checks and alert evaluation.
//!
//! Exactly one job slot exists; `configure` replaces it, which is the only
//! way interval or enablement changes take effect mid-process. Manual runs
//! bypass the timer but share the tick body. Tick errors are logged, never
//! re-raised.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use arguslm_domain::UptimeCheck;
use arguslm_infrastructure::{ModelRepository, MonitoringRepository};

use crate::alerts::AlertEvaluator;
use crate::uptime::UptimeChecker;

struct SchedulerInner {
    models: Arc<dyn ModelRepository>,
    monitoring: Arc<dyn MonitoringRepository>,
    checker: Arc<UptimeChecker>,
    evaluator: Arc<AlertEvaluator>,
}

/// Singleton interval trigger for the monitoring loop.
pub struct MonitoringScheduler {
    inner: Arc<SchedulerInner>,
    job: parking_lot::Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl MonitoringScheduler {
    pub fn new(
        models: Arc<dyn ModelRepository>,
        monitoring: Arc<dyn MonitoringRepository>,
        checker: Arc<UptimeChecker>,
        evaluator: Arc<AlertEvaluator>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                models,
                monitoring,
                checker,
                evaluator,
            }),
            job: parking_lot::Mutex::new(None),
        }
    }

    /// Read the persisted configuration and install the initial job.
    pub async fn start(&self) -> Result<(), arguslm_infrastructure::Error> {
        let config = self.inner.monitoring.get_or_create_config().await?;
        self.configure(config.interval_minutes, config.enabled);
        info!("scheduler started");
        Ok(())
    }

    /// Replace the job with a new interval, or remove it when disabled.
    pub fn configure(&self, interval_minutes: u32, enabled: bool) {
        let mut job = self.job.lock();
        if let Some((stop, _handle)) = job.take() {
            // The loop exits at its next suspension point; an in-progress
            // tick is allowed to finish
            let _ = stop.send(true);
            info!("removed existing monitoring job");
        }

        if !enabled {
            info!("monitoring disabled, no job scheduled");
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let inner = self.inner.clone();
        let period = Duration::from_secs(u64::from(interval_minutes.max(1)) * 60);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first interval elapses before the first tick fires
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => inner.run_tick_logged().await,
                    _ = stop_rx.changed() => break,
                }
            }
        });

        *job = Some((stop_tx, handle));
        info!(interval_minutes, "installed monitoring job");
    }

    /// Whether a job is currently installed.
    pub fn is_scheduled(&self) -> bool {
        self.job.lock().is_some()
    }

    /// Run one tick now, outside the timer.
    pub async fn run_once(&self) {
        self.inner.run_tick_logged().await;
    }

    /// Stop the job, waiting for an in-progress tick to finish.
    pub async fn shutdown(&self) {
        let taken = self.job.lock().take();
        if let Some((stop, handle)) = taken {
            let _ = stop.send(true);
            let _ = handle.await;
            info!("scheduler stopped");
        }
    }
}

impl SchedulerInner {
    async fn run_tick_logged(&self) {
        if let Err(err) = self.run_tick().await {
            error!(error = %err, "monitoring tick failed");
        }
    }

    /// One tick: probe every monitored model concurrently, persist the
    /// checks, evaluate alert rules on the batch, stamp `last_run_at`.
    async fn run_tick(&self) -> Result<(), arguslm_infrastructure::Error> {
        let mut config = self.monitoring.get_or_create_config().await?;
        let targets = self.models.list_monitored_with_providers().await?;
        info!(models = targets.len(), "running uptime checks");

        let probes = targets
            .iter()
            .map(|(model, provider)| self.checker.check(model, provider, &config.prompt_pack));
        let checks: Vec<UptimeCheck> = futures::future::join_all(probes).await;

        // Checks are written before alert evaluation reads them
        self.monitoring.insert_checks(&checks).await?;
        self.evaluator.evaluate(&checks).await?;

        config.last_run_at = Some(Utc::now());
        self.monitoring.update_config(&config).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arguslm_common::{CredentialVault, RetryConfig};
    use arguslm_domain::{
        AlertRule, AlertRuleKind, Model, ProviderAccount, ProviderCredentials, ProviderKind,
        UptimeStatus,
    };
    use arguslm_infrastructure::{
        run_migrations, AlertRepository as _, DatabaseConfig, DatabasePool,
        ModelRepository as _, MonitoringRepository as _, ProviderRepository as _,
        SqliteAlertRepository, SqliteModelRepository, SqliteMonitoringRepository,
        SqliteProviderRepository, UptimeQuery,
    };
    use crate::invoker::ProviderInvoker;
    use crate::throttle::ThrottleManager;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        scheduler: MonitoringScheduler,
        monitoring: Arc<SqliteMonitoringRepository>,
        alerts: Arc<SqliteAlertRepository>,
        models: Arc<SqliteModelRepository>,
        providers: SqliteProviderRepository,
        vault: Arc<CredentialVault>,
    }

    async fn fixture() -> Fixture {
        let pool = DatabasePool::new(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(pool.pool()).await.unwrap();

        let monitoring = Arc::new(SqliteMonitoringRepository::new(pool.pool().clone()));
        let alerts = Arc::new(SqliteAlertRepository::new(pool.pool().clone()));
        let models = Arc::new(SqliteModelRepository::new(pool.pool().clone()));
        let providers = SqliteProviderRepository::new(pool.pool().clone());
        let vault = Arc::new(CredentialVault::new(&CredentialVault::generate_key()).unwrap());

        let checker = Arc::new(UptimeChecker::new(
            Arc::new(ProviderInvoker::with_retry(RetryConfig::new(
                1,
                Duration::from_millis(1),
            ))),
            Arc::new(ThrottleManager::default()),
            vault.clone(),
        ));
        let evaluator = Arc::new(AlertEvaluator::new(alerts.clone(), models.clone()));
        let scheduler =
            MonitoringScheduler::new(models.clone(), monitoring.clone(), checker, evaluator);

        Fixture {
            scheduler,
            monitoring,
            alerts,
            models,
            providers,
            vault,
        }
    }

    async fn seed_monitored_model(fixture: &Fixture, base_url: &str) -> Model {
        let credentials = ProviderCredentials::with_base_url(base_url);
        let provider = ProviderAccount::new(
            ProviderKind::CustomOpenaiCompatible,
            "monitored",
            fixture.vault.encrypt(&credentials).unwrap(),
        );
        fixture.providers.create(&provider).await.unwrap();
        let mut model = Model::discovered(provider.id, "watched-model", serde_json::json!({}));
        model.enabled_for_monitoring = true;
        fixture.models.create(&model).await.unwrap();
        model
    }

    #[tokio::test]
    async fn test_tick_writes_checks_then_alerts_and_stamps_last_run() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("broken"))
            .mount(&server)
            .await;

        let fixture = fixture().await;
        let model = seed_monitored_model(&fixture, &server.uri()).await;

        let rule = AlertRule::new("any down", AlertRuleKind::AnyModelDown);
        fixture.alerts.create_rule(&rule).await.unwrap();

        fixture.scheduler.run_once().await;

        let (checks, total) = fixture
            .monitoring
            .history(&UptimeQuery::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(checks[0].check.model_id, model.id);
        assert_eq!(checks[0].check.status, UptimeStatus::Down);

        // The down check produced an alert in the same tick
        assert_eq!(fixture.alerts.unacknowledged_count().await.unwrap(), 1);

        let config = fixture.monitoring.get_or_create_config().await.unwrap();
        assert!(config.last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_tick_with_no_monitored_models_is_harmless() {
        let fixture = fixture().await;
        fixture.scheduler.run_once().await;

        let (_, total) = fixture
            .monitoring
            .history(&UptimeQuery::default())
            .await
            .unwrap();
        assert_eq!(total, 0);
        // last_run_at still advances
        let config = fixture.monitoring.get_or_create_config().await.unwrap();
        assert!(config.last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_configure_replaces_and_disables_job() {
        let fixture = fixture().await;

        fixture.scheduler.configure(15, true);
        assert!(fixture.scheduler.is_scheduled());

        // Reconfiguration swaps the job in place
        fixture.scheduler.configure(1, true);
        assert!(fixture.scheduler.is_scheduled());

        fixture.scheduler.configure(15, false);
        assert!(!fixture.scheduler.is_scheduled());

        fixture.scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_installs_job_from_persisted_config() {
        let fixture = fixture().await;
        fixture.scheduler.start().await.unwrap();
        assert!(fixture.scheduler.is_scheduled());
        fixture.scheduler.shutdown().await;
        assert!(!fixture.scheduler.is_scheduled());
    }

    #[tokio::test]
    async fn test_disabled_config_installs_no_job() {
        let fixture = fixture().await;
        let mut config = fixture.monitoring.get_or_create_config().await.unwrap();
        config.enabled = false;
        fixture.monitoring.update_config(&config).await.unwrap();

        fixture.scheduler.start().await.unwrap();
        assert!(!fixture.scheduler.is_scheduled());
    }
}
