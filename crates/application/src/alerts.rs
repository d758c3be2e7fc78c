//! Alert evaluator: runs enabled rules against one monitoring tick's checks.
//!
//! Deduplication is keyed on open incidents: a new alert is suppressed while
//! an unacknowledged one exists for the same `(rule, model)` pair. Alerts are
//! inserted as they are created so dedup also holds within one batch.
//! Recovery (a later `up` check) never auto-acknowledges.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use arguslm_domain::{Alert, AlertRule, AlertRuleKind, UptimeCheck, UptimeStatus};
use arguslm_infrastructure::{AlertRepository, ModelRepository};

const FALLBACK_MESSAGE: &str = "Health check failed";

/// Evaluates enabled alert rules against batches of uptime checks.
pub struct AlertEvaluator {
    alerts: Arc<dyn AlertRepository>,
    models: Arc<dyn ModelRepository>,
}

impl AlertEvaluator {
    pub fn new(alerts: Arc<dyn AlertRepository>, models: Arc<dyn ModelRepository>) -> Self {
        Self { alerts, models }
    }

    /// Evaluate every enabled rule; returns the newly created alerts.
    pub async fn evaluate(
        &self,
        checks: &[UptimeCheck],
    ) -> Result<Vec<Alert>, arguslm_infrastructure::Error> {
        let rules = self.alerts.list_enabled_rules().await?;

        let mut new_alerts = Vec::new();
        for rule in &rules {
            let created = self.evaluate_rule(rule, checks).await?;
            new_alerts.extend(created);
        }

        if !new_alerts.is_empty() {
            info!(count = new_alerts.len(), "created alerts");
        }
        Ok(new_alerts)
    }

    async fn evaluate_rule(
        &self,
        rule: &AlertRule,
        checks: &[UptimeCheck],
    ) -> Result<Vec<Alert>, arguslm_infrastructure::Error> {
        match rule.rule_kind {
            AlertRuleKind::AnyModelDown => self.any_model_down(rule, checks).await,
            AlertRuleKind::SpecificModelDown => self.specific_model_down(rule, checks).await,
            AlertRuleKind::ModelUnavailableEverywhere => {
                self.model_unavailable_everywhere(rule, checks).await
            }
            // Reserved until the threshold schema is defined
            AlertRuleKind::PerformanceDegradation => Ok(Vec::new()),
        }
    }

    /// One alert per down model, deduplicated per `(rule, model)` key.
    async fn any_model_down(
        &self,
        rule: &AlertRule,
        checks: &[UptimeCheck],
    ) -> Result<Vec<Alert>, arguslm_infrastructure::Error> {
        let mut created = Vec::new();
        for check in checks.iter().filter(|c| c.status == UptimeStatus::Down) {
            if self
                .alerts
                .has_open_incident(rule.id, Some(check.model_id))
                .await?
            {
                continue;
            }

            let alert = Alert::new(
                rule.id,
                Some(check.model_id),
                format!(
                    "Model is down: {}",
                    check.error.as_deref().unwrap_or(FALLBACK_MESSAGE)
                ),
            );
            self.alerts.insert_alerts(std::slice::from_ref(&alert)).await?;
            created.push(alert);
        }
        Ok(created)
    }

    async fn specific_model_down(
        &self,
        rule: &AlertRule,
        checks: &[UptimeCheck],
    ) -> Result<Vec<Alert>, arguslm_infrastructure::Error> {
        let Some(target_model_id) = rule.target_model_id else {
            return Ok(Vec::new());
        };

        let Some(check) = checks.iter().find(|c| c.model_id == target_model_id) else {
            return Ok(Vec::new());
        };
        if check.status != UptimeStatus::Down {
            return Ok(Vec::new());
        }

        if self
            .alerts
            .has_open_incident(rule.id, Some(check.model_id))
            .await?
        {
            return Ok(Vec::new());
        }

        let alert = Alert::new(
            rule.id,
            Some(check.model_id),
            format!(
                "Monitored model is down: {}",
                check.error.as_deref().unwrap_or(FALLBACK_MESSAGE)
            ),
        );
        self.alerts.insert_alerts(std::slice::from_ref(&alert)).await?;
        Ok(vec![alert])
    }

    /// Fires only when every provider instance of the named model is down.
    /// The alert carries no model id; its incident key is `(rule, NULL)`.
    async fn model_unavailable_everywhere(
        &self,
        rule: &AlertRule,
        checks: &[UptimeCheck],
    ) -> Result<Vec<Alert>, arguslm_infrastructure::Error> {
        let Some(target_name) = rule.target_model_name.as_deref().filter(|n| !n.is_empty())
        else {
            return Ok(Vec::new());
        };

        let matching = self.models.find_by_model_id_contains(target_name).await?;
        if matching.is_empty() {
            return Ok(Vec::new());
        }
        let matching_ids: HashSet<_> = matching.iter().map(|m| m.id).collect();

        let relevant: Vec<&UptimeCheck> = checks
            .iter()
            .filter(|c| matching_ids.contains(&c.model_id))
            .collect();
        if relevant.is_empty() {
            return Ok(Vec::new());
        }

        let all_down = relevant.iter().all(|c| c.status == UptimeStatus::Down);
        if !all_down {
            return Ok(Vec::new());
        }

        if self.alerts.has_open_incident(rule.id, None).await? {
            return Ok(Vec::new());
        }

        let alert = Alert::new(
            rule.id,
            None,
            format!(
                "Model '{}' is unavailable across all {} provider(s)",
                target_name,
                relevant.len()
            ),
        );
        self.alerts.insert_alerts(std::slice::from_ref(&alert)).await?;
        Ok(vec![alert])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arguslm_domain::{Model, ModelId, ProviderAccount, ProviderKind};
    use arguslm_infrastructure::{
        run_migrations, AlertRepository as _, DatabaseConfig, DatabasePool,
        ModelRepository as _, ProviderRepository as _, SqliteAlertRepository,
        SqliteModelRepository, SqliteProviderRepository,
    };

    struct Fixture {
        evaluator: AlertEvaluator,
        alerts: Arc<SqliteAlertRepository>,
        models: Arc<SqliteModelRepository>,
        providers: SqliteProviderRepository,
    }

    async fn fixture() -> Fixture {
        let pool = DatabasePool::new(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(pool.pool()).await.unwrap();
        let alerts = Arc::new(SqliteAlertRepository::new(pool.pool().clone()));
        let models = Arc::new(SqliteModelRepository::new(pool.pool().clone()));
        let providers = SqliteProviderRepository::new(pool.pool().clone());
        Fixture {
            evaluator: AlertEvaluator::new(alerts.clone(), models.clone()),
            alerts,
            models,
            providers,
        }
    }

    async fn seed_model(fixture: &Fixture, kind: ProviderKind, model_id: &str) -> Model {
        let provider = ProviderAccount::new(kind, "acct", "blob".to_string());
        fixture.providers.create(&provider).await.unwrap();
        let model = Model::discovered(provider.id, model_id, serde_json::json!({}));
        fixture.models.create(&model).await.unwrap();
        model
    }

    fn down(model_id: ModelId, error: &str) -> UptimeCheck {
        UptimeCheck::down(model_id, error)
    }

    fn up(model_id: ModelId) -> UptimeCheck {
        UptimeCheck::up(model_id, 500.0, 90.0, 40.0, 20)
    }

    #[tokio::test]
    async fn test_any_model_down_with_dedup_and_reacknowledge() {
        let fixture = fixture().await;
        let model = seed_model(&fixture, ProviderKind::Openai, "gpt-4o").await;

        let rule = AlertRule::new("any down", AlertRuleKind::AnyModelDown);
        fixture.alerts.create_rule(&rule).await.unwrap();

        let batch = vec![down(model.id, "e")];

        // First evaluation creates one alert
        let created = fixture.evaluator.evaluate(&batch).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].message, "Model is down: e");
        assert_eq!(created[0].model_id, Some(model.id));

        // Identical batch is suppressed by the open incident
        let created = fixture.evaluator.evaluate(&batch).await.unwrap();
        assert_eq!(created.len(), 0);

        // After acknowledgement a fresh failure opens a new incident
        fixture.alerts.acknowledge(created_first_id(&fixture).await).await.unwrap();
        let created = fixture.evaluator.evaluate(&batch).await.unwrap();
        assert_eq!(created.len(), 1);
    }

    async fn created_first_id(fixture: &Fixture) -> arguslm_domain::AlertId {
        let (alerts, _) = fixture
            .alerts
            .list_alerts(&arguslm_infrastructure::AlertQuery::default())
            .await
            .unwrap();
        alerts[0].id
    }

    #[tokio::test]
    async fn test_any_model_down_fallback_message() {
        let fixture = fixture().await;
        let model = seed_model(&fixture, ProviderKind::Openai, "gpt-4o").await;

        let rule = AlertRule::new("any down", AlertRuleKind::AnyModelDown);
        fixture.alerts.create_rule(&rule).await.unwrap();

        let mut check = down(model.id, "placeholder");
        check.error = None;
        let created = fixture.evaluator.evaluate(&[check]).await.unwrap();
        assert_eq!(created[0].message, "Model is down: Health check failed");
    }

    #[tokio::test]
    async fn test_up_checks_do_not_alert() {
        let fixture = fixture().await;
        let model = seed_model(&fixture, ProviderKind::Openai, "gpt-4o").await;

        let rule = AlertRule::new("any down", AlertRuleKind::AnyModelDown);
        fixture.alerts.create_rule(&rule).await.unwrap();

        let created = fixture.evaluator.evaluate(&[up(model.id)]).await.unwrap();
        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_rules_are_skipped() {
        let fixture = fixture().await;
        let model = seed_model(&fixture, ProviderKind::Openai, "gpt-4o").await;

        let mut rule = AlertRule::new("any down", AlertRuleKind::AnyModelDown);
        rule.enabled = false;
        fixture.alerts.create_rule(&rule).await.unwrap();

        let created = fixture.evaluator.evaluate(&[down(model.id, "e")]).await.unwrap();
        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn test_specific_model_down_targets_one_model() {
        let fixture = fixture().await;
        let watched = seed_model(&fixture, ProviderKind::Openai, "gpt-4o").await;
        let other = seed_model(&fixture, ProviderKind::Groq, "llama3-8b-8192").await;

        let mut rule = AlertRule::new("watch gpt-4o", AlertRuleKind::SpecificModelDown);
        rule.target_model_id = Some(watched.id);
        fixture.alerts.create_rule(&rule).await.unwrap();

        // Another model failing does not trip this rule
        let created = fixture.evaluator.evaluate(&[down(other.id, "e")]).await.unwrap();
        assert!(created.is_empty());

        let created = fixture
            .evaluator
            .evaluate(&[down(watched.id, "quota")])
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].message, "Monitored model is down: quota");
    }

    #[tokio::test]
    async fn test_unavailable_everywhere_gating() {
        let fixture = fixture().await;
        let m1 = seed_model(&fixture, ProviderKind::Openai, "gpt-4o").await;
        let m2 = seed_model(&fixture, ProviderKind::Azure, "gpt-4o").await;

        let mut rule = AlertRule::new("gpt-4o everywhere", AlertRuleKind::ModelUnavailableEverywhere);
        rule.target_model_name = Some("gpt-4o".to_string());
        fixture.alerts.create_rule(&rule).await.unwrap();

        // One provider still up: no alert
        let created = fixture
            .evaluator
            .evaluate(&[down(m1.id, "e"), up(m2.id)])
            .await
            .unwrap();
        assert!(created.is_empty());

        // All providers down: one cross-model alert with no model id
        let created = fixture
            .evaluator
            .evaluate(&[down(m1.id, "e"), down(m2.id, "e")])
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert!(created[0].model_id.is_none());
        assert_eq!(
            created[0].message,
            "Model 'gpt-4o' is unavailable across all 2 provider(s)"
        );

        // Open incident suppresses the duplicate
        let created = fixture
            .evaluator
            .evaluate(&[down(m1.id, "e"), down(m2.id, "e")])
            .await
            .unwrap();
        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_everywhere_needs_relevant_checks() {
        let fixture = fixture().await;
        seed_model(&fixture, ProviderKind::Openai, "gpt-4o").await;
        let unrelated = seed_model(&fixture, ProviderKind::Groq, "llama3-8b-8192").await;

        let mut rule = AlertRule::new("gpt-4o everywhere", AlertRuleKind::ModelUnavailableEverywhere);
        rule.target_model_name = Some("gpt-4o".to_string());
        fixture.alerts.create_rule(&rule).await.unwrap();

        // Batch has no checks for matching models
        let created = fixture
            .evaluator
            .evaluate(&[down(unrelated.id, "e")])
            .await
            .unwrap();
        assert!(created.is_empty());
    }

    #[tokio::test]
    async fn test_performance_degradation_is_noop() {
        let fixture = fixture().await;
        let model = seed_model(&fixture, ProviderKind::Openai, "gpt-4o").await;

        let mut rule = AlertRule::new("degradation", AlertRuleKind::PerformanceDegradation);
        rule.threshold_config = Some(serde_json::json!({"ttft_ms": 1000}));
        fixture.alerts.create_rule(&rule).await.unwrap();

        let created = fixture.evaluator.evaluate(&[down(model.id, "e")]).await.unwrap();
        assert!(created.is_empty());
    }
}
