//! Alert rule and alert repository, including the open-incident predicate
//! the evaluator deduplicates against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use arguslm_domain::{Alert, AlertId, AlertRule, AlertRuleId, AlertRuleKind, ModelId};

use crate::{Error, Result};

/// Query parameters for alert listings.
#[derive(Debug, Clone)]
pub struct AlertQuery {
    pub rule_id: Option<AlertRuleId>,
    pub acknowledged: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for AlertQuery {
    fn default() -> Self {
        Self {
            rule_id: None,
            acknowledged: None,
            since: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Repository trait for alert rules and alerts.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn create_rule(&self, rule: &AlertRule) -> Result<()>;

    async fn get_rule(&self, id: AlertRuleId) -> Result<Option<AlertRule>>;

    /// All rules, newest first.
    async fn list_rules(&self) -> Result<Vec<AlertRule>>;

    /// Rules the evaluator runs each tick.
    async fn list_enabled_rules(&self) -> Result<Vec<AlertRule>>;

    async fn update_rule(&self, rule: &AlertRule) -> Result<()>;

    /// Delete a rule (its alerts cascade). Returns false when absent.
    async fn delete_rule(&self, id: AlertRuleId) -> Result<bool>;

    async fn insert_alerts(&self, alerts: &[Alert]) -> Result<()>;

    async fn get_alert(&self, id: AlertId) -> Result<Option<Alert>>;

    /// Filtered listing, newest first; returns (items, total matching).
    async fn list_alerts(&self, query: &AlertQuery) -> Result<(Vec<Alert>, u64)>;

    /// Most recent alerts regardless of acknowledgement.
    async fn recent_alerts(&self, limit: u32) -> Result<Vec<Alert>>;

    /// Count of unacknowledged alerts (notification badge).
    async fn unacknowledged_count(&self) -> Result<u64>;

    /// Mark acknowledged. Idempotent; returns the stored alert when present.
    async fn acknowledge(&self, id: AlertId) -> Result<Option<Alert>>;

    /// Open-incident predicate: an unacknowledged alert exists for this rule
    /// and model key (`None` matches only NULL model ids).
    async fn has_open_incident(
        &self,
        rule_id: AlertRuleId,
        model_id: Option<ModelId>,
    ) -> Result<bool>;
}

/// SQLite implementation of [`AlertRepository`].
pub struct SqliteAlertRepository {
    pool: SqlitePool,
}

impl SqliteAlertRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_rule_row(row: &SqliteRow) -> Result<AlertRule> {
    let kind: String = row.try_get("rule_kind")?;
    let rule_kind: AlertRuleKind = kind.parse().map_err(|e: String| Error::CorruptRow(e))?;
    Ok(AlertRule {
        id: row.try_get::<Uuid, _>("id")?.into(),
        name: row.try_get("name")?,
        rule_kind,
        enabled: row.try_get("enabled")?,
        target_model_id: row.try_get::<Option<Uuid>, _>("target_model_id")?.map(Into::into),
        target_model_name: row.try_get("target_model_name")?,
        threshold_config: row
            .try_get::<Option<Json<serde_json::Value>>, _>("threshold_config")?
            .map(|json| json.0),
        notify_in_app: row.try_get("notify_in_app")?,
        notify_email: row.try_get("notify_email")?,
        notify_webhook: row.try_get("notify_webhook")?,
        webhook_url: row.try_get("webhook_url")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn map_alert_row(row: &SqliteRow) -> Result<Alert> {
    Ok(Alert {
        id: row.try_get::<Uuid, _>("id")?.into(),
        rule_id: row.try_get::<Uuid, _>("rule_id")?.into(),
        model_id: row.try_get::<Option<Uuid>, _>("model_id")?.map(Into::into),
        message: row.try_get("message")?,
        acknowledged: row.try_get("acknowledged")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl AlertRepository for SqliteAlertRepository {
    async fn create_rule(&self, rule: &AlertRule) -> Result<()> {
        sqlx::query(
            "INSERT INTO alert_rules \
             (id, name, rule_kind, enabled, target_model_id, target_model_name, threshold_config, \
              notify_in_app, notify_email, notify_webhook, webhook_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(rule.id.into_uuid())
        .bind(&rule.name)
        .bind(rule.rule_kind.as_str())
        .bind(rule.enabled)
        .bind(rule.target_model_id.map(|id| id.into_uuid()))
        .bind(&rule.target_model_name)
        .bind(rule.threshold_config.as_ref().map(Json))
        .bind(rule.notify_in_app)
        .bind(rule.notify_email)
        .bind(rule.notify_webhook)
        .bind(&rule.webhook_url)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_rule(&self, id: AlertRuleId) -> Result<Option<AlertRule>> {
        let row = sqlx::query("SELECT * FROM alert_rules WHERE id = ?")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_rule_row).transpose()
    }

    async fn list_rules(&self) -> Result<Vec<AlertRule>> {
        let rows = sqlx::query("SELECT * FROM alert_rules ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_rule_row).collect()
    }

    async fn list_enabled_rules(&self) -> Result<Vec<AlertRule>> {
        let rows = sqlx::query("SELECT * FROM alert_rules WHERE enabled = 1 ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_rule_row).collect()
    }

    async fn update_rule(&self, rule: &AlertRule) -> Result<()> {
        sqlx::query(
            "UPDATE alert_rules SET name = ?, enabled = ?, target_model_id = ?, \
             target_model_name = ?, threshold_config = ?, notify_in_app = ?, notify_email = ?, \
             notify_webhook = ?, webhook_url = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&rule.name)
        .bind(rule.enabled)
        .bind(rule.target_model_id.map(|id| id.into_uuid()))
        .bind(&rule.target_model_name)
        .bind(rule.threshold_config.as_ref().map(Json))
        .bind(rule.notify_in_app)
        .bind(rule.notify_email)
        .bind(rule.notify_webhook)
        .bind(&rule.webhook_url)
        .bind(Utc::now())
        .bind(rule.id.into_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_rule(&self, id: AlertRuleId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM alert_rules WHERE id = ?")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_alerts(&self, alerts: &[Alert]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for alert in alerts {
            sqlx::query(
                "INSERT INTO alerts (id, rule_id, model_id, message, acknowledged, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(alert.id.into_uuid())
            .bind(alert.rule_id.into_uuid())
            .bind(alert.model_id.map(|id| id.into_uuid()))
            .bind(&alert.message)
            .bind(alert.acknowledged)
            .bind(alert.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_alert(&self, id: AlertId) -> Result<Option<Alert>> {
        let row = sqlx::query("SELECT * FROM alerts WHERE id = ?")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_alert_row).transpose()
    }

    async fn list_alerts(&self, query: &AlertQuery) -> Result<(Vec<Alert>, u64)> {
        let push_filters = |qb: &mut QueryBuilder<'_, Sqlite>| {
            if let Some(rule_id) = query.rule_id {
                qb.push(" AND rule_id = ").push_bind(rule_id.into_uuid());
            }
            if let Some(acknowledged) = query.acknowledged {
                qb.push(" AND acknowledged = ").push_bind(acknowledged);
            }
            if let Some(since) = query.since {
                qb.push(" AND created_at >= ").push_bind(since);
            }
        };

        let mut count_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM alerts WHERE 1=1");
        push_filters(&mut count_qb);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM alerts WHERE 1=1");
        push_filters(&mut qb);
        qb.push(" ORDER BY created_at DESC");
        qb.push(" LIMIT ").push_bind(query.limit.max(1) as i64);
        qb.push(" OFFSET ").push_bind(query.offset as i64);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let alerts = rows.iter().map(map_alert_row).collect::<Result<Vec<_>>>()?;
        Ok((alerts, total as u64))
    }

    async fn recent_alerts(&self, limit: u32) -> Result<Vec<Alert>> {
        let rows = sqlx::query("SELECT * FROM alerts ORDER BY created_at DESC LIMIT ?")
            .bind(limit.max(1) as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_alert_row).collect()
    }

    async fn unacknowledged_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE acknowledged = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn acknowledge(&self, id: AlertId) -> Result<Option<Alert>> {
        sqlx::query("UPDATE alerts SET acknowledged = 1 WHERE id = ?")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await?;
        self.get_alert(id).await
    }

    async fn has_open_incident(
        &self,
        rule_id: AlertRuleId,
        model_id: Option<ModelId>,
    ) -> Result<bool> {
        let count: i64 = match model_id {
            Some(model_id) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM alerts \
                     WHERE rule_id = ? AND model_id = ? AND acknowledged = 0",
                )
                .bind(rule_id.into_uuid())
                .bind(model_id.into_uuid())
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM alerts \
                     WHERE rule_id = ? AND model_id IS NULL AND acknowledged = 0",
                )
                .bind(rule_id.into_uuid())
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(count > 0)
    }
}
