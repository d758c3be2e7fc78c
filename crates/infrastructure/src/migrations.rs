//! Embedded schema migrations.
//!
//! The schema is created idempotently at startup. Statements run one at a
//! time because the SQLite driver executes a single statement per query.

use sqlx::SqlitePool;
use tracing::debug;

use crate::Result;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS provider_accounts (
        id                    BLOB PRIMARY KEY,
        provider_kind         TEXT NOT NULL,
        display_name          TEXT NOT NULL,
        credentials_encrypted TEXT NOT NULL,
        enabled               INTEGER NOT NULL DEFAULT 1,
        created_at            TEXT NOT NULL,
        updated_at            TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS models (
        id                     BLOB PRIMARY KEY,
        provider_account_id    BLOB NOT NULL REFERENCES provider_accounts(id) ON DELETE CASCADE,
        model_id               TEXT NOT NULL,
        custom_name            TEXT,
        source                 TEXT NOT NULL,
        enabled_for_monitoring INTEGER NOT NULL DEFAULT 0,
        enabled_for_benchmark  INTEGER NOT NULL DEFAULT 1,
        metadata               TEXT NOT NULL DEFAULT '{}',
        created_at             TEXT NOT NULL,
        updated_at             TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_models_provider ON models(provider_account_id)",
    r#"
    CREATE TABLE IF NOT EXISTS monitoring_configs (
        id               BLOB PRIMARY KEY,
        interval_minutes INTEGER NOT NULL,
        prompt_pack      TEXT NOT NULL,
        enabled          INTEGER NOT NULL DEFAULT 1,
        last_run_at      TEXT,
        created_at       TEXT NOT NULL,
        updated_at       TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS uptime_checks (
        id            BLOB PRIMARY KEY,
        model_id      BLOB NOT NULL REFERENCES models(id) ON DELETE CASCADE,
        status        TEXT NOT NULL,
        latency_ms    REAL,
        ttft_ms       REAL,
        tps           REAL,
        output_tokens INTEGER,
        error         TEXT,
        created_at    TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_uptime_checks_model ON uptime_checks(model_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_uptime_checks_created ON uptime_checks(created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS benchmark_runs (
        id           BLOB PRIMARY KEY,
        name         TEXT NOT NULL,
        model_ids    TEXT NOT NULL,
        prompt_pack  TEXT NOT NULL,
        status       TEXT NOT NULL,
        triggered_by TEXT NOT NULL,
        started_at   TEXT NOT NULL,
        completed_at TEXT,
        created_at   TEXT NOT NULL,
        updated_at   TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS benchmark_results (
        id                 BLOB PRIMARY KEY,
        run_id             BLOB NOT NULL REFERENCES benchmark_runs(id) ON DELETE CASCADE,
        model_id           BLOB NOT NULL REFERENCES models(id) ON DELETE CASCADE,
        ttft_ms            REAL NOT NULL,
        tps                REAL NOT NULL,
        tps_excluding_ttft REAL NOT NULL,
        total_latency_ms   REAL NOT NULL,
        input_tokens       INTEGER NOT NULL,
        output_tokens      INTEGER NOT NULL,
        estimated_cost     REAL,
        error              TEXT,
        seq                INTEGER NOT NULL,
        created_at         TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_benchmark_results_run ON benchmark_results(run_id, seq)",
    r#"
    CREATE TABLE IF NOT EXISTS alert_rules (
        id                BLOB PRIMARY KEY,
        name              TEXT NOT NULL,
        rule_kind         TEXT NOT NULL,
        enabled           INTEGER NOT NULL DEFAULT 1,
        target_model_id   BLOB REFERENCES models(id) ON DELETE CASCADE,
        target_model_name TEXT,
        threshold_config  TEXT,
        notify_in_app     INTEGER NOT NULL DEFAULT 1,
        notify_email      INTEGER NOT NULL DEFAULT 0,
        notify_webhook    INTEGER NOT NULL DEFAULT 0,
        webhook_url       TEXT,
        created_at        TEXT NOT NULL,
        updated_at        TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alerts (
        id           BLOB PRIMARY KEY,
        rule_id      BLOB NOT NULL REFERENCES alert_rules(id) ON DELETE CASCADE,
        model_id     BLOB REFERENCES models(id) ON DELETE SET NULL,
        message      TEXT NOT NULL,
        acknowledged INTEGER NOT NULL DEFAULT 0,
        created_at   TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_alerts_open ON alerts(rule_id, acknowledged)",
];

/// Create or update the schema. Safe to run on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for statement in STATEMENTS {
        debug!(statement = statement.lines().nth(1).unwrap_or(statement).trim(), "applying migration statement");
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
