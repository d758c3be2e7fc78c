//! ArgusLM server binary.
//!
//! Startup order: config validation (fatal on bad keys), database pool +
//! migrations, state wiring, scheduler start, HTTP serve. Shutdown order:
//! scheduler first (waits for the current tick), then in-flight benchmark
//! tasks, then the store.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use arguslm_api_rest::{create_app, AppState};
use arguslm_common::{telemetry, AppConfig, CredentialVault};
use arguslm_infrastructure::{run_migrations, DatabaseConfig, DatabasePool};

#[derive(Parser)]
#[command(name = "arguslm-server", about = "ArgusLM observability server", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Bind host (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a fresh credential-vault encryption key
    GenerateKey,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::GenerateKey) = cli.command {
        println!("{}", CredentialVault::generate_key());
        return Ok(());
    }

    // Config validation failures exit non-zero before anything else starts
    let mut config = AppConfig::from_env()?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    telemetry::init_tracing(&config.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting arguslm-server");

    let db_config = DatabaseConfig {
        url: config.database_url.clone(),
        echo: config.database_echo,
        ..Default::default()
    };
    let pool = DatabasePool::new(&db_config)
        .await
        .context("failed to open database")?;
    run_migrations(pool.pool())
        .await
        .context("failed to run migrations")?;

    let bind_address = config.bind_address();
    let state = AppState::new(config, pool.pool().clone()).context("failed to wire state")?;

    state
        .scheduler
        .start()
        .await
        .context("failed to start monitoring scheduler")?;

    let app = create_app(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(%bind_address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Scheduler drains its current tick, then in-flight runs are cancelled
    // and marked failed, then the store closes
    state.scheduler.shutdown().await;
    state
        .runs
        .abort_all(state.benchmarks.as_ref(), state.bus.as_ref())
        .await;
    pool.close().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
