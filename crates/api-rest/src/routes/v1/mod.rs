//! Versioned API routes.

pub mod alerts;
pub mod benchmarks;
pub mod models;
pub mod monitoring;
pub mod providers;

use axum::Router;

use crate::state::AppState;

/// All v1 routes, mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(providers::routes())
        .merge(models::routes())
        .merge(monitoring::routes())
        .merge(benchmarks::routes())
        .merge(alerts::routes())
}
