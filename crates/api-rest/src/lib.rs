//! HTTP/WebSocket surface for ArgusLM.
//!
//! Exposes CRUD over providers, models, monitoring, benchmarks, and alerts
//! under `/api/v1`, plus the live benchmark progress WebSocket and the
//! Swagger UI. The `arguslm-server` binary wires configuration, storage,
//! the scheduler, and graceful shutdown around [`app::create_app`].

pub mod app;
pub mod error;
pub mod responses;
pub mod routes;
pub mod state;

pub use app::create_app;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::AppState;
