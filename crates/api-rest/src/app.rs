//! Application builder: assembles routes, middleware, and state into the
//! Axum router.

use std::time::Duration;

use axum::http::HeaderValue;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::routes;
use crate::state::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the main application router.
pub fn create_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);

    Router::new()
        .merge(routes::health::routes())
        .nest("/api/v1", routes::v1::routes())
        .merge(swagger_ui())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors)
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
}

/// Build the CORS layer from the configured origin list.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn swagger_ui() -> SwaggerUi {
    #[derive(OpenApi)]
    #[openapi(
        info(
            title = "ArgusLM API",
            version = "0.2.0",
            description = "Observability platform for fleets of LLM endpoints",
            license(name = "MIT"),
        ),
        servers(
            (url = "/", description = "This server")
        ),
        tags(
            (name = "health", description = "Liveness"),
            (name = "providers", description = "Provider account management"),
            (name = "models", description = "Model registry"),
            (name = "monitoring", description = "Uptime monitoring and export"),
            (name = "benchmarks", description = "Benchmark runs and live progress"),
            (name = "alerts", description = "Alert rules and incidents"),
        )
    )]
    struct ApiDoc;

    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
