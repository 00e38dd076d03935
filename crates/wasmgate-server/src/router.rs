//! HTTP router configuration.
//!
//! Routes:
//! - `ANY /{module_id}[/...]` - Invoke the named module
//! - `GET /` - 400 with a usage message (no module identifier)
//! - `GET /health` - Health check

use std::time::Duration;

use axum::Router;
use axum::routing::{any, get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::gateway::{handle_invoke, handle_root, health_check};
use crate::state::AppState;

/// Build the application router.
///
/// Any method is accepted on the invocation route; the module identifier
/// is the first non-empty path segment and the rest of the path is passed
/// through to the guest environment.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", any(handle_root))
        .route("/health", get(health_check))
        .route("/*path", any(handle_invoke))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
