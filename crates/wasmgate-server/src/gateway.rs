//! Request handlers for module invocation.
//!
//! The gateway handler owns the request-to-invocation translation:
//! module identifier extraction, environment construction, resolution,
//! sandbox invocation, and the mapping of every failure class onto a
//! distinct HTTP status.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Host, Path, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{error, info, instrument};
use uuid::Uuid;

use wasmgate_common::GatewayError;

use crate::env::RequestEnv;
use crate::response::GatewayResponse;
use crate::state::AppState;

/// Fixed usage message returned for requests with no module identifier.
const USAGE: &str = "usage: /{module-id}";

/// Invoke a module for an HTTP request.
///
/// The first non-empty path segment names the module; remaining segments
/// are ignored by routing but stay visible to the guest via `http_path`.
///
/// 1. Extracts the module identifier (none → 400 usage message)
/// 2. Builds the guest environment from fixed request fields
/// 3. Loads the bytecode artifact (fresh read, no cache)
/// 4. Runs the module in a fresh sandbox
/// 5. Returns the captured stdout verbatim, or a diagnostic
#[instrument(skip(state, method, uri, host, remote_addr), fields(path = %rest))]
pub async fn handle_invoke(
    State(state): State<AppState>,
    Path(rest): Path<String>,
    Host(host): Host,
    method: Method,
    uri: Uri,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    let Some(module_id) = rest.split('/').find(|s| !s.is_empty()).map(str::to_string) else {
        return GatewayResponse::error(400, USAGE).into_axum_response();
    };

    info!(
        request_id = %request_id,
        module_id = %module_id,
        method = %method,
        query = uri.query().unwrap_or_default(),
        "Handling invocation request"
    );

    let env = RequestEnv {
        path: format!("/{rest}"),
        method: method.to_string(),
        host,
        query: uri.query().unwrap_or_default().to_string(),
        remote_addr: remote_addr.to_string(),
    }
    .to_pairs();

    // One fresh artifact read per request.
    let bytecode = match state.resolver().load(&module_id).await {
        Ok(bytes) => bytes,
        Err(e) => return error_to_response(&e).into_axum_response(),
    };

    match state.sandbox().invoke(&module_id, &bytecode, &env).await {
        Ok(output) => {
            info!(
                request_id = %request_id,
                duration_ms = start.elapsed().as_millis(),
                fuel_consumed = output.metrics.fuel_consumed,
                guest_log_count = output.guest_logs.len(),
                "Request completed"
            );

            // The module's stdout is written into the response.
            GatewayResponse::output(output.stdout).into_axum_response()
        }
        Err(e) => {
            error!(
                request_id = %request_id,
                error = %e,
                duration_ms = start.elapsed().as_millis(),
                "Request failed"
            );
            error_to_response(&e).into_axum_response()
        }
    }
}

/// Root-path requests carry no module identifier.
pub async fn handle_root() -> Response {
    GatewayResponse::error(400, USAGE).into_axum_response()
}

/// Health check handler.
///
/// Returns 200 OK if the server is running.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Convert a `GatewayError` to an HTTP response.
///
/// Each failure class maps to its own status; only genuinely missing
/// artifacts produce a 404, and its body names the attempted path.
/// Internal faults (linkage, configuration, I/O) hide their details.
fn error_to_response(error: &GatewayError) -> GatewayResponse {
    match error {
        GatewayError::InvalidModuleId { .. } => GatewayResponse::error(400, &error.to_string()),
        GatewayError::ModuleNotFound { .. } => GatewayResponse::error(404, &error.to_string()),
        GatewayError::InvalidModule { .. } | GatewayError::ExecutionFailed { .. } => {
            GatewayResponse::error(500, &error.to_string())
        }
        GatewayError::ExecutionTimeout { .. } => GatewayResponse::error(504, &error.to_string()),
        GatewayError::FuelExhausted => {
            GatewayResponse::error(429, "execution limit exceeded: fuel exhausted")
        }
        GatewayError::LinkageFailed { .. }
        | GatewayError::InvalidConfig { .. }
        | GatewayError::Io(_) => GatewayResponse::error(500, "internal server error"),
    }
}
