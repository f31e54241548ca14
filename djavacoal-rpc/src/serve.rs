//! HTTP boundary for the RPC layer.
//!
//! All procedures are exposed under a single catch-all route, `/rpc/{*path}`,
//! accepting any HTTP method. The URL tail maps to the procedure path with
//! slashes rewritten to dots, so `POST /rpc/auth/invite` dispatches
//! `auth.invite`. GET and HEAD carry their input as JSON in the `input` query
//! parameter; every other method carries a JSON body. Routing inside the
//! prefix is resolved by the RPC router alone: an unknown procedure is a 404
//! from dispatch, not from the HTTP layer.
//!
//! The transport seeds the request scope with the bearer token (when an
//! `Authorization` header is present) and a fresh [`CancelToken`] whose drop
//! guard is held across dispatch, so abandoning the connection cancels
//! in-flight work.

use crate::context::{scope_keys, CancelToken, RequestScope};
use crate::router::DynRouter;
use crate::RpcError;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

/// Query-string parameters accepted on GET/HEAD calls.
#[derive(Debug, Deserialize)]
struct RpcParams {
    input: Option<String>,
}

/// Build the HTTP router exposing `rpc` under `/rpc/{*path}`.
pub fn http_router(rpc: Arc<dyn DynRouter>) -> axum::Router {
    axum::Router::new()
        .route("/rpc/{*path}", any(rpc_handler))
        .with_state(rpc)
}

async fn rpc_handler(
    State(rpc): State<Arc<dyn DynRouter>>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    Query(params): Query<RpcParams>,
    body: Bytes,
) -> Response {
    let procedure = path_to_procedure(&path);

    let input = match decode_request_input(&method, params.input.as_deref(), &body) {
        Ok(input) => input,
        Err(err) => return error_response(err),
    };

    let (status, value) = dispatch(rpc.as_ref(), &procedure, input, bearer_token(&headers)).await;
    (status, Json(value)).into_response()
}

/// Dispatch one call through the RPC router, seeding the transport scope.
///
/// Returned separately from the axum handler so tests can drive the boundary
/// without an HTTP server.
pub async fn dispatch(
    rpc: &dyn DynRouter,
    procedure: &str,
    input: serde_json::Value,
    auth_token: Option<String>,
) -> (StatusCode, serde_json::Value) {
    let mut seed = RequestScope::new();
    if let Some(token) = auth_token {
        if let Err(err) = seed.insert(scope_keys::AUTH_TOKEN, token) {
            return error_payload(err);
        }
    }

    let cancel = CancelToken::new();
    if let Err(err) = seed.insert(scope_keys::CANCEL, cancel.clone()) {
        return error_payload(err);
    }
    // Dropping this future (client disconnect) cancels the token.
    let _guard = cancel.drop_guard();

    match rpc.call(procedure, input, seed).await {
        Ok(value) => (StatusCode::OK, value),
        Err(err) => {
            tracing::debug!(procedure = %procedure, code = %err.code, "rpc call failed");
            error_payload(err)
        }
    }
}

/// Map a URL tail to a dot-separated procedure path.
pub fn path_to_procedure(tail: &str) -> String {
    tail.trim_matches('/').replace('/', ".")
}

/// Extract the bearer token from the `Authorization` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}

/// Decode the call input from the request.
///
/// GET/HEAD read the `input` query parameter; other methods read the body.
/// A missing input is JSON `null`, which unit-input procedures accept.
pub fn decode_request_input(
    method: &Method,
    query_input: Option<&str>,
    body: &[u8],
) -> Result<serde_json::Value, RpcError> {
    if method == Method::GET || method == Method::HEAD {
        match query_input {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| RpcError::bad_request(format!("Invalid input parameter: {}", e))),
            None => Ok(serde_json::Value::Null),
        }
    } else if body.is_empty() {
        Ok(serde_json::Value::Null)
    } else {
        serde_json::from_slice(body)
            .map_err(|e| RpcError::bad_request(format!("Invalid request body: {}", e)))
    }
}

fn error_payload(err: RpcError) -> (StatusCode, serde_json::Value) {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let sanitized = err.sanitize();
    (status, serde_json::json!({ "error": sanitized }))
}

fn error_response(err: RpcError) -> Response {
    let (status, value) = error_payload(err);
    (status, Json(value)).into_response()
}
