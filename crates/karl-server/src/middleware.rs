//! Request-id tagging (kept from the teacher's own middleware) plus a
//! session-bearer-auth layer over `karl_facade::Karl::check_session`, which
//! is the network-facing side of spec.md §4.5's `check_session` operation.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::api::AppState;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Requires `Authorization: Bearer <hex session token>` and validates it via
/// `Karl::check_session`. `session_expected` (spec.md §7) when the header is
/// missing or malformed; `session_invalid` when `check_session` rejects it.
/// A no-op pass-through when the façade was constructed with
/// `enforce_permissions = false` (`--no-perms`), per spec.md §9.
pub async fn require_session(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token_hex = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token_hex) = token_hex else {
        if !state.karl.check_permissions() {
            return Ok(next.run(req).await);
        }
        return Err(error_response(StatusCode::UNAUTHORIZED, "session_expected", "missing bearer token"));
    };

    let Ok(token) = hex::decode(token_hex) else {
        return Err(error_response(StatusCode::UNAUTHORIZED, "session_invalid", "malformed session token"));
    };

    state
        .karl
        .check_session(&token)
        .await
        .map_err(|_| error_response(StatusCode::UNAUTHORIZED, "session_invalid", "session missing or expired"))?;

    Ok(next.run(req).await)
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "error": { "code": code, "message": message } }))).into_response()
}
