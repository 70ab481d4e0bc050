mod images;
mod products;
mod sessions;
mod tags;

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use karl_facade::{FacadeError, Karl};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{request_id, require_session, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub karl: Arc<Karl>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(request_id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "authentication_failed" | "session_invalid" => StatusCode::UNAUTHORIZED,
            "bad_request" => StatusCode::BAD_REQUEST,
            "integrity_violation" | "logic" => StatusCode::CONFLICT,
            "backend_down" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Maps spec.md §7's error kinds onto HTTP status codes, mirroring the
/// teacher's own `map_db_error` helper.
pub(super) fn map_facade_error(request_id: String, error: &FacadeError) -> ApiError {
    let code = match error {
        FacadeError::NotFound => "not_found",
        FacadeError::AuthenticationError => "authentication_failed",
        FacadeError::SessionInvalid => "session_invalid",
        FacadeError::IntegrityViolation(_) => "integrity_violation",
        FacadeError::Logic(_) => "logic",
        FacadeError::BackendDown(_) => "backend_down",
    };
    if matches!(error, FacadeError::BackendDown(_)) {
        tracing::error!(error = %error, "facade call failed");
    }
    ApiError::new(request_id, code, error.to_string())
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/products",
            get(products::list_products).post(products::add_product),
        )
        .route("/api/v1/products/search", get(products::search_products))
        .route("/api/v1/products/{identifier}", get(products::get_product))
        .route(
            "/api/v1/products/{identifier}/history",
            get(products::get_product_history),
        )
        .route(
            "/api/v1/products/{identifier}/image-citation",
            post(images::add_product_image_citation),
        )
        .route("/api/v1/productlog", get(products::get_recent_productlog))
        .route(
            "/api/v1/productclasses/{id}",
            get(products::get_productclass),
        )
        .route(
            "/api/v1/productclasses/absorb",
            post(products::absorb_productclass),
        )
        .route(
            "/api/v1/tags",
            get(tags::get_tags).post(tags::find_add_tag),
        )
        .route("/api/v1/tagcategories", post(tags::find_add_tagcategory))
        .route("/api/v1/tags/bind", post(tags::bind_tag))
        .route("/api/v1/tags/{id}/parent", put(tags::update_tag_set_parent))
        .route("/api/v1/tags/absorb", post(tags::absorb_tag))
        .route("/api/v1/tags/check-integrity", post(tags::check_integrity))
        .route_layer(axum::middleware::from_fn_with_state(state, require_session))
}

pub fn build_app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/users", post(sessions::create_user))
        .route("/api/v1/sessions/tickets", post(sessions::generate_sessionticket))
        .route("/api/v1/sessions", post(sessions::create_session));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(Extension(req_id): Extension<RequestId>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse {
            data: "ok",
            meta: ResponseMeta::new(req_id.0),
        }),
    )
}
