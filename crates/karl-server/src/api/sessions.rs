use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_facade_error, AppState, ApiError, ApiResponse, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct CreateUserRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateUserResponse {
    pub id: i64,
}

pub(super) async fn create_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<CreateUserResponse>>, ApiError> {
    let id = state
        .karl
        .create_user(&body.name, &body.password)
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: CreateUserResponse { id: id.unseal() },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct GenerateTicketRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub(super) struct GenerateTicketResponse {
    pub ticket_id: i64,
    pub nonce: String,
    pub password_salt: String,
}

/// Always an authentication challenge, never a username lookup: an unknown
/// username maps to the same `authentication_failed` an existing user with
/// a wrong password would eventually hit via `create_session`.
pub(super) async fn generate_sessionticket(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<GenerateTicketRequest>,
) -> Result<Json<ApiResponse<GenerateTicketResponse>>, ApiError> {
    let challenge = state
        .karl
        .generate_sessionticket(&body.username)
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: GenerateTicketResponse {
            ticket_id: challenge.ticket_id,
            nonce: hex::encode(challenge.nonce),
            password_salt: hex::encode(challenge.password_salt),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateSessionRequest {
    pub ticket_id: i64,
    pub ticket_password: String,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateSessionResponse {
    pub token: String,
}

pub(super) async fn create_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<ApiResponse<CreateSessionResponse>>, ApiError> {
    let ticket_password = hex::decode(&body.ticket_password)
        .map_err(|_| ApiError::new(req_id.0.clone(), "bad_request", "ticket_password must be hex-encoded"))?;

    let token = state
        .karl
        .create_session(body.ticket_id, &ticket_password)
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: CreateSessionResponse { token: hex::encode(token) },
        meta: ResponseMeta::new(req_id.0),
    }))
}
