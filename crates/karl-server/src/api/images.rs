use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use karl_core::SupermarketId;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_facade_error, AppState, ApiError, ApiResponse, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct AddImageCitationRequest {
    pub supermarket_id: i64,
    pub original_uri: String,
    pub source_uri: String,
    pub retrieved_on: DateTime<Utc>,
    /// Base64-encoded image bytes, kept as JSON to match the rest of the
    /// API surface rather than splitting this one route off into multipart.
    pub image_base64: String,
}

#[derive(Debug, Serialize)]
pub(super) struct ImageCitationResponse {
    pub id: i64,
}

pub(super) async fn add_product_image_citation(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(identifier): Path<String>,
    Json(body): Json<AddImageCitationRequest>,
) -> Result<Json<ApiResponse<ImageCitationResponse>>, ApiError> {
    use base64::Engine;

    let image_bytes = base64::engine::general_purpose::STANDARD
        .decode(&body.image_base64)
        .map_err(|_| ApiError::new(req_id.0.clone(), "bad_request", "image_base64 is not valid base64"))?;

    let id = state
        .karl
        .add_product_image_citation(
            SupermarketId::new(body.supermarket_id),
            &identifier,
            &body.original_uri,
            &body.source_uri,
            body.retrieved_on,
            &image_bytes,
        )
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ImageCitationResponse { id: id.unseal() },
        meta: ResponseMeta::new(req_id.0),
    }))
}
