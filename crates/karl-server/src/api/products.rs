use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use karl_core::{AddProduct, ProductclassId, SupermarketId};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_facade_error, AppState, ApiError, ApiResponse, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct SupermarketQuery {
    pub supermarket_id: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchQuery {
    pub supermarket_id: i64,
    pub name: String,
}

pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(identifier): Path<String>,
    Query(query): Query<SupermarketQuery>,
) -> Result<Json<ApiResponse<karl_core::ProductSummary>>, ApiError> {
    let data = state
        .karl
        .get_product(&identifier, SupermarketId::new(query.supermarket_id))
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SupermarketQuery>,
) -> Result<Json<ApiResponse<Vec<karl_core::ProductSummary>>>, ApiError> {
    let data = state
        .karl
        .get_products(SupermarketId::new(query.supermarket_id))
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn search_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<karl_core::ProductSummary>>>, ApiError> {
    let data = state
        .karl
        .get_products_by_name(&query.name, SupermarketId::new(query.supermarket_id))
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_product_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(identifier): Path<String>,
    Query(query): Query<SupermarketQuery>,
) -> Result<Json<ApiResponse<Vec<karl_core::ProductHistoryPoint>>>, ApiError> {
    let data = state
        .karl
        .get_product_history(&identifier, SupermarketId::new(query.supermarket_id))
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct AddProductRequest {
    pub supermarket_id: i64,
    #[serde(flatten)]
    pub product: AddProduct,
}

pub(super) async fn add_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<AddProductRequest>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    state
        .karl
        .add_product(SupermarketId::new(body.supermarket_id), &body.product)
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: "accepted",
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_recent_productlog(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SupermarketQuery>,
) -> Result<Json<ApiResponse<Vec<karl_core::ProductLogEntry>>>, ApiError> {
    let data = state
        .karl
        .get_recent_productlog(SupermarketId::new(query.supermarket_id))
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_productclass(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<karl_core::ProductclassSummary>>, ApiError> {
    let data = state
        .karl
        .get_productclass(ProductclassId::new(id))
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct AbsorbRequest {
    pub src: i64,
    pub dst: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct AbsorbResponse {
    pub absorbed: bool,
}

pub(super) async fn absorb_productclass(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<AbsorbRequest>,
) -> Result<Json<ApiResponse<AbsorbResponse>>, ApiError> {
    state
        .karl
        .absorb_productclass(ProductclassId::new(body.src), ProductclassId::new(body.dst))
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: AbsorbResponse { absorbed: true },
        meta: ResponseMeta::new(req_id.0),
    }))
}
