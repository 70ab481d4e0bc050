use axum::{
    extract::{Path, State},
    Extension, Json,
};
use karl_core::{ProductclassId, Tag, TagId, TagcategoryId};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_facade_error, AppState, ApiError, ApiResponse, ResponseMeta};

pub(super) async fn get_tags(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<Tag>>>, ApiError> {
    let data = state
        .karl
        .get_tags()
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct NewTagcategory {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub(super) struct IdResponse {
    pub id: i64,
}

pub(super) async fn find_add_tagcategory(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<NewTagcategory>,
) -> Result<Json<ApiResponse<IdResponse>>, ApiError> {
    let id = state
        .karl
        .find_add_tagcategory(&body.name)
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: IdResponse { id: id.unseal() },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct NewTag {
    pub name: String,
    pub tagcategory_id: i64,
}

pub(super) async fn find_add_tag(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<NewTag>,
) -> Result<Json<ApiResponse<IdResponse>>, ApiError> {
    let id = state
        .karl
        .find_add_tag(&body.name, TagcategoryId::new(body.tagcategory_id))
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: IdResponse { id: id.unseal() },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct BindTagRequest {
    pub productclass_id: i64,
    pub tag_id: i64,
}

pub(super) async fn bind_tag(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<BindTagRequest>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    state
        .karl
        .bind_tag(ProductclassId::new(body.productclass_id), TagId::new(body.tag_id))
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: "bound",
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct SetParentRequest {
    pub parent_id: Option<i64>,
}

pub(super) async fn update_tag_set_parent(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<SetParentRequest>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    state
        .karl
        .update_tag_set_parent(TagId::new(id), body.parent_id.map(TagId::new))
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: "updated",
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct AbsorbTagRequest {
    pub src: i64,
    pub dst: i64,
}

pub(super) async fn absorb_tag(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<AbsorbTagRequest>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    state
        .karl
        .absorb_tag(TagId::new(body.src), TagId::new(body.dst))
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: "absorbed",
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn check_integrity(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    state
        .karl
        .check_integrity()
        .await
        .map_err(|e| map_facade_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: "consistent",
        meta: ResponseMeta::new(req_id.0),
    }))
}
