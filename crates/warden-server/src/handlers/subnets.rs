use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use warden_common::models::{Subnet4, Subnet6};

use crate::handlers::{ApiResult, ApiError};
use crate::services::subnet4::{self, Subnet4Update};
use crate::services::subnet6::{self, Subnet6Update};
use crate::AppState;

pub async fn create_subnet4(
    State(state): State<AppState>,
    Json(subnet): Json<Subnet4>,
) -> ApiResult<(StatusCode, Json<Subnet4>)> {
    let created = subnet4::create(&state, subnet).await.map_err(ApiError)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_subnets4(State(state): State<AppState>) -> ApiResult<Json<Vec<Subnet4>>> {
    Ok(Json(subnet4::list(&state).await?))
}

pub async fn get_subnet4(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Subnet4>> {
    Ok(Json(subnet4::get(&state, id).await?))
}

pub async fn update_subnet4(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<Subnet4Update>,
) -> ApiResult<Json<Subnet4>> {
    Ok(Json(subnet4::update(&state, id, update).await?))
}

pub async fn delete_subnet4(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    subnet4::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_subnet6(
    State(state): State<AppState>,
    Json(subnet): Json<Subnet6>,
) -> ApiResult<(StatusCode, Json<Subnet6>)> {
    let created = subnet6::create(&state, subnet).await.map_err(ApiError)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_subnets6(State(state): State<AppState>) -> ApiResult<Json<Vec<Subnet6>>> {
    Ok(Json(subnet6::list(&state).await?))
}

pub async fn get_subnet6(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Subnet6>> {
    Ok(Json(subnet6::get(&state, id).await?))
}

pub async fn update_subnet6(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<Subnet6Update>,
) -> ApiResult<Json<Subnet6>> {
    Ok(Json(subnet6::update(&state, id, update).await?))
}

pub async fn delete_subnet6(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    subnet6::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
