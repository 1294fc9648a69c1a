use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use warden_common::models::{PdPool, Pool4, Pool6, ReservedPdPool, ReservedPool4, ReservedPool6};

use crate::handlers::ApiResult;
use crate::services::{pd_pool, pool4, pool6, reserved_pd_pool, reserved_pool4, reserved_pool6};
use crate::AppState;

// --- IPv4 pools ------------------------------------------------------------

pub async fn create_pool4(
    State(state): State<AppState>,
    Json(pool): Json<Pool4>,
) -> ApiResult<(StatusCode, Json<Pool4>)> {
    Ok((StatusCode::CREATED, Json(pool4::create(&state, pool).await?)))
}

pub async fn get_pool4(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Pool4>> {
    Ok(Json(pool4::get(&state, id).await?))
}

pub async fn list_pools4(
    State(state): State<AppState>,
    Path(subnet_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Pool4>>> {
    Ok(Json(pool4::list(&state, subnet_id).await?))
}

pub async fn delete_pool4(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    pool4::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_reserved_pool4(
    State(state): State<AppState>,
    Json(pool): Json<ReservedPool4>,
) -> ApiResult<(StatusCode, Json<ReservedPool4>)> {
    Ok((
        StatusCode::CREATED,
        Json(reserved_pool4::create(&state, pool).await?),
    ))
}

pub async fn get_reserved_pool4(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReservedPool4>> {
    Ok(Json(reserved_pool4::get(&state, id).await?))
}

pub async fn list_reserved_pools4(
    State(state): State<AppState>,
    Path(subnet_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ReservedPool4>>> {
    Ok(Json(reserved_pool4::list(&state, subnet_id).await?))
}

pub async fn delete_reserved_pool4(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    reserved_pool4::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- IPv6 pools ------------------------------------------------------------

pub async fn create_pool6(
    State(state): State<AppState>,
    Json(pool): Json<Pool6>,
) -> ApiResult<(StatusCode, Json<Pool6>)> {
    Ok((StatusCode::CREATED, Json(pool6::create(&state, pool).await?)))
}

pub async fn get_pool6(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Pool6>> {
    Ok(Json(pool6::get(&state, id).await?))
}

pub async fn list_pools6(
    State(state): State<AppState>,
    Path(subnet_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Pool6>>> {
    Ok(Json(pool6::list(&state, subnet_id).await?))
}

pub async fn delete_pool6(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    pool6::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_reserved_pool6(
    State(state): State<AppState>,
    Json(pool): Json<ReservedPool6>,
) -> ApiResult<(StatusCode, Json<ReservedPool6>)> {
    Ok((
        StatusCode::CREATED,
        Json(reserved_pool6::create(&state, pool).await?),
    ))
}

pub async fn get_reserved_pool6(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReservedPool6>> {
    Ok(Json(reserved_pool6::get(&state, id).await?))
}

pub async fn list_reserved_pools6(
    State(state): State<AppState>,
    Path(subnet_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ReservedPool6>>> {
    Ok(Json(reserved_pool6::list(&state, subnet_id).await?))
}

pub async fn delete_reserved_pool6(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    reserved_pool6::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- pd-pools --------------------------------------------------------------

pub async fn create_pd_pool(
    State(state): State<AppState>,
    Json(pool): Json<PdPool>,
) -> ApiResult<(StatusCode, Json<PdPool>)> {
    Ok((
        StatusCode::CREATED,
        Json(pd_pool::create(&state, pool).await?),
    ))
}

pub async fn get_pd_pool(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PdPool>> {
    Ok(Json(pd_pool::get(&state, id).await?))
}

pub async fn list_pd_pools(
    State(state): State<AppState>,
    Path(subnet_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PdPool>>> {
    Ok(Json(pd_pool::list(&state, subnet_id).await?))
}

pub async fn delete_pd_pool(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    pd_pool::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_reserved_pd_pool(
    State(state): State<AppState>,
    Json(pool): Json<ReservedPdPool>,
) -> ApiResult<(StatusCode, Json<ReservedPdPool>)> {
    Ok((
        StatusCode::CREATED,
        Json(reserved_pd_pool::create(&state, pool).await?),
    ))
}

pub async fn get_reserved_pd_pool(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReservedPdPool>> {
    Ok(Json(reserved_pd_pool::get(&state, id).await?))
}

pub async fn list_reserved_pd_pools(
    State(state): State<AppState>,
    Path(subnet_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ReservedPdPool>>> {
    Ok(Json(reserved_pd_pool::list(&state, subnet_id).await?))
}

pub async fn delete_reserved_pd_pool(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    reserved_pd_pool::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
