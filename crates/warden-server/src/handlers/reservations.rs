use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use warden_common::models::{Reservation4, Reservation6};

use crate::handlers::ApiResult;
use crate::services::{reservation4, reservation6};
use crate::AppState;

pub async fn create_reservation4(
    State(state): State<AppState>,
    Json(reservation): Json<Reservation4>,
) -> ApiResult<(StatusCode, Json<Reservation4>)> {
    Ok((
        StatusCode::CREATED,
        Json(reservation4::create(&state, reservation).await?),
    ))
}

pub async fn batch_create_reservations4(
    State(state): State<AppState>,
    Json(reservations): Json<Vec<Reservation4>>,
) -> ApiResult<(StatusCode, Json<Vec<Reservation4>>)> {
    Ok((
        StatusCode::CREATED,
        Json(reservation4::batch_create(&state, reservations).await?),
    ))
}

pub async fn get_reservation4(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Reservation4>> {
    Ok(Json(reservation4::get(&state, id).await?))
}

pub async fn list_reservations4(
    State(state): State<AppState>,
    Path(subnet_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Reservation4>>> {
    Ok(Json(reservation4::list(&state, subnet_id).await?))
}

pub async fn delete_reservation4(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    reservation4::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_reservation6(
    State(state): State<AppState>,
    Json(reservation): Json<Reservation6>,
) -> ApiResult<(StatusCode, Json<Reservation6>)> {
    Ok((
        StatusCode::CREATED,
        Json(reservation6::create(&state, reservation).await?),
    ))
}

pub async fn batch_create_reservations6(
    State(state): State<AppState>,
    Json(reservations): Json<Vec<Reservation6>>,
) -> ApiResult<(StatusCode, Json<Vec<Reservation6>>)> {
    Ok((
        StatusCode::CREATED,
        Json(reservation6::batch_create(&state, reservations).await?),
    ))
}

pub async fn get_reservation6(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Reservation6>> {
    Ok(Json(reservation6::get(&state, id).await?))
}

pub async fn list_reservations6(
    State(state): State<AppState>,
    Path(subnet_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Reservation6>>> {
    Ok(Json(reservation6::list(&state, subnet_id).await?))
}

pub async fn delete_reservation6(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    reservation6::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
