use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use warden_common::models::{AdmitFingerprint, AdmitMac, ClientClass, RateLimitMac, SharedNetwork};

use crate::handlers::ApiResult;
use crate::services::client_class::{self, ClientClassUpdate};
use crate::services::shared_network::{self, SharedNetworkUpdate};
use crate::services::admit;
use crate::AppState;

// --- client classes --------------------------------------------------------

pub async fn create_client_class(
    State(state): State<AppState>,
    Json(class): Json<ClientClass>,
) -> ApiResult<(StatusCode, Json<ClientClass>)> {
    Ok((
        StatusCode::CREATED,
        Json(client_class::create(&state, class).await?),
    ))
}

pub async fn get_client_class(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ClientClass>> {
    Ok(Json(client_class::get(&state, id).await?))
}

pub async fn list_client_classes(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ClientClass>>> {
    Ok(Json(client_class::list(&state).await?))
}

pub async fn update_client_class(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<ClientClassUpdate>,
) -> ApiResult<Json<ClientClass>> {
    Ok(Json(client_class::update(&state, id, update).await?))
}

pub async fn delete_client_class(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    client_class::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- shared networks -------------------------------------------------------

pub async fn create_shared_network(
    State(state): State<AppState>,
    Json(network): Json<SharedNetwork>,
) -> ApiResult<(StatusCode, Json<SharedNetwork>)> {
    Ok((
        StatusCode::CREATED,
        Json(shared_network::create(&state, network).await?),
    ))
}

pub async fn get_shared_network(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SharedNetwork>> {
    Ok(Json(shared_network::get(&state, id).await?))
}

pub async fn list_shared_networks(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<SharedNetwork>>> {
    Ok(Json(shared_network::list(&state).await?))
}

pub async fn update_shared_network(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<SharedNetworkUpdate>,
) -> ApiResult<Json<SharedNetwork>> {
    Ok(Json(shared_network::update(&state, id, update).await?))
}

pub async fn delete_shared_network(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    shared_network::delete(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- admission and rate limits ---------------------------------------------

pub async fn create_admit_mac(
    State(state): State<AppState>,
    Json(entry): Json<AdmitMac>,
) -> ApiResult<(StatusCode, Json<AdmitMac>)> {
    Ok((
        StatusCode::CREATED,
        Json(admit::create_admit_mac(&state, entry).await?),
    ))
}

pub async fn list_admit_macs(State(state): State<AppState>) -> ApiResult<Json<Vec<AdmitMac>>> {
    Ok(Json(admit::list_admit_macs(&state).await?))
}

pub async fn delete_admit_mac(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    admit::delete_admit_mac(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_admit_fingerprint(
    State(state): State<AppState>,
    Json(entry): Json<AdmitFingerprint>,
) -> ApiResult<(StatusCode, Json<AdmitFingerprint>)> {
    Ok((
        StatusCode::CREATED,
        Json(admit::create_admit_fingerprint(&state, entry).await?),
    ))
}

pub async fn list_admit_fingerprints(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<AdmitFingerprint>>> {
    Ok(Json(admit::list_admit_fingerprints(&state).await?))
}

pub async fn delete_admit_fingerprint(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    admit::delete_admit_fingerprint(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_rate_limit_mac(
    State(state): State<AppState>,
    Json(entry): Json<RateLimitMac>,
) -> ApiResult<(StatusCode, Json<RateLimitMac>)> {
    Ok((
        StatusCode::CREATED,
        Json(admit::create_rate_limit_mac(&state, entry).await?),
    ))
}

pub async fn list_rate_limit_macs(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<RateLimitMac>>> {
    Ok(Json(admit::list_rate_limit_macs(&state).await?))
}

pub async fn delete_rate_limit_mac(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    admit::delete_rate_limit_mac(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
