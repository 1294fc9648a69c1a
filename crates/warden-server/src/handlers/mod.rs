//! REST surface under /api/v1. Handlers are thin: deserialize, call the
//! service, map the domain error onto a status code and a JSON body.

mod events;
mod policies;
mod pools;
mod reservations;
mod subnets;
#[cfg(test)]
mod tests;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Serialize;

use warden_common::ErrorKind;

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_router())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        // IPv4 subnets and children
        .route("/subnets4", post(subnets::create_subnet4).get(subnets::list_subnets4))
        .route(
            "/subnets4/:id",
            get(subnets::get_subnet4)
                .put(subnets::update_subnet4)
                .delete(subnets::delete_subnet4),
        )
        .route("/subnets4/:id/pools", get(pools::list_pools4))
        .route("/subnets4/:id/reserved-pools", get(pools::list_reserved_pools4))
        .route("/subnets4/:id/reservations", get(reservations::list_reservations4))
        .route("/pools4", post(pools::create_pool4))
        .route("/pools4/:id", get(pools::get_pool4).delete(pools::delete_pool4))
        .route("/reserved-pools4", post(pools::create_reserved_pool4))
        .route(
            "/reserved-pools4/:id",
            get(pools::get_reserved_pool4).delete(pools::delete_reserved_pool4),
        )
        .route("/reservations4", post(reservations::create_reservation4))
        .route("/reservations4/batch", post(reservations::batch_create_reservations4))
        .route(
            "/reservations4/:id",
            get(reservations::get_reservation4).delete(reservations::delete_reservation4),
        )
        // IPv6 subnets and children
        .route("/subnets6", post(subnets::create_subnet6).get(subnets::list_subnets6))
        .route(
            "/subnets6/:id",
            get(subnets::get_subnet6)
                .put(subnets::update_subnet6)
                .delete(subnets::delete_subnet6),
        )
        .route("/subnets6/:id/pools", get(pools::list_pools6))
        .route("/subnets6/:id/reserved-pools", get(pools::list_reserved_pools6))
        .route("/subnets6/:id/pd-pools", get(pools::list_pd_pools))
        .route("/subnets6/:id/reserved-pd-pools", get(pools::list_reserved_pd_pools))
        .route("/subnets6/:id/reservations", get(reservations::list_reservations6))
        .route("/pools6", post(pools::create_pool6))
        .route("/pools6/:id", get(pools::get_pool6).delete(pools::delete_pool6))
        .route("/reserved-pools6", post(pools::create_reserved_pool6))
        .route(
            "/reserved-pools6/:id",
            get(pools::get_reserved_pool6).delete(pools::delete_reserved_pool6),
        )
        .route("/pd-pools", post(pools::create_pd_pool))
        .route("/pd-pools/:id", get(pools::get_pd_pool).delete(pools::delete_pd_pool))
        .route("/reserved-pd-pools", post(pools::create_reserved_pd_pool))
        .route(
            "/reserved-pd-pools/:id",
            get(pools::get_reserved_pd_pool).delete(pools::delete_reserved_pd_pool),
        )
        .route("/reservations6", post(reservations::create_reservation6))
        .route("/reservations6/batch", post(reservations::batch_create_reservations6))
        .route(
            "/reservations6/:id",
            get(reservations::get_reservation6).delete(reservations::delete_reservation6),
        )
        // policies
        .route(
            "/client-classes",
            post(policies::create_client_class).get(policies::list_client_classes),
        )
        .route(
            "/client-classes/:id",
            get(policies::get_client_class)
                .put(policies::update_client_class)
                .delete(policies::delete_client_class),
        )
        .route(
            "/shared-networks",
            post(policies::create_shared_network).get(policies::list_shared_networks),
        )
        .route(
            "/shared-networks/:id",
            get(policies::get_shared_network)
                .put(policies::update_shared_network)
                .delete(policies::delete_shared_network),
        )
        .route("/admit/macs", post(policies::create_admit_mac).get(policies::list_admit_macs))
        .route("/admit/macs/:id", delete(policies::delete_admit_mac))
        .route(
            "/admit/fingerprints",
            post(policies::create_admit_fingerprint).get(policies::list_admit_fingerprints),
        )
        .route("/admit/fingerprints/:id", delete(policies::delete_admit_fingerprint))
        .route(
            "/rate-limits",
            post(policies::create_rate_limit_mac).get(policies::list_rate_limit_macs),
        )
        .route("/rate-limits/:id", delete(policies::delete_rate_limit_mac))
        // nodes and events
        .route("/nodes", post(events::register_node).get(events::list_nodes))
        .route("/nodes/:id", delete(events::deregister_node))
        .route("/events", get(events::subscribe))
        .route("/health", get(events::health))
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Domain error adapted to the wire.
pub struct ApiError(pub warden_common::Error);

impl From<warden_common::Error> for ApiError {
    fn from(err: warden_common::Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, label) = match self.0.kind {
            ErrorKind::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            ErrorKind::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ErrorKind::InUse(_) => (StatusCode::CONFLICT, "in_use"),
            ErrorKind::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store"),
            ErrorKind::Agent(_) => (StatusCode::BAD_GATEWAY, "agent"),
        };
        let body = ErrorResponse {
            error: label.to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
