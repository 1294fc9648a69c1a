//! Shared networks: named groupings of numeric subnet ids. Management-plane
//! only; agents learn grouping through the subnets themselves, so no command
//! is dispatched here.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use warden_common::models::SharedNetwork;
use warden_common::{Error, Result};

use crate::services::publish;
use crate::{db, AppState};

const ENTITY: &str = "shared_network";

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SharedNetworkUpdate {
    pub subnet_ids: Option<Vec<u64>>,
    pub comment: Option<String>,
}

/// Every referenced subnet id must exist in either family.
async fn check_subnet_ids(
    conn: &mut sqlx::SqliteConnection,
    subnet_ids: &[u64],
) -> anyhow::Result<std::result::Result<(), String>> {
    let known4: Vec<u64> = db::list_subnets4(conn)
        .await?
        .into_iter()
        .map(|s| s.subnet_id)
        .collect();
    let known6: Vec<u64> = db::list_subnets6(conn)
        .await?
        .into_iter()
        .map(|s| s.subnet_id)
        .collect();
    for id in subnet_ids {
        if !known4.contains(id) && !known6.contains(id) {
            return Ok(Err(format!("unknown subnet id {}", id)));
        }
    }
    Ok(Ok(()))
}

pub async fn create(state: &AppState, mut network: SharedNetwork) -> Result<SharedNetwork> {
    let op = "create";
    let id = network.id.to_string();

    if network.name.trim().is_empty() {
        return Err(Error::validation(ENTITY, &id, op, "name is required"));
    }

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    check_subnet_ids(&mut tx, &network.subnet_ids)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?
        .map_err(|reason| Error::validation(ENTITY, &id, op, reason))?;

    network.created_at = Utc::now();
    network.updated_at = network.created_at;
    db::insert_shared_network(&mut tx, &network)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    publish(state, "shared_network_created", &id);
    Ok(network)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<SharedNetwork> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?;
    db::get_shared_network(&mut conn, id)
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?
        .ok_or_else(|| Error::not_found(ENTITY, id.to_string(), "get"))
}

pub async fn list(state: &AppState) -> Result<Vec<SharedNetwork>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))?;
    db::list_shared_networks(&mut conn)
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))
}

pub async fn update(
    state: &AppState,
    id: Uuid,
    update: SharedNetworkUpdate,
) -> Result<SharedNetwork> {
    let op = "update";
    let id_str = id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let mut network = db::get_shared_network(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;

    if let Some(subnet_ids) = update.subnet_ids {
        network.subnet_ids = subnet_ids;
    }
    if update.comment.is_some() {
        network.comment = update.comment;
    }
    network.updated_at = Utc::now();

    check_subnet_ids(&mut tx, &network.subnet_ids)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .map_err(|reason| Error::validation(ENTITY, &id_str, op, reason))?;

    db::update_shared_network(&mut tx, &network)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "shared_network_updated", &id_str);
    Ok(network)
}

pub async fn delete(state: &AppState, id: Uuid) -> Result<()> {
    let op = "delete";
    let id_str = id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    db::get_shared_network(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;
    db::delete_shared_network(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "shared_network_deleted", &id_str);
    Ok(())
}
