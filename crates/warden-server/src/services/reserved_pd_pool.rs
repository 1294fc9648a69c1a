//! Reserved delegation ranges carved out of pd-pools.

use chrono::Utc;
use uuid::Uuid;

use warden_common::models::ReservedPdPool;
use warden_common::{Error, Result};

use crate::agent::AgentCommandKind;
use crate::services::{notify, publish};
use crate::{conflict, db, ledger, AppState};

const ENTITY: &str = "reserved_pd_pool";

pub async fn create(state: &AppState, mut pool: ReservedPdPool) -> Result<ReservedPdPool> {
    let op = "create";
    let id = pool.id.to_string();

    let range = pool
        .range()
        .map_err(|e| Error::validation(ENTITY, &id, op, e.to_string()))?;

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    let subnet = db::get_subnet6(&mut tx, pool.subnet_id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?
        .ok_or_else(|| {
            Error::validation(ENTITY, &id, op, format!("unknown subnet {}", pool.subnet_id))
        })?;

    conflict::pd_range_within_subnet(&range, &subnet.prefix)
        .map_err(|reason| Error::validation(ENTITY, &id, op, reason))?;
    let siblings = db::list_reserved_pd_pools(&mut tx, subnet.id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    conflict::check_reserved_pd_pool_overlap(&range, &siblings, None)
        .map_err(|reason| Error::conflict(ENTITY, &id, op, reason))?;
    let reservations = db::list_reservations6(&mut tx, subnet.id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    conflict::check_reserved_pd_vs_reservations(&range, &reservations)
        .map_err(|reason| Error::conflict(ENTITY, &id, op, reason))?;

    // A charge the subnet cannot cover would clamp at zero and desync the
    // counters from the later delete; refuse it instead.
    let charge = ledger::reserved_pd_pool_charge(&mut tx, &subnet, &range)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    if charge.exceeds(&subnet.capacity) {
        return Err(Error::validation(
            ENTITY,
            &id,
            op,
            format!(
                "reserved range removes {} delegations but the subnet has {} left",
                charge, subnet.capacity
            ),
        ));
    }

    ledger::apply_reserved_pd_pool(&mut tx, &subnet, &range, true)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    pool.created_at = Utc::now();
    pool.updated_at = pool.created_at;
    db::insert_reserved_pd_pool(&mut tx, &pool)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    notify(state, &targets, AgentCommandKind::CreateReservedPdPool, &pool)
        .await
        .map_err(|e| Error::agent(ENTITY, &id, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    publish(state, "reserved_pd_pool_created", &id);
    Ok(pool)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<ReservedPdPool> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?;
    db::get_reserved_pd_pool(&mut conn, id)
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?
        .ok_or_else(|| Error::not_found(ENTITY, id.to_string(), "get"))
}

pub async fn list(state: &AppState, subnet_id: Uuid) -> Result<Vec<ReservedPdPool>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))?;
    db::list_reserved_pd_pools(&mut conn, subnet_id)
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))
}

pub async fn delete(state: &AppState, id: Uuid) -> Result<()> {
    let op = "delete";
    let id_str = id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let pool = db::get_reserved_pd_pool(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;
    let subnet = db::get_subnet6(&mut tx, pool.subnet_id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found("subnet6", pool.subnet_id.to_string(), op))?;
    let range = pool
        .range()
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    ledger::apply_reserved_pd_pool(&mut tx, &subnet, &range, false)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    db::delete_reserved_pd_pool(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    notify(state, &targets, AgentCommandKind::DeleteReservedPdPool, &pool)
        .await
        .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "reserved_pd_pool_deleted", &id_str);
    Ok(())
}
