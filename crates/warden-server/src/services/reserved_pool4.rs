//! IPv4 reserved ranges: carved out of the dynamic address space, disjoint
//! from other reserved ranges and from reservations.

use chrono::Utc;
use uuid::Uuid;

use warden_common::models::ReservedPool4;
use warden_common::{Error, Result};

use crate::agent::AgentCommandKind;
use crate::services::{notify, publish};
use crate::{conflict, db, ledger, AppState};

const ENTITY: &str = "reserved_pool4";

pub async fn create(state: &AppState, mut pool: ReservedPool4) -> Result<ReservedPool4> {
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

    let subnet = db::get_subnet4(&mut tx, pool.subnet_id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?
        .ok_or_else(|| {
            Error::validation(ENTITY, &id, op, format!("unknown subnet {}", pool.subnet_id))
        })?;

    conflict::range4_within_subnet(&range, &subnet.prefix)
        .map_err(|reason| Error::validation(ENTITY, &id, op, reason))?;
    let siblings = db::list_reserved_pools4(&mut tx, subnet.id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    conflict::check_reserved_pool4_overlap(&range, &siblings, None)
        .map_err(|reason| Error::conflict(ENTITY, &id, op, reason))?;
    let reservations = db::list_reservations4(&mut tx, subnet.id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    conflict::check_reserved4_vs_reservations(&range, &reservations)
        .map_err(|reason| Error::conflict(ENTITY, &id, op, reason))?;

    // A charge the subnet cannot cover would clamp at zero and desync the
    // counters from the later delete; refuse it instead.
    let charge = ledger::reserved_pool4_charge(&mut tx, &subnet, &range)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    if charge > subnet.capacity {
        return Err(Error::validation(
            ENTITY,
            &id,
            op,
            format!(
                "reserved range removes {} addresses but the subnet has {} left",
                charge, subnet.capacity
            ),
        ));
    }

    ledger::apply_reserved_pool4(&mut tx, &subnet, &range, true)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    pool.created_at = Utc::now();
    pool.updated_at = pool.created_at;
    db::insert_reserved_pool4(&mut tx, &pool)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    notify(state, &targets, AgentCommandKind::CreateReservedPool4, &pool)
        .await
        .map_err(|e| Error::agent(ENTITY, &id, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    publish(state, "reserved_pool4_created", &id);
    Ok(pool)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<ReservedPool4> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?;
    db::get_reserved_pool4(&mut conn, id)
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?
        .ok_or_else(|| Error::not_found(ENTITY, id.to_string(), "get"))
}

pub async fn list(state: &AppState, subnet_id: Uuid) -> Result<Vec<ReservedPool4>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))?;
    db::list_reserved_pools4(&mut conn, subnet_id)
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

    let pool = db::get_reserved_pool4(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;
    let subnet = db::get_subnet4(&mut tx, pool.subnet_id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found("subnet4", pool.subnet_id.to_string(), op))?;
    let range = pool
        .range()
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    ledger::apply_reserved_pool4(&mut tx, &subnet, &range, false)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    db::delete_reserved_pool4(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    notify(state, &targets, AgentCommandKind::DeleteReservedPool4, &pool)
        .await
        .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "reserved_pool4_deleted", &id_str);
    Ok(())
}
