//! IPv4 dynamic pools.

use chrono::Utc;
use uuid::Uuid;

use warden_common::models::Pool4;
use warden_common::{Error, Result};

use crate::agent::{AgentCommandKind, LeaseScope};
use crate::services::{notify, publish};
use crate::{conflict, db, ledger, AppState};

const ENTITY: &str = "pool4";

pub async fn create(state: &AppState, mut pool: Pool4) -> Result<Pool4> {
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
    let siblings = db::list_pools4(&mut tx, subnet.id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    conflict::check_pool4_overlap(&range, &siblings, None)
        .map_err(|reason| Error::conflict(ENTITY, &id, op, reason))?;

    pool.capacity = ledger::pool4_initial_capacity(&mut tx, &subnet, &range)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    pool.created_at = Utc::now();
    pool.updated_at = pool.created_at;

    db::insert_pool4(&mut tx, &pool)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    ledger::apply_pool4(&mut tx, &subnet, pool.capacity, true)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    notify(state, &targets, AgentCommandKind::CreatePool4, &pool)
        .await
        .map_err(|e| Error::agent(ENTITY, &id, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    publish(state, "pool4_created", &id);
    Ok(pool)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<Pool4> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?;
    db::get_pool4(&mut conn, id)
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?
        .ok_or_else(|| Error::not_found(ENTITY, id.to_string(), "get"))
}

pub async fn list(state: &AppState, subnet_id: Uuid) -> Result<Vec<Pool4>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))?;
    db::list_pools4(&mut conn, subnet_id)
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

    let pool = db::get_pool4(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;
    let subnet = db::get_subnet4(&mut tx, pool.subnet_id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found("subnet4", pool.subnet_id.to_string(), op))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    let leases = state
        .agents
        .lease_count(
            &targets,
            &LeaseScope::Pool4 {
                subnet_id: subnet.subnet_id,
                begin: pool.begin_address,
                end: pool.end_address,
            },
        )
        .await
        .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;
    if leases > 0 {
        return Err(Error::in_use(
            ENTITY,
            &id_str,
            op,
            format!("{} live leases", leases),
        ));
    }

    ledger::apply_pool4(&mut tx, &subnet, pool.capacity, false)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    db::delete_pool4(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    notify(state, &targets, AgentCommandKind::DeletePool4, &pool)
        .await
        .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "pool4_deleted", &id_str);
    Ok(())
}
