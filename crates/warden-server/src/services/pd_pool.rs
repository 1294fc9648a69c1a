//! IPv6 delegated-prefix pools.

use chrono::Utc;
use uuid::Uuid;

use warden_common::models::PdPool;
use warden_common::{Error, Result};

use crate::agent::{AgentCommandKind, LeaseScope};
use crate::services::{notify, publish};
use crate::{conflict, db, ledger, AppState};

const ENTITY: &str = "pd_pool";

pub async fn create(state: &AppState, mut pool: PdPool) -> Result<PdPool> {
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
    if subnet.use_eui64 {
        return Err(Error::validation(
            ENTITY,
            &id,
            op,
            "subnet uses EUI64 autoconfiguration",
        ));
    }

    conflict::pd_range_within_subnet(&range, &subnet.prefix)
        .map_err(|reason| Error::validation(ENTITY, &id, op, reason))?;
    let siblings = db::list_pd_pools(&mut tx, subnet.id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    conflict::check_pd_pool_overlap(&range, &siblings, None)
        .map_err(|reason| Error::conflict(ENTITY, &id, op, reason))?;

    pool.capacity = ledger::pd_pool_initial_capacity(&mut tx, &subnet, &range)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    pool.created_at = Utc::now();
    pool.updated_at = pool.created_at;

    db::insert_pd_pool(&mut tx, &pool)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    ledger::apply_pd_pool(&mut tx, &subnet, pool.capacity, true)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    notify(state, &targets, AgentCommandKind::CreatePdPool, &pool)
        .await
        .map_err(|e| Error::agent(ENTITY, &id, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    publish(state, "pd_pool_created", &id);
    Ok(pool)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<PdPool> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?;
    db::get_pd_pool(&mut conn, id)
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?
        .ok_or_else(|| Error::not_found(ENTITY, id.to_string(), "get"))
}

pub async fn list(state: &AppState, subnet_id: Uuid) -> Result<Vec<PdPool>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))?;
    db::list_pd_pools(&mut conn, subnet_id)
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

    let pool = db::get_pd_pool(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;
    let subnet = db::get_subnet6(&mut tx, pool.subnet_id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found("subnet6", pool.subnet_id.to_string(), op))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    let leases = state
        .agents
        .lease_count(
            &targets,
            &LeaseScope::PdPool {
                subnet_id: subnet.subnet_id,
                prefix: pool.prefix,
            },
        )
        .await
        .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;
    if leases > 0 {
        return Err(Error::in_use(
            ENTITY,
            &id_str,
            op,
            format!("{} live delegations", leases),
        ));
    }

    ledger::apply_pd_pool(&mut tx, &subnet, pool.capacity, false)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    db::delete_pd_pool(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    notify(state, &targets, AgentCommandKind::DeletePdPool, &pool)
        .await
        .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "pd_pool_deleted", &id_str);
    Ok(())
}
