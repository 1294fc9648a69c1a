//! IPv4 subnet lifecycle.

use chrono::Utc;
use serde::Deserialize;
use std::net::Ipv4Addr;
use uuid::Uuid;

use warden_common::models::Subnet4;
use warden_common::{Error, Result};

use crate::agent::{AgentCommandKind, LeaseScope};
use crate::services::{notify, publish};
use crate::{conflict, db, AppState};

const ENTITY: &str = "subnet4";

/// Caller-settable fields on update. The prefix is immutable: changing it
/// would silently invalidate every child pool and reservation.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Subnet4Update {
    pub nodes: Option<Vec<String>>,
    pub valid_lifetime: Option<u32>,
    pub domain_servers: Option<Vec<Ipv4Addr>>,
    pub routers: Option<Vec<Ipv4Addr>>,
    pub client_class_whitelist: Option<Vec<String>>,
    pub client_class_blacklist: Option<Vec<String>>,
    pub relay_addresses: Option<Vec<Ipv4Addr>>,
    pub comment: Option<String>,
}

pub async fn create(state: &AppState, mut subnet: Subnet4) -> Result<Subnet4> {
    let op = "create";
    let id = subnet.id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    let siblings = db::list_subnets4(&mut tx)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    conflict::check_subnet4_overlap(&subnet.prefix, &siblings, None)
        .map_err(|reason| Error::conflict(ENTITY, &id, op, reason))?;
    check_client_classes(
        &mut tx,
        &subnet.client_class_whitelist,
        &subnet.client_class_blacklist,
    )
    .await
    .map_err(|e| Error::store(ENTITY, &id, op, e))?
    .map_err(|reason| Error::validation(ENTITY, &id, op, reason))?;

    subnet.subnet_id = db::next_subnet_id(&mut tx)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    subnet.capacity = 0;
    subnet.created_at = Utc::now();
    subnet.updated_at = subnet.created_at;

    db::insert_subnet4(&mut tx, &subnet)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    notify(state, &targets, AgentCommandKind::CreateSubnet4, &subnet)
        .await
        .map_err(|e| Error::agent(ENTITY, &id, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    publish(state, "subnet4_created", &id);
    Ok(subnet)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<Subnet4> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?;
    db::get_subnet4(&mut conn, id)
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?
        .ok_or_else(|| Error::not_found(ENTITY, id.to_string(), "get"))
}

pub async fn list(state: &AppState) -> Result<Vec<Subnet4>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))?;
    db::list_subnets4(&mut conn)
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))
}

pub async fn update(state: &AppState, id: Uuid, update: Subnet4Update) -> Result<Subnet4> {
    let op = "update";
    let id_str = id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let mut subnet = db::get_subnet4(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;

    if let Some(nodes) = update.nodes {
        subnet.nodes = nodes;
    }
    if let Some(lifetime) = update.valid_lifetime {
        subnet.valid_lifetime = lifetime;
    }
    if let Some(servers) = update.domain_servers {
        subnet.domain_servers = servers;
    }
    if let Some(routers) = update.routers {
        subnet.routers = routers;
    }
    if let Some(whitelist) = update.client_class_whitelist {
        subnet.client_class_whitelist = whitelist;
    }
    if let Some(blacklist) = update.client_class_blacklist {
        subnet.client_class_blacklist = blacklist;
    }
    if let Some(relays) = update.relay_addresses {
        subnet.relay_addresses = relays;
    }
    if update.comment.is_some() {
        subnet.comment = update.comment;
    }
    subnet.updated_at = Utc::now();

    check_client_classes(
        &mut tx,
        &subnet.client_class_whitelist,
        &subnet.client_class_blacklist,
    )
    .await
    .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
    .map_err(|reason| Error::validation(ENTITY, &id_str, op, reason))?;

    db::update_subnet4(&mut tx, &subnet)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    notify(state, &targets, AgentCommandKind::UpdateSubnet4, &subnet)
        .await
        .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "subnet4_updated", &id_str);
    Ok(subnet)
}

pub async fn delete(state: &AppState, id: Uuid) -> Result<()> {
    let op = "delete";
    let id_str = id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let subnet = db::get_subnet4(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;

    let networks = db::list_shared_networks(&mut tx)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    if let Some(network) = networks
        .iter()
        .find(|n| n.subnet_ids.contains(&subnet.subnet_id))
    {
        return Err(Error::in_use(
            ENTITY,
            &id_str,
            op,
            format!("referenced by shared network {}", network.name),
        ));
    }

    let targets = state.nodes.targets_for(&subnet.nodes);
    let leases = state
        .agents
        .lease_count(
            &targets,
            &LeaseScope::Subnet4 {
                subnet_id: subnet.subnet_id,
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

    db::delete_subnet4(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    notify(state, &targets, AgentCommandKind::DeleteSubnet4, &subnet)
        .await
        .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "subnet4_deleted", &id_str);
    Ok(())
}

/// Every referenced client class must exist.
pub(crate) async fn check_client_classes(
    conn: &mut sqlx::SqliteConnection,
    whitelist: &[String],
    blacklist: &[String],
) -> anyhow::Result<std::result::Result<(), String>> {
    for name in whitelist.iter().chain(blacklist.iter()) {
        if db::get_client_class_by_name(conn, name).await?.is_none() {
            return Ok(Err(format!("unknown client class {}", name)));
        }
    }
    Ok(Ok(()))
}
