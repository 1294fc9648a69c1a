//! IPv6 subnet lifecycle. EUI64 subnets carry unbounded capacity and refuse
//! reservations and pd-pools; the flag is immutable after creation.

use chrono::Utc;
use serde::Deserialize;
use std::net::Ipv6Addr;
use uuid::Uuid;

use warden_common::models::Subnet6;
use warden_common::{Capacity, Error, Result};

use crate::agent::{AgentCommandKind, LeaseScope};
use crate::services::subnet4::check_client_classes;
use crate::services::{notify, publish};
use crate::{conflict, db, AppState};

const ENTITY: &str = "subnet6";

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Subnet6Update {
    pub nodes: Option<Vec<String>>,
    pub valid_lifetime: Option<u32>,
    pub domain_servers: Option<Vec<Ipv6Addr>>,
    pub client_class_whitelist: Option<Vec<String>>,
    pub client_class_blacklist: Option<Vec<String>>,
    pub relay_addresses: Option<Vec<Ipv6Addr>>,
    pub comment: Option<String>,
}

pub async fn create(state: &AppState, mut subnet: Subnet6) -> Result<Subnet6> {
    let op = "create";
    let id = subnet.id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    let siblings = db::list_subnets6(&mut tx)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    conflict::check_subnet6_overlap(&subnet.prefix, &siblings, None)
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
    subnet.capacity = if subnet.use_eui64 {
        Capacity::Unbounded
    } else {
        Capacity::ZERO
    };
    subnet.created_at = Utc::now();
    subnet.updated_at = subnet.created_at;

    db::insert_subnet6(&mut tx, &subnet)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    notify(state, &targets, AgentCommandKind::CreateSubnet6, &subnet)
        .await
        .map_err(|e| Error::agent(ENTITY, &id, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    publish(state, "subnet6_created", &id);
    Ok(subnet)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<Subnet6> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?;
    db::get_subnet6(&mut conn, id)
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?
        .ok_or_else(|| Error::not_found(ENTITY, id.to_string(), "get"))
}

pub async fn list(state: &AppState) -> Result<Vec<Subnet6>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))?;
    db::list_subnets6(&mut conn)
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))
}

pub async fn update(state: &AppState, id: Uuid, update: Subnet6Update) -> Result<Subnet6> {
    let op = "update";
    let id_str = id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let mut subnet = db::get_subnet6(&mut tx, id)
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

    db::update_subnet6(&mut tx, &subnet)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    notify(state, &targets, AgentCommandKind::UpdateSubnet6, &subnet)
        .await
        .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "subnet6_updated", &id_str);
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

    let subnet = db::get_subnet6(&mut tx, id)
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
            &LeaseScope::Subnet6 {
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

    db::delete_subnet6(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    notify(state, &targets, AgentCommandKind::DeleteSubnet6, &subnet)
        .await
        .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "subnet6_deleted", &id_str);
    Ok(())
}
