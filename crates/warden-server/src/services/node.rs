//! Agent node registration. Nodes self-register on startup; the in-memory
//! registry serves dispatch target resolution and is kept in step with the
//! persisted table.

use warden_common::models::Node;
use warden_common::{Error, Result};

use crate::services::publish;
use crate::{db, AppState};

const ENTITY: &str = "node";

pub async fn register(state: &AppState, node: Node) -> Result<Node> {
    let op = "register";
    if node.id.trim().is_empty() {
        return Err(Error::validation(ENTITY, "?", op, "node id is required"));
    }
    if node.endpoint.trim().is_empty() {
        return Err(Error::validation(ENTITY, &node.id, op, "endpoint is required"));
    }

    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, &node.id, op, e))?;
    db::upsert_node(&mut conn, &node)
        .await
        .map_err(|e| Error::store(ENTITY, &node.id, op, e))?;
    state.nodes.upsert(node.clone());
    publish(state, "node_registered", &node.id);
    Ok(node)
}

pub async fn list(state: &AppState) -> Result<Vec<Node>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))?;
    db::list_nodes(&mut conn)
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))
}

pub async fn deregister(state: &AppState, id: &str) -> Result<()> {
    let op = "deregister";
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, id, op, e))?;

    // Refuse while any subnet still routes commands through this node.
    let assigned4 = db::list_subnets4(&mut conn)
        .await
        .map_err(|e| Error::store(ENTITY, id, op, e))?
        .into_iter()
        .any(|s| s.nodes.iter().any(|n| n == id));
    let assigned6 = db::list_subnets6(&mut conn)
        .await
        .map_err(|e| Error::store(ENTITY, id, op, e))?
        .into_iter()
        .any(|s| s.nodes.iter().any(|n| n == id));
    if assigned4 || assigned6 {
        return Err(Error::in_use(ENTITY, id, op, "still assigned to subnets"));
    }

    db::delete_node(&mut conn, id)
        .await
        .map_err(|e| Error::store(ENTITY, id, op, e))?;
    state.nodes.remove(id);
    publish(state, "node_deregistered", id);
    Ok(())
}
