//! Client classes: named option filters referenced by subnets. The name is
//! immutable (subnets reference classes by name) and a referenced class
//! cannot be deleted.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use warden_common::models::{ClientClass, MatchRule};
use warden_common::{Error, Result};

use crate::agent::AgentCommandKind;
use crate::services::{notify, publish};
use crate::{db, AppState};

const ENTITY: &str = "client_class";

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ClientClassUpdate {
    pub option_code: Option<u16>,
    pub rule: Option<MatchRule>,
    pub comment: Option<String>,
}

pub async fn create(state: &AppState, mut class: ClientClass) -> Result<ClientClass> {
    let op = "create";
    let id = class.id.to_string();

    if class.name.trim().is_empty() {
        return Err(Error::validation(ENTITY, &id, op, "name is required"));
    }

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    if db::get_client_class_by_name(&mut tx, &class.name)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?
        .is_some()
    {
        return Err(Error::conflict(
            ENTITY,
            &id,
            op,
            format!("name {} already exists", class.name),
        ));
    }

    class.created_at = Utc::now();
    class.updated_at = class.created_at;
    db::insert_client_class(&mut tx, &class)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    let targets = state.nodes.dual_stack_targets();
    notify(state, &targets, AgentCommandKind::CreateClientClass, &class)
        .await
        .map_err(|e| Error::agent(ENTITY, &id, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    publish(state, "client_class_created", &id);
    Ok(class)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<ClientClass> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?;
    db::get_client_class(&mut conn, id)
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?
        .ok_or_else(|| Error::not_found(ENTITY, id.to_string(), "get"))
}

pub async fn list(state: &AppState) -> Result<Vec<ClientClass>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))?;
    db::list_client_classes(&mut conn)
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))
}

pub async fn update(state: &AppState, id: Uuid, update: ClientClassUpdate) -> Result<ClientClass> {
    let op = "update";
    let id_str = id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let mut class = db::get_client_class(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;

    if let Some(code) = update.option_code {
        class.option_code = code;
    }
    if let Some(rule) = update.rule {
        class.rule = rule;
    }
    if update.comment.is_some() {
        class.comment = update.comment;
    }
    class.updated_at = Utc::now();

    db::update_client_class(&mut tx, &class)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let targets = state.nodes.dual_stack_targets();
    notify(state, &targets, AgentCommandKind::UpdateClientClass, &class)
        .await
        .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "client_class_updated", &id_str);
    Ok(class)
}

pub async fn delete(state: &AppState, id: Uuid) -> Result<()> {
    let op = "delete";
    let id_str = id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let class = db::get_client_class(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;

    let referenced4 = db::list_subnets4(&mut tx)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .into_iter()
        .find(|s| {
            s.client_class_whitelist.contains(&class.name)
                || s.client_class_blacklist.contains(&class.name)
        });
    if let Some(subnet) = referenced4 {
        return Err(Error::in_use(
            ENTITY,
            &id_str,
            op,
            format!("referenced by subnet4 {}", subnet.subnet_id),
        ));
    }
    let referenced6 = db::list_subnets6(&mut tx)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .into_iter()
        .find(|s| {
            s.client_class_whitelist.contains(&class.name)
                || s.client_class_blacklist.contains(&class.name)
        });
    if let Some(subnet) = referenced6 {
        return Err(Error::in_use(
            ENTITY,
            &id_str,
            op,
            format!("referenced by subnet6 {}", subnet.subnet_id),
        ));
    }

    db::delete_client_class(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    let targets = state.nodes.dual_stack_targets();
    notify(state, &targets, AgentCommandKind::DeleteClientClass, &class)
        .await
        .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "client_class_deleted", &id_str);
    Ok(())
}
