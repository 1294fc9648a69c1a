//! Global admission and rate-limit policy lists. Every mutation pushes the
//! full refreshed list to the union of sentry and server nodes across both
//! address families, since these lists are not subnet-scoped. The push runs
//! on the open transaction's view so a dispatch failure rolls the row back.

use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use warden_common::models::{AdmitFingerprint, AdmitMac, RateLimitMac};
use warden_common::{Error, Result};

use crate::agent::AgentCommandKind;
use crate::services::{notify, publish};
use crate::{db, AppState};

async fn push_admit_list(
    state: &AppState,
    conn: &mut SqliteConnection,
    entity: &'static str,
    id: &str,
    op: &'static str,
) -> Result<()> {
    let macs = db::list_admit_macs(conn)
        .await
        .map_err(|e| Error::store(entity, id, op, e))?;
    let fingerprints = db::list_admit_fingerprints(conn)
        .await
        .map_err(|e| Error::store(entity, id, op, e))?;
    let body = serde_json::json!({
        "macs": macs,
        "fingerprints": fingerprints,
    });
    let targets = state.nodes.dual_stack_targets();
    notify(state, &targets, AgentCommandKind::UpdateAdmitList, &body)
        .await
        .map_err(|e| Error::agent(entity, id, op, e))
}

async fn push_rate_limit_list(
    state: &AppState,
    conn: &mut SqliteConnection,
    entity: &'static str,
    id: &str,
    op: &'static str,
) -> Result<()> {
    let limits = db::list_rate_limit_macs(conn)
        .await
        .map_err(|e| Error::store(entity, id, op, e))?;
    let body = serde_json::json!({ "rate_limits": limits });
    let targets = state.nodes.dual_stack_targets();
    notify(state, &targets, AgentCommandKind::UpdateRateLimitList, &body)
        .await
        .map_err(|e| Error::agent(entity, id, op, e))
}

// --- MAC admission ---------------------------------------------------------

pub async fn create_admit_mac(state: &AppState, mut entry: AdmitMac) -> Result<AdmitMac> {
    const ENTITY: &str = "admit_mac";
    let op = "create";
    let id = entry.id.to_string();

    if entry.hw_address.trim().is_empty() {
        return Err(Error::validation(ENTITY, &id, op, "hw-address is required"));
    }

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    entry.created_at = Utc::now();
    db::insert_admit_mac(&mut tx, &entry)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    push_admit_list(state, &mut tx, ENTITY, &id, op).await?;
    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    publish(state, "admit_mac_created", &id);
    Ok(entry)
}

pub async fn list_admit_macs(state: &AppState) -> Result<Vec<AdmitMac>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store("admit_mac", "*", "list", e))?;
    db::list_admit_macs(&mut conn)
        .await
        .map_err(|e| Error::store("admit_mac", "*", "list", e))
}

pub async fn delete_admit_mac(state: &AppState, id: Uuid) -> Result<()> {
    const ENTITY: &str = "admit_mac";
    let op = "delete";
    let id_str = id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    db::get_admit_mac(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;
    db::delete_admit_mac(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    push_admit_list(state, &mut tx, ENTITY, &id_str, op).await?;
    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    publish(state, "admit_mac_deleted", &id_str);
    Ok(())
}

// --- fingerprint admission -------------------------------------------------

pub async fn create_admit_fingerprint(
    state: &AppState,
    mut entry: AdmitFingerprint,
) -> Result<AdmitFingerprint> {
    const ENTITY: &str = "admit_fingerprint";
    let op = "create";
    let id = entry.id.to_string();

    if entry.fingerprint.trim().is_empty() {
        return Err(Error::validation(ENTITY, &id, op, "fingerprint is required"));
    }

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    entry.created_at = Utc::now();
    db::insert_admit_fingerprint(&mut tx, &entry)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    push_admit_list(state, &mut tx, ENTITY, &id, op).await?;
    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    publish(state, "admit_fingerprint_created", &id);
    Ok(entry)
}

pub async fn list_admit_fingerprints(state: &AppState) -> Result<Vec<AdmitFingerprint>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store("admit_fingerprint", "*", "list", e))?;
    db::list_admit_fingerprints(&mut conn)
        .await
        .map_err(|e| Error::store("admit_fingerprint", "*", "list", e))
}

pub async fn delete_admit_fingerprint(state: &AppState, id: Uuid) -> Result<()> {
    const ENTITY: &str = "admit_fingerprint";
    let op = "delete";
    let id_str = id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    db::get_admit_fingerprint(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;
    db::delete_admit_fingerprint(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    push_admit_list(state, &mut tx, ENTITY, &id_str, op).await?;
    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    publish(state, "admit_fingerprint_deleted", &id_str);
    Ok(())
}

// --- per-MAC rate limits ---------------------------------------------------

pub async fn create_rate_limit_mac(
    state: &AppState,
    mut entry: RateLimitMac,
) -> Result<RateLimitMac> {
    const ENTITY: &str = "rate_limit_mac";
    let op = "create";
    let id = entry.id.to_string();

    if entry.hw_address.trim().is_empty() {
        return Err(Error::validation(ENTITY, &id, op, "hw-address is required"));
    }
    if entry.rate_limit == 0 {
        return Err(Error::validation(ENTITY, &id, op, "rate limit must be positive"));
    }

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    entry.created_at = Utc::now();
    db::insert_rate_limit_mac(&mut tx, &entry)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    push_rate_limit_list(state, &mut tx, ENTITY, &id, op).await?;
    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    publish(state, "rate_limit_mac_created", &id);
    Ok(entry)
}

pub async fn list_rate_limit_macs(state: &AppState) -> Result<Vec<RateLimitMac>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store("rate_limit_mac", "*", "list", e))?;
    db::list_rate_limit_macs(&mut conn)
        .await
        .map_err(|e| Error::store("rate_limit_mac", "*", "list", e))
}

pub async fn delete_rate_limit_mac(state: &AppState, id: Uuid) -> Result<()> {
    const ENTITY: &str = "rate_limit_mac";
    let op = "delete";
    let id_str = id.to_string();

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    db::get_rate_limit_mac(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;
    db::delete_rate_limit_mac(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    push_rate_limit_list(state, &mut tx, ENTITY, &id_str, op).await?;
    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    publish(state, "rate_limit_mac_deleted", &id_str);
    Ok(())
}
