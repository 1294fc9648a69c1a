//! IPv6 reservations: DUID, MAC, or hostname bound to addresses and/or
//! delegated prefixes. Rejected outright on EUI64-autoconfigured subnets.

use chrono::Utc;
use sqlx::SqliteConnection;
use uuid::Uuid;

use warden_common::models::{Reservation6, Subnet6};
use warden_common::{Error, Result};

use crate::agent::{AgentCommandKind, LeaseScope};
use crate::identity::Reservation6Identifier;
use crate::services::{notify, publish};
use crate::{conflict, db, ledger, AppState};

const ENTITY: &str = "reservation6";

async fn check_and_insert(
    tx: &mut SqliteConnection,
    subnet: &Subnet6,
    tracker: &mut Reservation6Identifier,
    reservation: &mut Reservation6,
) -> Result<()> {
    let op = "create";
    let id = reservation.id.to_string();

    for ip in &reservation.ip_addresses {
        conflict::address6_within_subnet(*ip, &subnet.prefix)
            .map_err(|reason| Error::validation(ENTITY, &id, op, reason))?;
    }
    for prefix in &reservation.prefixes {
        if prefix.prefix_len() < subnet.prefix.prefix_len()
            || !subnet.prefix.contains(&prefix.network())
        {
            return Err(Error::validation(
                ENTITY,
                &id,
                op,
                format!("prefix {} is not in subnet {}", prefix, subnet.prefix),
            ));
        }
    }

    tracker
        .add(reservation)
        .map_err(|reason| Error::conflict(ENTITY, &id, op, reason))?;

    let reserved = db::list_reserved_pools6(tx, subnet.id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    let reserved_pd = db::list_reserved_pd_pools(tx, subnet.id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    conflict::check_reservation6_vs_reserved(reservation, &reserved, &reserved_pd)
        .map_err(|reason| Error::conflict(ENTITY, &id, op, reason))?;

    // The subnet counter moves by the claim count; a charge it cannot cover
    // would clamp at zero and the later delete would drift.
    let claimed = warden_common::Capacity::Bounded(reservation.claimed_count() as u128);
    if claimed.exceeds(&subnet.capacity) {
        return Err(Error::validation(
            ENTITY,
            &id,
            op,
            format!(
                "reservation claims {} units but the subnet has {} left",
                claimed, subnet.capacity
            ),
        ));
    }

    ledger::apply_reservation6(tx, subnet, reservation, true)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    reservation.created_at = Utc::now();
    reservation.updated_at = reservation.created_at;
    db::insert_reservation6(tx, reservation)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    Ok(())
}

fn reject_eui64(subnet: &Subnet6, id: &str, op: &'static str) -> Result<()> {
    if subnet.use_eui64 {
        return Err(Error::validation(
            ENTITY,
            id,
            op,
            "subnet uses EUI64 autoconfiguration",
        ));
    }
    Ok(())
}

pub async fn create(state: &AppState, mut reservation: Reservation6) -> Result<Reservation6> {
    let op = "create";
    let id = reservation.id.to_string();

    reservation
        .validate()
        .map_err(|reason| Error::validation(ENTITY, &id, op, reason))?;

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    let subnet = db::get_subnet6(&mut tx, reservation.subnet_id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?
        .ok_or_else(|| {
            Error::validation(
                ENTITY,
                &id,
                op,
                format!("unknown subnet {}", reservation.subnet_id),
            )
        })?;
    reject_eui64(&subnet, &id, op)?;

    let mut tracker = Reservation6Identifier::new();
    let existing = db::list_reservations6(&mut tx, subnet.id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    tracker.seed(&existing);

    check_and_insert(&mut tx, &subnet, &mut tracker, &mut reservation).await?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    notify(
        state,
        &targets,
        AgentCommandKind::CreateReservation6,
        &reservation,
    )
    .await
    .map_err(|e| Error::agent(ENTITY, &id, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    publish(state, "reservation6_created", &id);
    Ok(reservation)
}

/// Batch import, same contract as the IPv4 path: all-or-nothing within one
/// transaction, duplicates rejected in memory before any store write.
pub async fn batch_create(
    state: &AppState,
    reservations: Vec<Reservation6>,
) -> Result<Vec<Reservation6>> {
    let op = "batch_create";
    if reservations.is_empty() {
        return Ok(Vec::new());
    }
    let subnet_uuid = reservations[0].subnet_id;
    if reservations.iter().any(|r| r.subnet_id != subnet_uuid) {
        return Err(Error::validation(
            ENTITY,
            "*",
            op,
            "batch spans multiple subnets",
        ));
    }

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, "*", op, e))?;

    let subnet = db::get_subnet6(&mut tx, subnet_uuid)
        .await
        .map_err(|e| Error::store(ENTITY, "*", op, e))?
        .ok_or_else(|| {
            Error::validation(ENTITY, "*", op, format!("unknown subnet {}", subnet_uuid))
        })?;
    reject_eui64(&subnet, "*", op)?;
    let targets = state.nodes.targets_for(&subnet.nodes);

    let mut tracker = Reservation6Identifier::new();
    let existing = db::list_reservations6(&mut tx, subnet.id)
        .await
        .map_err(|e| Error::store(ENTITY, "*", op, e))?;
    tracker.seed(&existing);

    let mut created = Vec::with_capacity(reservations.len());
    for mut reservation in reservations {
        let id = reservation.id.to_string();
        reservation
            .validate()
            .map_err(|reason| Error::validation(ENTITY, &id, op, reason))?;

        let fresh = db::get_subnet6(&mut tx, subnet.id)
            .await
            .map_err(|e| Error::store(ENTITY, &id, op, e))?
            .ok_or_else(|| Error::not_found("subnet6", subnet.id.to_string(), op))?;
        check_and_insert(&mut tx, &fresh, &mut tracker, &mut reservation).await?;

        notify(
            state,
            &targets,
            AgentCommandKind::CreateReservation6,
            &reservation,
        )
        .await
        .map_err(|e| Error::agent(ENTITY, &id, op, e))?;
        created.push(reservation);
    }

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, "*", op, e))?;
    for reservation in &created {
        publish(state, "reservation6_created", reservation.id);
    }
    Ok(created)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<Reservation6> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?;
    db::get_reservation6(&mut conn, id)
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?
        .ok_or_else(|| Error::not_found(ENTITY, id.to_string(), "get"))
}

pub async fn list(state: &AppState, subnet_id: Uuid) -> Result<Vec<Reservation6>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))?;
    db::list_reservations6(&mut conn, subnet_id)
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

    let reservation = db::get_reservation6(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;
    let subnet = db::get_subnet6(&mut tx, reservation.subnet_id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found("subnet6", reservation.subnet_id.to_string(), op))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    let leases = state
        .agents
        .lease_count(
            &targets,
            &LeaseScope::Reservation6 {
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

    ledger::apply_reservation6(&mut tx, &subnet, &reservation, false)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    db::delete_reservation6(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    notify(
        state,
        &targets,
        AgentCommandKind::DeleteReservation6,
        &reservation,
    )
    .await
    .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "reservation6_deleted", &id_str);
    Ok(())
}
