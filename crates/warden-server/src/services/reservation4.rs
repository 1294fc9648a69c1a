//! IPv4 reservations: one fixed address bound to a MAC or a hostname.

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use uuid::Uuid;

use warden_common::models::{Reservation4, Subnet4};
use warden_common::{Error, Result};

use crate::agent::{AgentCommandKind, LeaseScope};
use crate::identity::Reservation4Identifier;
use crate::services::{notify, publish};
use crate::{conflict, db, ledger, AppState};

const ENTITY: &str = "reservation4";

async fn check_and_insert(
    tx: &mut SqliteConnection,
    subnet: &Subnet4,
    reservation: &mut Reservation4,
) -> Result<()> {
    let op = "create";
    let id = reservation.id.to_string();

    conflict::address4_within_subnet(reservation.ip_address, &subnet.prefix)
        .map_err(|reason| Error::validation(ENTITY, &id, op, reason))?;
    let reserved = db::list_reserved_pools4(tx, subnet.id)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    conflict::check_reservation4_vs_reserved(reservation.ip_address, &reserved)
        .map_err(|reason| Error::conflict(ENTITY, &id, op, reason))?;
    conflict::check_reservation4_unique(tx, reservation, None)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?
        .map_err(|reason| Error::conflict(ENTITY, &id, op, reason))?;

    // The subnet counter always moves by one; with nothing left the
    // subtraction would clamp at zero and the later delete would drift.
    if subnet.capacity == 0 {
        return Err(Error::validation(
            ENTITY,
            &id,
            op,
            "subnet has no allocatable addresses left",
        ));
    }

    ledger::apply_reservation4(tx, subnet, reservation.ip_address, true)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    reservation.created_at = Utc::now();
    reservation.updated_at = reservation.created_at;
    db::insert_reservation4(tx, reservation)
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    Ok(())
}

pub async fn create(state: &AppState, mut reservation: Reservation4) -> Result<Reservation4> {
    let op = "create";
    let id = reservation.id.to_string();

    reservation
        .validate()
        .map_err(|reason| Error::validation(ENTITY, &id, op, reason))?;

    let mut tx: Transaction<'_, Sqlite> = state
        .db
        .begin()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;

    let subnet = db::get_subnet4(&mut tx, reservation.subnet_id)
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

    check_and_insert(&mut tx, &subnet, &mut reservation).await?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    notify(
        state,
        &targets,
        AgentCommandKind::CreateReservation4,
        &reservation,
    )
    .await
    .map_err(|e| Error::agent(ENTITY, &id, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id, op, e))?;
    publish(state, "reservation4_created", &id);
    Ok(reservation)
}

/// Batch import: one transaction, one sequential round of notifications. A
/// failure anywhere aborts the whole batch with zero rows persisted; the
/// in-memory identifier tracker rejects intra-batch duplicates before they
/// reach the store.
pub async fn batch_create(
    state: &AppState,
    reservations: Vec<Reservation4>,
) -> Result<Vec<Reservation4>> {
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

    let subnet = db::get_subnet4(&mut tx, subnet_uuid)
        .await
        .map_err(|e| Error::store(ENTITY, "*", op, e))?
        .ok_or_else(|| {
            Error::validation(ENTITY, "*", op, format!("unknown subnet {}", subnet_uuid))
        })?;
    let targets = state.nodes.targets_for(&subnet.nodes);

    let mut tracker = Reservation4Identifier::new();
    let existing = db::list_reservations4(&mut tx, subnet.id)
        .await
        .map_err(|e| Error::store(ENTITY, "*", op, e))?;
    tracker.seed(&existing);

    let mut created = Vec::with_capacity(reservations.len());
    for mut reservation in reservations {
        let id = reservation.id.to_string();
        reservation
            .validate()
            .map_err(|reason| Error::validation(ENTITY, &id, op, reason))?;
        tracker
            .add(&reservation)
            .map_err(|reason| Error::conflict(ENTITY, &id, op, reason))?;

        // Each item shifts the counters, so re-read the subnet every round.
        let fresh = db::get_subnet4(&mut tx, subnet.id)
            .await
            .map_err(|e| Error::store(ENTITY, &id, op, e))?
            .ok_or_else(|| Error::not_found("subnet4", subnet.id.to_string(), op))?;
        check_and_insert(&mut tx, &fresh, &mut reservation).await?;

        notify(
            state,
            &targets,
            AgentCommandKind::CreateReservation4,
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
        publish(state, "reservation4_created", reservation.id);
    }
    Ok(created)
}

pub async fn get(state: &AppState, id: Uuid) -> Result<Reservation4> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?;
    db::get_reservation4(&mut conn, id)
        .await
        .map_err(|e| Error::store(ENTITY, id.to_string(), "get", e))?
        .ok_or_else(|| Error::not_found(ENTITY, id.to_string(), "get"))
}

pub async fn list(state: &AppState, subnet_id: Uuid) -> Result<Vec<Reservation4>> {
    let mut conn = state
        .db
        .acquire()
        .await
        .map_err(|e| Error::store(ENTITY, "*", "list", e))?;
    db::list_reservations4(&mut conn, subnet_id)
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

    let reservation = db::get_reservation4(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found(ENTITY, &id_str, op))?;
    let subnet = db::get_subnet4(&mut tx, reservation.subnet_id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?
        .ok_or_else(|| Error::not_found("subnet4", reservation.subnet_id.to_string(), op))?;

    let targets = state.nodes.targets_for(&subnet.nodes);
    let leases = state
        .agents
        .lease_count(
            &targets,
            &LeaseScope::Reservation4 {
                subnet_id: subnet.subnet_id,
                ip: reservation.ip_address,
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

    ledger::apply_reservation4(&mut tx, &subnet, reservation.ip_address, false)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    db::delete_reservation4(&mut tx, id)
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;

    notify(
        state,
        &targets,
        AgentCommandKind::DeleteReservation4,
        &reservation,
    )
    .await
    .map_err(|e| Error::agent(ENTITY, &id_str, op, e))?;

    tx.commit()
        .await
        .map_err(|e| Error::store(ENTITY, &id_str, op, e))?;
    publish(state, "reservation4_deleted", &id_str);
    Ok(())
}
