//! SQLite persistence layer.
//!
//! All accessors take a `&mut SqliteConnection` so they compose inside a
//! single `pool.begin()` transaction; the service layer owns transaction
//! boundaries. Queries are runtime-checked raw SQL with bound parameters.
//! List-valued columns are stored as JSON text; IPv6 capacities are stored as
//! decimal strings because they do not fit an integer column.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use warden_common::models::{
    AdmitFingerprint, AdmitMac, ClientClass, Node, PdPool, Pool4, Pool6, RateLimitMac,
    Reservation4, Reservation6, ReservedPdPool, ReservedPool4, ReservedPool6, SharedNetwork,
    Subnet4, Subnet6,
};
use warden_common::Capacity;

/// Open (or create) the database and run schema bootstrap.
pub async fn init_db(path: &str) -> Result<SqlitePool> {
    let pool = if path == ":memory:" {
        // A pooled in-memory database must stay on one connection, otherwise
        // each handle sees its own empty database.
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?
    } else {
        let database_url = format!("sqlite://{}?mode=rwc", path);
        SqlitePool::connect(&database_url)
            .await
            .map_err(|e| anyhow!("Failed to connect to SQLite database at {}: {}", database_url, e))?
    };

    create_tables(&pool).await?;
    info!("Database initialized at {}", path);
    Ok(pool)
}

async fn create_tables(pool: &SqlitePool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS subnets4 (
            id TEXT PRIMARY KEY,
            subnet_id INTEGER NOT NULL UNIQUE,
            prefix TEXT NOT NULL,
            capacity INTEGER NOT NULL,
            nodes TEXT NOT NULL,
            valid_lifetime INTEGER NOT NULL,
            domain_servers TEXT NOT NULL,
            routers TEXT NOT NULL,
            class_whitelist TEXT NOT NULL,
            class_blacklist TEXT NOT NULL,
            relay_addresses TEXT NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS subnets6 (
            id TEXT PRIMARY KEY,
            subnet_id INTEGER NOT NULL UNIQUE,
            prefix TEXT NOT NULL,
            capacity TEXT NOT NULL,
            nodes TEXT NOT NULL,
            use_eui64 INTEGER NOT NULL,
            valid_lifetime INTEGER NOT NULL,
            domain_servers TEXT NOT NULL,
            class_whitelist TEXT NOT NULL,
            class_blacklist TEXT NOT NULL,
            relay_addresses TEXT NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS pools4 (
            id TEXT PRIMARY KEY,
            subnet_id TEXT NOT NULL,
            begin_address TEXT NOT NULL,
            end_address TEXT NOT NULL,
            capacity INTEGER NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS reserved_pools4 (
            id TEXT PRIMARY KEY,
            subnet_id TEXT NOT NULL,
            begin_address TEXT NOT NULL,
            end_address TEXT NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS reservations4 (
            id TEXT PRIMARY KEY,
            subnet_id TEXT NOT NULL,
            hw_address TEXT,
            hostname TEXT,
            ip_address TEXT NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS pools6 (
            id TEXT PRIMARY KEY,
            subnet_id TEXT NOT NULL,
            begin_address TEXT NOT NULL,
            end_address TEXT NOT NULL,
            capacity TEXT NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS reserved_pools6 (
            id TEXT PRIMARY KEY,
            subnet_id TEXT NOT NULL,
            begin_address TEXT NOT NULL,
            end_address TEXT NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS reservations6 (
            id TEXT PRIMARY KEY,
            subnet_id TEXT NOT NULL,
            duid TEXT,
            hw_address TEXT,
            hostname TEXT,
            ip_addresses TEXT NOT NULL,
            prefixes TEXT NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS pd_pools (
            id TEXT PRIMARY KEY,
            subnet_id TEXT NOT NULL,
            prefix TEXT NOT NULL,
            delegated_len INTEGER NOT NULL,
            capacity TEXT NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS reserved_pd_pools (
            id TEXT PRIMARY KEY,
            subnet_id TEXT NOT NULL,
            prefix TEXT NOT NULL,
            delegated_len INTEGER NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS client_classes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            option_code INTEGER NOT NULL,
            rule TEXT NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS shared_networks (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            subnet_ids TEXT NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS admit_macs (
            id TEXT PRIMARY KEY,
            hw_address TEXT NOT NULL UNIQUE,
            comment TEXT,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS admit_fingerprints (
            id TEXT PRIMARY KEY,
            fingerprint TEXT NOT NULL UNIQUE,
            comment TEXT,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS rate_limit_macs (
            id TEXT PRIMARY KEY,
            hw_address TEXT NOT NULL UNIQUE,
            rate_limit INTEGER NOT NULL,
            comment TEXT,
            created_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id TEXT PRIMARY KEY,
            endpoint TEXT NOT NULL,
            roles TEXT NOT NULL,
            virtual_ip TEXT,
            registered_at TEXT NOT NULL
        )
        "#,
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(value)?)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

// === Subnet id sequence ===

/// Next server-assigned numeric subnet id: max over both families plus one,
/// starting at 1. Must run inside the creating transaction.
pub async fn next_subnet_id(conn: &mut SqliteConnection) -> Result<u64> {
    let row = sqlx::query(
        "SELECT COALESCE((SELECT MAX(subnet_id) FROM subnets4), 0) AS max4, \
         COALESCE((SELECT MAX(subnet_id) FROM subnets6), 0) AS max6",
    )
    .fetch_one(&mut *conn)
    .await?;
    let max4: i64 = row.get("max4");
    let max6: i64 = row.get("max6");
    Ok(max4.max(max6) as u64 + 1)
}

// === Subnet4 ===

fn row_to_subnet4(row: &SqliteRow) -> Result<Subnet4> {
    Ok(Subnet4 {
        id: Uuid::parse_str(row.get("id"))?,
        subnet_id: row.get::<i64, _>("subnet_id") as u64,
        prefix: row.get::<String, _>("prefix").parse()?,
        capacity: row.get::<i64, _>("capacity") as u64,
        nodes: from_json(row.get("nodes"))?,
        valid_lifetime: row.get::<i64, _>("valid_lifetime") as u32,
        domain_servers: from_json(row.get("domain_servers"))?,
        routers: from_json(row.get("routers"))?,
        client_class_whitelist: from_json(row.get("class_whitelist"))?,
        client_class_blacklist: from_json(row.get("class_blacklist"))?,
        relay_addresses: from_json(row.get("relay_addresses"))?,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

pub async fn insert_subnet4(conn: &mut SqliteConnection, subnet: &Subnet4) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO subnets4 (
            id, subnet_id, prefix, capacity, nodes, valid_lifetime,
            domain_servers, routers, class_whitelist, class_blacklist,
            relay_addresses, comment, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(subnet.id.to_string())
    .bind(subnet.subnet_id as i64)
    .bind(subnet.prefix.to_string())
    .bind(subnet.capacity as i64)
    .bind(to_json(&subnet.nodes)?)
    .bind(subnet.valid_lifetime as i64)
    .bind(to_json(&subnet.domain_servers)?)
    .bind(to_json(&subnet.routers)?)
    .bind(to_json(&subnet.client_class_whitelist)?)
    .bind(to_json(&subnet.client_class_blacklist)?)
    .bind(to_json(&subnet.relay_addresses)?)
    .bind(subnet.comment.as_deref())
    .bind(subnet.created_at.to_rfc3339())
    .bind(subnet.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_subnet4(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Subnet4>> {
    let row = sqlx::query("SELECT * FROM subnets4 WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_subnet4).transpose()
}

pub async fn list_subnets4(conn: &mut SqliteConnection) -> Result<Vec<Subnet4>> {
    let rows = sqlx::query("SELECT * FROM subnets4 ORDER BY subnet_id")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_subnet4).collect()
}

/// Update the mutable policy fields. Geometry (prefix) and the numeric
/// subnet id are immutable after creation.
pub async fn update_subnet4(conn: &mut SqliteConnection, subnet: &Subnet4) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE subnets4 SET
            nodes = ?, valid_lifetime = ?, domain_servers = ?, routers = ?,
            class_whitelist = ?, class_blacklist = ?, relay_addresses = ?,
            comment = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(to_json(&subnet.nodes)?)
    .bind(subnet.valid_lifetime as i64)
    .bind(to_json(&subnet.domain_servers)?)
    .bind(to_json(&subnet.routers)?)
    .bind(to_json(&subnet.client_class_whitelist)?)
    .bind(to_json(&subnet.client_class_blacklist)?)
    .bind(to_json(&subnet.relay_addresses)?)
    .bind(subnet.comment.as_deref())
    .bind(Utc::now().to_rfc3339())
    .bind(subnet.id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_subnet4_capacity(
    conn: &mut SqliteConnection,
    id: Uuid,
    capacity: u64,
) -> Result<()> {
    sqlx::query("UPDATE subnets4 SET capacity = ?, updated_at = ? WHERE id = ?")
        .bind(capacity as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_subnet4(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    let id = id.to_string();
    for table in ["pools4", "reserved_pools4", "reservations4"] {
        sqlx::query(&format!("DELETE FROM {} WHERE subnet_id = ?", table))
            .bind(&id)
            .execute(&mut *conn)
            .await?;
    }
    sqlx::query("DELETE FROM subnets4 WHERE id = ?")
        .bind(&id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// === Subnet6 ===

fn row_to_subnet6(row: &SqliteRow) -> Result<Subnet6> {
    Ok(Subnet6 {
        id: Uuid::parse_str(row.get("id"))?,
        subnet_id: row.get::<i64, _>("subnet_id") as u64,
        prefix: row.get::<String, _>("prefix").parse()?,
        capacity: row.get::<String, _>("capacity").parse::<Capacity>()?,
        nodes: from_json(row.get("nodes"))?,
        use_eui64: row.get::<i64, _>("use_eui64") != 0,
        valid_lifetime: row.get::<i64, _>("valid_lifetime") as u32,
        domain_servers: from_json(row.get("domain_servers"))?,
        client_class_whitelist: from_json(row.get("class_whitelist"))?,
        client_class_blacklist: from_json(row.get("class_blacklist"))?,
        relay_addresses: from_json(row.get("relay_addresses"))?,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

pub async fn insert_subnet6(conn: &mut SqliteConnection, subnet: &Subnet6) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO subnets6 (
            id, subnet_id, prefix, capacity, nodes, use_eui64, valid_lifetime,
            domain_servers, class_whitelist, class_blacklist, relay_addresses,
            comment, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(subnet.id.to_string())
    .bind(subnet.subnet_id as i64)
    .bind(subnet.prefix.to_string())
    .bind(subnet.capacity.to_string())
    .bind(to_json(&subnet.nodes)?)
    .bind(subnet.use_eui64 as i64)
    .bind(subnet.valid_lifetime as i64)
    .bind(to_json(&subnet.domain_servers)?)
    .bind(to_json(&subnet.client_class_whitelist)?)
    .bind(to_json(&subnet.client_class_blacklist)?)
    .bind(to_json(&subnet.relay_addresses)?)
    .bind(subnet.comment.as_deref())
    .bind(subnet.created_at.to_rfc3339())
    .bind(subnet.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_subnet6(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Subnet6>> {
    let row = sqlx::query("SELECT * FROM subnets6 WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_subnet6).transpose()
}

pub async fn list_subnets6(conn: &mut SqliteConnection) -> Result<Vec<Subnet6>> {
    let rows = sqlx::query("SELECT * FROM subnets6 ORDER BY subnet_id")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_subnet6).collect()
}

pub async fn update_subnet6(conn: &mut SqliteConnection, subnet: &Subnet6) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE subnets6 SET
            nodes = ?, valid_lifetime = ?, domain_servers = ?,
            class_whitelist = ?, class_blacklist = ?, relay_addresses = ?,
            comment = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(to_json(&subnet.nodes)?)
    .bind(subnet.valid_lifetime as i64)
    .bind(to_json(&subnet.domain_servers)?)
    .bind(to_json(&subnet.client_class_whitelist)?)
    .bind(to_json(&subnet.client_class_blacklist)?)
    .bind(to_json(&subnet.relay_addresses)?)
    .bind(subnet.comment.as_deref())
    .bind(Utc::now().to_rfc3339())
    .bind(subnet.id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_subnet6_capacity(
    conn: &mut SqliteConnection,
    id: Uuid,
    capacity: Capacity,
) -> Result<()> {
    sqlx::query("UPDATE subnets6 SET capacity = ?, updated_at = ? WHERE id = ?")
        .bind(capacity.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_subnet6(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    let id = id.to_string();
    for table in [
        "pools6",
        "reserved_pools6",
        "reservations6",
        "pd_pools",
        "reserved_pd_pools",
    ] {
        sqlx::query(&format!("DELETE FROM {} WHERE subnet_id = ?", table))
            .bind(&id)
            .execute(&mut *conn)
            .await?;
    }
    sqlx::query("DELETE FROM subnets6 WHERE id = ?")
        .bind(&id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// === Pool4 ===

fn row_to_pool4(row: &SqliteRow) -> Result<Pool4> {
    Ok(Pool4 {
        id: Uuid::parse_str(row.get("id"))?,
        subnet_id: Uuid::parse_str(row.get("subnet_id"))?,
        begin_address: row.get::<String, _>("begin_address").parse()?,
        end_address: row.get::<String, _>("end_address").parse()?,
        capacity: row.get::<i64, _>("capacity") as u64,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

pub async fn insert_pool4(conn: &mut SqliteConnection, pool: &Pool4) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pools4 (id, subnet_id, begin_address, end_address, capacity,
                            comment, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(pool.id.to_string())
    .bind(pool.subnet_id.to_string())
    .bind(pool.begin_address.to_string())
    .bind(pool.end_address.to_string())
    .bind(pool.capacity as i64)
    .bind(pool.comment.as_deref())
    .bind(pool.created_at.to_rfc3339())
    .bind(pool.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_pool4(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Pool4>> {
    let row = sqlx::query("SELECT * FROM pools4 WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_pool4).transpose()
}

pub async fn list_pools4(conn: &mut SqliteConnection, subnet_id: Uuid) -> Result<Vec<Pool4>> {
    let rows = sqlx::query("SELECT * FROM pools4 WHERE subnet_id = ? ORDER BY begin_address")
        .bind(subnet_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_pool4).collect()
}

pub async fn update_pool4_capacity(
    conn: &mut SqliteConnection,
    id: Uuid,
    capacity: u64,
) -> Result<()> {
    sqlx::query("UPDATE pools4 SET capacity = ?, updated_at = ? WHERE id = ?")
        .bind(capacity as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_pool4(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM pools4 WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// === ReservedPool4 ===

fn row_to_reserved_pool4(row: &SqliteRow) -> Result<ReservedPool4> {
    Ok(ReservedPool4 {
        id: Uuid::parse_str(row.get("id"))?,
        subnet_id: Uuid::parse_str(row.get("subnet_id"))?,
        begin_address: row.get::<String, _>("begin_address").parse()?,
        end_address: row.get::<String, _>("end_address").parse()?,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

pub async fn insert_reserved_pool4(conn: &mut SqliteConnection, pool: &ReservedPool4) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reserved_pools4 (id, subnet_id, begin_address, end_address,
                                     comment, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(pool.id.to_string())
    .bind(pool.subnet_id.to_string())
    .bind(pool.begin_address.to_string())
    .bind(pool.end_address.to_string())
    .bind(pool.comment.as_deref())
    .bind(pool.created_at.to_rfc3339())
    .bind(pool.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_reserved_pool4(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<ReservedPool4>> {
    let row = sqlx::query("SELECT * FROM reserved_pools4 WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_reserved_pool4).transpose()
}

pub async fn list_reserved_pools4(
    conn: &mut SqliteConnection,
    subnet_id: Uuid,
) -> Result<Vec<ReservedPool4>> {
    let rows =
        sqlx::query("SELECT * FROM reserved_pools4 WHERE subnet_id = ? ORDER BY begin_address")
            .bind(subnet_id.to_string())
            .fetch_all(&mut *conn)
            .await?;
    rows.iter().map(row_to_reserved_pool4).collect()
}

pub async fn delete_reserved_pool4(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM reserved_pools4 WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// === Reservation4 ===

fn row_to_reservation4(row: &SqliteRow) -> Result<Reservation4> {
    Ok(Reservation4 {
        id: Uuid::parse_str(row.get("id"))?,
        subnet_id: Uuid::parse_str(row.get("subnet_id"))?,
        hw_address: row.get("hw_address"),
        hostname: row.get("hostname"),
        ip_address: row.get::<String, _>("ip_address").parse()?,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

pub async fn insert_reservation4(conn: &mut SqliteConnection, r: &Reservation4) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reservations4 (id, subnet_id, hw_address, hostname, ip_address,
                                   comment, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(r.id.to_string())
    .bind(r.subnet_id.to_string())
    .bind(r.hw_address.as_deref())
    .bind(r.hostname.as_deref())
    .bind(r.ip_address.to_string())
    .bind(r.comment.as_deref())
    .bind(r.created_at.to_rfc3339())
    .bind(r.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_reservation4(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Reservation4>> {
    let row = sqlx::query("SELECT * FROM reservations4 WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_reservation4).transpose()
}

pub async fn list_reservations4(
    conn: &mut SqliteConnection,
    subnet_id: Uuid,
) -> Result<Vec<Reservation4>> {
    let rows = sqlx::query("SELECT * FROM reservations4 WHERE subnet_id = ? ORDER BY ip_address")
        .bind(subnet_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_reservation4).collect()
}

pub async fn delete_reservation4(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM reservations4 WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Count persisted reservations in the subnet claiming the given identifier
/// column value, excluding `exclude` (for update revalidation).
pub async fn count_reservation4_field(
    conn: &mut SqliteConnection,
    subnet_id: Uuid,
    column: Reservation4Field,
    value: &str,
    exclude: Option<Uuid>,
) -> Result<u64> {
    let sql = format!(
        "SELECT COUNT(*) AS n FROM reservations4 WHERE subnet_id = ? AND {} = ? AND id != ?",
        column.as_str()
    );
    let row = sqlx::query(&sql)
        .bind(subnet_id.to_string())
        .bind(value)
        .bind(exclude.map(|u| u.to_string()).unwrap_or_default())
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get::<i64, _>("n") as u64)
}

/// Identifier columns of reservations4; enumerated so callers cannot inject
/// arbitrary column names.
#[derive(Debug, Clone, Copy)]
pub enum Reservation4Field {
    HwAddress,
    Hostname,
    IpAddress,
}

impl Reservation4Field {
    fn as_str(self) -> &'static str {
        match self {
            Reservation4Field::HwAddress => "hw_address",
            Reservation4Field::Hostname => "hostname",
            Reservation4Field::IpAddress => "ip_address",
        }
    }
}

// === Pool6 ===

fn row_to_pool6(row: &SqliteRow) -> Result<Pool6> {
    Ok(Pool6 {
        id: Uuid::parse_str(row.get("id"))?,
        subnet_id: Uuid::parse_str(row.get("subnet_id"))?,
        begin_address: row.get::<String, _>("begin_address").parse()?,
        end_address: row.get::<String, _>("end_address").parse()?,
        capacity: row.get::<String, _>("capacity").parse::<Capacity>()?,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

pub async fn insert_pool6(conn: &mut SqliteConnection, pool: &Pool6) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pools6 (id, subnet_id, begin_address, end_address, capacity,
                            comment, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(pool.id.to_string())
    .bind(pool.subnet_id.to_string())
    .bind(pool.begin_address.to_string())
    .bind(pool.end_address.to_string())
    .bind(pool.capacity.to_string())
    .bind(pool.comment.as_deref())
    .bind(pool.created_at.to_rfc3339())
    .bind(pool.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_pool6(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Pool6>> {
    let row = sqlx::query("SELECT * FROM pools6 WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_pool6).transpose()
}

pub async fn list_pools6(conn: &mut SqliteConnection, subnet_id: Uuid) -> Result<Vec<Pool6>> {
    let rows = sqlx::query("SELECT * FROM pools6 WHERE subnet_id = ? ORDER BY begin_address")
        .bind(subnet_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_pool6).collect()
}

pub async fn update_pool6_capacity(
    conn: &mut SqliteConnection,
    id: Uuid,
    capacity: Capacity,
) -> Result<()> {
    sqlx::query("UPDATE pools6 SET capacity = ?, updated_at = ? WHERE id = ?")
        .bind(capacity.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_pool6(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM pools6 WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// === ReservedPool6 ===

fn row_to_reserved_pool6(row: &SqliteRow) -> Result<ReservedPool6> {
    Ok(ReservedPool6 {
        id: Uuid::parse_str(row.get("id"))?,
        subnet_id: Uuid::parse_str(row.get("subnet_id"))?,
        begin_address: row.get::<String, _>("begin_address").parse()?,
        end_address: row.get::<String, _>("end_address").parse()?,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

pub async fn insert_reserved_pool6(conn: &mut SqliteConnection, pool: &ReservedPool6) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reserved_pools6 (id, subnet_id, begin_address, end_address,
                                     comment, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(pool.id.to_string())
    .bind(pool.subnet_id.to_string())
    .bind(pool.begin_address.to_string())
    .bind(pool.end_address.to_string())
    .bind(pool.comment.as_deref())
    .bind(pool.created_at.to_rfc3339())
    .bind(pool.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_reserved_pool6(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<ReservedPool6>> {
    let row = sqlx::query("SELECT * FROM reserved_pools6 WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_reserved_pool6).transpose()
}

pub async fn list_reserved_pools6(
    conn: &mut SqliteConnection,
    subnet_id: Uuid,
) -> Result<Vec<ReservedPool6>> {
    let rows =
        sqlx::query("SELECT * FROM reserved_pools6 WHERE subnet_id = ? ORDER BY begin_address")
            .bind(subnet_id.to_string())
            .fetch_all(&mut *conn)
            .await?;
    rows.iter().map(row_to_reserved_pool6).collect()
}

pub async fn delete_reserved_pool6(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM reserved_pools6 WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// === Reservation6 ===

fn row_to_reservation6(row: &SqliteRow) -> Result<Reservation6> {
    Ok(Reservation6 {
        id: Uuid::parse_str(row.get("id"))?,
        subnet_id: Uuid::parse_str(row.get("subnet_id"))?,
        duid: row.get("duid"),
        hw_address: row.get("hw_address"),
        hostname: row.get("hostname"),
        ip_addresses: from_json(row.get("ip_addresses"))?,
        prefixes: from_json(row.get("prefixes"))?,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

pub async fn insert_reservation6(conn: &mut SqliteConnection, r: &Reservation6) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reservations6 (id, subnet_id, duid, hw_address, hostname,
                                   ip_addresses, prefixes, comment, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(r.id.to_string())
    .bind(r.subnet_id.to_string())
    .bind(r.duid.as_deref())
    .bind(r.hw_address.as_deref())
    .bind(r.hostname.as_deref())
    .bind(to_json(&r.ip_addresses)?)
    .bind(to_json(&r.prefixes)?)
    .bind(r.comment.as_deref())
    .bind(r.created_at.to_rfc3339())
    .bind(r.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_reservation6(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Reservation6>> {
    let row = sqlx::query("SELECT * FROM reservations6 WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_reservation6).transpose()
}

pub async fn list_reservations6(
    conn: &mut SqliteConnection,
    subnet_id: Uuid,
) -> Result<Vec<Reservation6>> {
    let rows = sqlx::query("SELECT * FROM reservations6 WHERE subnet_id = ? ORDER BY id")
        .bind(subnet_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_reservation6).collect()
}

pub async fn delete_reservation6(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM reservations6 WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// === PdPool ===

fn row_to_pd_pool(row: &SqliteRow) -> Result<PdPool> {
    Ok(PdPool {
        id: Uuid::parse_str(row.get("id"))?,
        subnet_id: Uuid::parse_str(row.get("subnet_id"))?,
        prefix: row.get::<String, _>("prefix").parse()?,
        delegated_len: row.get::<i64, _>("delegated_len") as u8,
        capacity: row.get::<String, _>("capacity").parse::<Capacity>()?,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

pub async fn insert_pd_pool(conn: &mut SqliteConnection, pool: &PdPool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pd_pools (id, subnet_id, prefix, delegated_len, capacity,
                              comment, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(pool.id.to_string())
    .bind(pool.subnet_id.to_string())
    .bind(pool.prefix.to_string())
    .bind(pool.delegated_len as i64)
    .bind(pool.capacity.to_string())
    .bind(pool.comment.as_deref())
    .bind(pool.created_at.to_rfc3339())
    .bind(pool.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_pd_pool(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<PdPool>> {
    let row = sqlx::query("SELECT * FROM pd_pools WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_pd_pool).transpose()
}

pub async fn list_pd_pools(conn: &mut SqliteConnection, subnet_id: Uuid) -> Result<Vec<PdPool>> {
    let rows = sqlx::query("SELECT * FROM pd_pools WHERE subnet_id = ? ORDER BY prefix")
        .bind(subnet_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_pd_pool).collect()
}

pub async fn update_pd_pool_capacity(
    conn: &mut SqliteConnection,
    id: Uuid,
    capacity: Capacity,
) -> Result<()> {
    sqlx::query("UPDATE pd_pools SET capacity = ?, updated_at = ? WHERE id = ?")
        .bind(capacity.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_pd_pool(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM pd_pools WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// === ReservedPdPool ===

fn row_to_reserved_pd_pool(row: &SqliteRow) -> Result<ReservedPdPool> {
    Ok(ReservedPdPool {
        id: Uuid::parse_str(row.get("id"))?,
        subnet_id: Uuid::parse_str(row.get("subnet_id"))?,
        prefix: row.get::<String, _>("prefix").parse()?,
        delegated_len: row.get::<i64, _>("delegated_len") as u8,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

pub async fn insert_reserved_pd_pool(
    conn: &mut SqliteConnection,
    pool: &ReservedPdPool,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reserved_pd_pools (id, subnet_id, prefix, delegated_len,
                                       comment, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(pool.id.to_string())
    .bind(pool.subnet_id.to_string())
    .bind(pool.prefix.to_string())
    .bind(pool.delegated_len as i64)
    .bind(pool.comment.as_deref())
    .bind(pool.created_at.to_rfc3339())
    .bind(pool.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_reserved_pd_pool(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<ReservedPdPool>> {
    let row = sqlx::query("SELECT * FROM reserved_pd_pools WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_reserved_pd_pool).transpose()
}

pub async fn list_reserved_pd_pools(
    conn: &mut SqliteConnection,
    subnet_id: Uuid,
) -> Result<Vec<ReservedPdPool>> {
    let rows = sqlx::query("SELECT * FROM reserved_pd_pools WHERE subnet_id = ? ORDER BY prefix")
        .bind(subnet_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_reserved_pd_pool).collect()
}

pub async fn delete_reserved_pd_pool(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM reserved_pd_pools WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// === ClientClass ===

fn row_to_client_class(row: &SqliteRow) -> Result<ClientClass> {
    Ok(ClientClass {
        id: Uuid::parse_str(row.get("id"))?,
        name: row.get("name"),
        option_code: row.get::<i64, _>("option_code") as u16,
        rule: from_json(row.get("rule"))?,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

pub async fn insert_client_class(conn: &mut SqliteConnection, class: &ClientClass) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO client_classes (id, name, option_code, rule, comment, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(class.id.to_string())
    .bind(&class.name)
    .bind(class.option_code as i64)
    .bind(to_json(&class.rule)?)
    .bind(class.comment.as_deref())
    .bind(class.created_at.to_rfc3339())
    .bind(class.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_client_class(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<ClientClass>> {
    let row = sqlx::query("SELECT * FROM client_classes WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_client_class).transpose()
}

pub async fn get_client_class_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<ClientClass>> {
    let row = sqlx::query("SELECT * FROM client_classes WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_client_class).transpose()
}

pub async fn list_client_classes(conn: &mut SqliteConnection) -> Result<Vec<ClientClass>> {
    let rows = sqlx::query("SELECT * FROM client_classes ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_client_class).collect()
}

pub async fn update_client_class(conn: &mut SqliteConnection, class: &ClientClass) -> Result<()> {
    sqlx::query(
        "UPDATE client_classes SET option_code = ?, rule = ?, comment = ?, updated_at = ? WHERE id = ?",
    )
    .bind(class.option_code as i64)
    .bind(to_json(&class.rule)?)
    .bind(class.comment.as_deref())
    .bind(Utc::now().to_rfc3339())
    .bind(class.id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_client_class(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM client_classes WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// === SharedNetwork ===

fn row_to_shared_network(row: &SqliteRow) -> Result<SharedNetwork> {
    Ok(SharedNetwork {
        id: Uuid::parse_str(row.get("id"))?,
        name: row.get("name"),
        subnet_ids: from_json(row.get("subnet_ids"))?,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

pub async fn insert_shared_network(
    conn: &mut SqliteConnection,
    network: &SharedNetwork,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO shared_networks (id, name, subnet_ids, comment, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(network.id.to_string())
    .bind(&network.name)
    .bind(to_json(&network.subnet_ids)?)
    .bind(network.comment.as_deref())
    .bind(network.created_at.to_rfc3339())
    .bind(network.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_shared_network(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<SharedNetwork>> {
    let row = sqlx::query("SELECT * FROM shared_networks WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_shared_network).transpose()
}

pub async fn list_shared_networks(conn: &mut SqliteConnection) -> Result<Vec<SharedNetwork>> {
    let rows = sqlx::query("SELECT * FROM shared_networks ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_shared_network).collect()
}

pub async fn update_shared_network(
    conn: &mut SqliteConnection,
    network: &SharedNetwork,
) -> Result<()> {
    sqlx::query(
        "UPDATE shared_networks SET subnet_ids = ?, comment = ?, updated_at = ? WHERE id = ?",
    )
    .bind(to_json(&network.subnet_ids)?)
    .bind(network.comment.as_deref())
    .bind(Utc::now().to_rfc3339())
    .bind(network.id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_shared_network(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM shared_networks WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// === Admit / rate-limit lists ===

fn row_to_admit_mac(row: &SqliteRow) -> Result<AdmitMac> {
    Ok(AdmitMac {
        id: Uuid::parse_str(row.get("id"))?,
        hw_address: row.get("hw_address"),
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
    })
}

pub async fn insert_admit_mac(conn: &mut SqliteConnection, entry: &AdmitMac) -> Result<()> {
    sqlx::query("INSERT INTO admit_macs (id, hw_address, comment, created_at) VALUES (?, ?, ?, ?)")
        .bind(entry.id.to_string())
        .bind(&entry.hw_address)
        .bind(entry.comment.as_deref())
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn get_admit_mac(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<AdmitMac>> {
    let row = sqlx::query("SELECT * FROM admit_macs WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_admit_mac).transpose()
}

pub async fn list_admit_macs(conn: &mut SqliteConnection) -> Result<Vec<AdmitMac>> {
    let rows = sqlx::query("SELECT * FROM admit_macs ORDER BY hw_address")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_admit_mac).collect()
}

pub async fn delete_admit_mac(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM admit_macs WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn row_to_admit_fingerprint(row: &SqliteRow) -> Result<AdmitFingerprint> {
    Ok(AdmitFingerprint {
        id: Uuid::parse_str(row.get("id"))?,
        fingerprint: row.get("fingerprint"),
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
    })
}

pub async fn insert_admit_fingerprint(
    conn: &mut SqliteConnection,
    entry: &AdmitFingerprint,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO admit_fingerprints (id, fingerprint, comment, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(entry.id.to_string())
    .bind(&entry.fingerprint)
    .bind(entry.comment.as_deref())
    .bind(entry.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_admit_fingerprint(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<AdmitFingerprint>> {
    let row = sqlx::query("SELECT * FROM admit_fingerprints WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_admit_fingerprint).transpose()
}

pub async fn list_admit_fingerprints(
    conn: &mut SqliteConnection,
) -> Result<Vec<AdmitFingerprint>> {
    let rows = sqlx::query("SELECT * FROM admit_fingerprints ORDER BY fingerprint")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_admit_fingerprint).collect()
}

pub async fn delete_admit_fingerprint(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM admit_fingerprints WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn row_to_rate_limit_mac(row: &SqliteRow) -> Result<RateLimitMac> {
    Ok(RateLimitMac {
        id: Uuid::parse_str(row.get("id"))?,
        hw_address: row.get("hw_address"),
        rate_limit: row.get::<i64, _>("rate_limit") as u32,
        comment: row.get("comment"),
        created_at: parse_ts(row.get("created_at"))?,
    })
}

pub async fn insert_rate_limit_mac(conn: &mut SqliteConnection, entry: &RateLimitMac) -> Result<()> {
    sqlx::query(
        "INSERT INTO rate_limit_macs (id, hw_address, rate_limit, comment, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(entry.id.to_string())
    .bind(&entry.hw_address)
    .bind(entry.rate_limit as i64)
    .bind(entry.comment.as_deref())
    .bind(entry.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_rate_limit_mac(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<RateLimitMac>> {
    let row = sqlx::query("SELECT * FROM rate_limit_macs WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_rate_limit_mac).transpose()
}

pub async fn list_rate_limit_macs(conn: &mut SqliteConnection) -> Result<Vec<RateLimitMac>> {
    let rows = sqlx::query("SELECT * FROM rate_limit_macs ORDER BY hw_address")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_rate_limit_mac).collect()
}

pub async fn delete_rate_limit_mac(conn: &mut SqliteConnection, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM rate_limit_macs WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// === Nodes ===

fn row_to_node(row: &SqliteRow) -> Result<Node> {
    Ok(Node {
        id: row.get("id"),
        endpoint: row.get("endpoint"),
        roles: from_json(row.get("roles"))?,
        virtual_ip: row.get("virtual_ip"),
        registered_at: parse_ts(row.get("registered_at"))?,
    })
}

pub async fn upsert_node(conn: &mut SqliteConnection, node: &Node) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO nodes (id, endpoint, roles, virtual_ip, registered_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            endpoint = excluded.endpoint,
            roles = excluded.roles,
            virtual_ip = excluded.virtual_ip
        "#,
    )
    .bind(&node.id)
    .bind(&node.endpoint)
    .bind(to_json(&node.roles)?)
    .bind(node.virtual_ip.as_deref())
    .bind(node.registered_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list_nodes(conn: &mut SqliteConnection) -> Result<Vec<Node>> {
    let rows = sqlx::query("SELECT * FROM nodes ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_node).collect()
}

pub async fn delete_node(conn: &mut SqliteConnection, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM nodes WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
