//! Capacity accounting.
//!
//! Every mutation of a pool, reserved range, or reservation flows through
//! here with an `is_create` flag; delete is the exact numeric inverse of
//! create. All reads and capacity writes happen on the caller's open
//! transaction so a later failure rolls the counters back with the rows.
//!
//! Subnet and pool counters only move together: a reserved range subtracts
//! its per-pool intersection from each overlapping pool and the summed total
//! from the subnet. A reserved range overlapping no pool at all subtracts its
//! full size from the subnet alone.

use sqlx::SqliteConnection;
use std::net::Ipv4Addr;

use warden_common::models::{PdPool, Pool4, Pool6, Reservation6, Subnet4, Subnet6};
use warden_common::range::{Ip4Range, Ip6Range, PdRange};
use warden_common::Capacity;

use crate::db;

fn shift_u64(current: u64, delta: u64, is_create: bool) -> u64 {
    if is_create {
        current.saturating_sub(delta)
    } else {
        current.saturating_add(delta)
    }
}

// --- dynamic pools ---------------------------------------------------------

/// Initial capacity of a new IPv4 pool: range size minus the reserved ranges
/// and reservations already inside it.
pub async fn pool4_initial_capacity(
    conn: &mut SqliteConnection,
    subnet: &Subnet4,
    range: &Ip4Range,
) -> anyhow::Result<u64> {
    let mut capacity = range.size();
    for reserved in db::list_reserved_pools4(conn, subnet.id).await? {
        capacity = capacity.saturating_sub(range.intersect_size(&reserved.range()?));
    }
    for reservation in db::list_reservations4(conn, subnet.id).await? {
        if range.contains(reservation.ip_address) {
            capacity = capacity.saturating_sub(1);
        }
    }
    Ok(capacity)
}

/// Fold a pool's capacity into (create) or out of (delete) its subnet.
pub async fn apply_pool4(
    conn: &mut SqliteConnection,
    subnet: &Subnet4,
    pool_capacity: u64,
    is_create: bool,
) -> anyhow::Result<u64> {
    let updated = if is_create {
        subnet.capacity.saturating_add(pool_capacity)
    } else {
        subnet.capacity.saturating_sub(pool_capacity)
    };
    db::update_subnet4_capacity(conn, subnet.id, updated).await?;
    Ok(updated)
}

pub async fn pool6_initial_capacity(
    conn: &mut SqliteConnection,
    subnet: &Subnet6,
    range: &Ip6Range,
) -> anyhow::Result<Capacity> {
    let mut capacity = range.size();
    for reserved in db::list_reserved_pools6(conn, subnet.id).await? {
        capacity = capacity.minus(range.intersect_size(&reserved.range()?));
    }
    for reservation in db::list_reservations6(conn, subnet.id).await? {
        let inside = reservation
            .ip_addresses
            .iter()
            .filter(|ip| range.contains(**ip))
            .count() as u128;
        capacity = capacity.minus(Capacity::Bounded(inside));
    }
    Ok(capacity)
}

pub async fn apply_pool6(
    conn: &mut SqliteConnection,
    subnet: &Subnet6,
    pool_capacity: Capacity,
    is_create: bool,
) -> anyhow::Result<Capacity> {
    // `apply` subtracts on create; pool creation grows the subnet.
    let updated = subnet.capacity.apply(pool_capacity, !is_create);
    db::update_subnet6_capacity(conn, subnet.id, updated).await?;
    Ok(updated)
}

/// Initial capacity of a new pd-pool: delegation units minus the reserved
/// pd-pools and reservation prefixes already inside it.
pub async fn pd_pool_initial_capacity(
    conn: &mut SqliteConnection,
    subnet: &Subnet6,
    range: &PdRange,
) -> anyhow::Result<Capacity> {
    let mut capacity = range.capacity();
    for reserved in db::list_reserved_pd_pools(conn, subnet.id).await? {
        if range.overlaps_net(&reserved.prefix) {
            capacity = capacity.minus(range.reserved_delegations(reserved.prefix.prefix_len()));
        }
    }
    for reservation in db::list_reservations6(conn, subnet.id).await? {
        for prefix in &reservation.prefixes {
            if range.overlaps_net(prefix) {
                capacity = capacity.minus(range.reserved_delegations(prefix.prefix_len()));
            }
        }
    }
    Ok(capacity)
}

pub async fn apply_pd_pool(
    conn: &mut SqliteConnection,
    subnet: &Subnet6,
    pool_capacity: Capacity,
    is_create: bool,
) -> anyhow::Result<Capacity> {
    let updated = subnet.capacity.apply(pool_capacity, !is_create);
    db::update_subnet6_capacity(conn, subnet.id, updated).await?;
    Ok(updated)
}

// --- reserved ranges -------------------------------------------------------

/// Subnet-side charge of an IPv4 reserved range: the summed pool
/// intersections, or the full range size when no pool intersects. Creates are
/// refused upstream when the charge exceeds the subnet's remaining capacity,
/// so the subtraction in `apply_reserved_pool4` never clamps at zero and the
/// later delete credits exactly what the create took.
pub async fn reserved_pool4_charge(
    conn: &mut SqliteConnection,
    subnet: &Subnet4,
    range: &Ip4Range,
) -> anyhow::Result<u64> {
    let mut total: u64 = 0;
    for pool in db::list_pools4(conn, subnet.id).await? {
        total += pool.range()?.intersect_size(range);
    }
    Ok(if total > 0 { total } else { range.size() })
}

/// Subnet-side charge of an IPv6 reserved range.
pub async fn reserved_pool6_charge(
    conn: &mut SqliteConnection,
    subnet: &Subnet6,
    range: &Ip6Range,
) -> anyhow::Result<Capacity> {
    let mut total = Capacity::ZERO;
    for pool in db::list_pools6(conn, subnet.id).await? {
        total = total.plus(pool.range()?.intersect_size(range));
    }
    Ok(if total != Capacity::ZERO {
        total
    } else {
        range.size()
    })
}

/// Subnet-side charge of a reserved delegation range, in delegation units of
/// each overlapping pd-pool.
pub async fn reserved_pd_pool_charge(
    conn: &mut SqliteConnection,
    subnet: &Subnet6,
    range: &PdRange,
) -> anyhow::Result<Capacity> {
    let mut total = Capacity::ZERO;
    for pool in db::list_pd_pools(conn, subnet.id).await? {
        let pool_range = pool.range()?;
        if pool_range.overlaps_net(&range.net) {
            total = total.plus(pool_range.reserved_delegations(range.net.prefix_len()));
        }
    }
    Ok(if total != Capacity::ZERO {
        total
    } else {
        range.capacity()
    })
}

/// Insert or remove an IPv4 reserved range: every intersecting pool loses or
/// regains the intersection, the subnet moves by the summed total. With no
/// intersecting pool the full range size lands on the subnet alone.
pub async fn apply_reserved_pool4(
    conn: &mut SqliteConnection,
    subnet: &Subnet4,
    range: &Ip4Range,
    is_create: bool,
) -> anyhow::Result<()> {
    let mut total: u64 = 0;
    for pool in db::list_pools4(conn, subnet.id).await? {
        let overlap = pool.range()?.intersect_size(range);
        if overlap > 0 {
            let updated = shift_u64(pool.capacity, overlap, is_create);
            db::update_pool4_capacity(conn, pool.id, updated).await?;
            total += overlap;
        }
    }
    let subnet_delta = if total > 0 { total } else { range.size() };
    let updated = shift_u64(subnet.capacity, subnet_delta, is_create);
    db::update_subnet4_capacity(conn, subnet.id, updated).await?;
    Ok(())
}

pub async fn apply_reserved_pool6(
    conn: &mut SqliteConnection,
    subnet: &Subnet6,
    range: &Ip6Range,
    is_create: bool,
) -> anyhow::Result<()> {
    let mut total = Capacity::ZERO;
    for pool in db::list_pools6(conn, subnet.id).await? {
        let overlap = pool.range()?.intersect_size(range);
        if overlap != Capacity::ZERO {
            let updated = pool.capacity.apply(overlap, is_create);
            db::update_pool6_capacity(conn, pool.id, updated).await?;
            total = total.plus(overlap);
        }
    }
    let subnet_delta = if total != Capacity::ZERO {
        total
    } else {
        range.size()
    };
    let updated = subnet.capacity.apply(subnet_delta, is_create);
    db::update_subnet6_capacity(conn, subnet.id, updated).await?;
    Ok(())
}

/// Insert or remove a reserved delegation range against the subnet's
/// pd-pools. Per-pool consumption follows the delegation-unit rule keyed on
/// the reserved prefix length.
pub async fn apply_reserved_pd_pool(
    conn: &mut SqliteConnection,
    subnet: &Subnet6,
    range: &PdRange,
    is_create: bool,
) -> anyhow::Result<()> {
    let mut total = Capacity::ZERO;
    for pool in db::list_pd_pools(conn, subnet.id).await? {
        let pool_range = pool.range()?;
        if pool_range.overlaps_net(&range.net) {
            let overlap = pool_range.reserved_delegations(range.net.prefix_len());
            let updated = pool.capacity.apply(overlap, is_create);
            db::update_pd_pool_capacity(conn, pool.id, updated).await?;
            total = total.plus(overlap);
        }
    }
    let subnet_delta = if total != Capacity::ZERO {
        total
    } else {
        range.capacity()
    };
    let updated = subnet.capacity.apply(subnet_delta, is_create);
    db::update_subnet6_capacity(conn, subnet.id, updated).await?;
    Ok(())
}

// --- reservations ----------------------------------------------------------

/// An IPv4 reservation claims exactly one address: the containing pool, if
/// any, loses one unit, and the subnet always moves by one.
pub async fn apply_reservation4(
    conn: &mut SqliteConnection,
    subnet: &Subnet4,
    ip: Ipv4Addr,
    is_create: bool,
) -> anyhow::Result<()> {
    for pool in db::list_pools4(conn, subnet.id).await? {
        if pool.range()?.contains(ip) {
            let updated = shift_u64(pool.capacity, 1, is_create);
            db::update_pool4_capacity(conn, pool.id, updated).await?;
            break;
        }
    }
    let updated = shift_u64(subnet.capacity, 1, is_create);
    db::update_subnet4_capacity(conn, subnet.id, updated).await?;
    Ok(())
}

/// An IPv6 reservation's addresses and prefixes are resolved independently:
/// each in-pool address costs its pool one unit, each prefix costs every
/// overlapping pd-pool its delegation count, and the subnet moves by the
/// total number of claims.
pub async fn apply_reservation6(
    conn: &mut SqliteConnection,
    subnet: &Subnet6,
    reservation: &Reservation6,
    is_create: bool,
) -> anyhow::Result<()> {
    let pools: Vec<Pool6> = db::list_pools6(conn, subnet.id).await?;
    for ip in &reservation.ip_addresses {
        for pool in &pools {
            if pool.range()?.contains(*ip) {
                // Read back the row: an earlier address in this reservation
                // may already have moved this pool's counter.
                let current = db::get_pool6(conn, pool.id)
                    .await?
                    .map(|p| p.capacity)
                    .unwrap_or(Capacity::ZERO);
                let updated = current.apply(Capacity::Bounded(1), is_create);
                db::update_pool6_capacity(conn, pool.id, updated).await?;
                break;
            }
        }
    }

    let pd_pools: Vec<PdPool> = db::list_pd_pools(conn, subnet.id).await?;
    for prefix in &reservation.prefixes {
        for pool in &pd_pools {
            let pool_range = pool.range()?;
            if pool_range.overlaps_net(prefix) {
                let overlap = pool_range.reserved_delegations(prefix.prefix_len());
                let current = db::get_pd_pool(conn, pool.id)
                    .await?
                    .map(|p| p.capacity)
                    .unwrap_or(Capacity::ZERO);
                let updated = current.apply(overlap, is_create);
                db::update_pd_pool_capacity(conn, pool.id, updated).await?;
            }
        }
    }

    let claimed = Capacity::Bounded(reservation.claimed_count() as u128);
    let updated = subnet.capacity.apply(claimed, is_create);
    db::update_subnet6_capacity(conn, subnet.id, updated).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;
    use warden_common::models::{Reservation4, ReservedPool4};

    async fn setup() -> (SqlitePool, Subnet4) {
        let pool = db::init_db(":memory:").await.unwrap();
        let mut subnet = Subnet4::new("10.0.0.0/24".parse().unwrap());
        subnet.subnet_id = 1;
        let mut conn = pool.acquire().await.unwrap();
        db::insert_subnet4(&mut conn, &subnet).await.unwrap();
        drop(conn);
        (pool, subnet)
    }

    async fn add_pool4(pool: &SqlitePool, subnet: &Subnet4, begin: &str, end: &str) -> Pool4 {
        let mut conn = pool.acquire().await.unwrap();
        let mut p = Pool4::new(subnet.id, begin.parse().unwrap(), end.parse().unwrap());
        let range = p.range().unwrap();
        p.capacity = pool4_initial_capacity(&mut conn, subnet, &range)
            .await
            .unwrap();
        db::insert_pool4(&mut conn, &p).await.unwrap();
        apply_pool4(&mut conn, subnet, p.capacity, true).await.unwrap();
        p
    }

    async fn subnet4_capacity(pool: &SqlitePool, id: uuid::Uuid) -> u64 {
        let mut conn = pool.acquire().await.unwrap();
        db::get_subnet4(&mut conn, id).await.unwrap().unwrap().capacity
    }

    async fn pool4_capacity(pool: &SqlitePool, id: uuid::Uuid) -> u64 {
        let mut conn = pool.acquire().await.unwrap();
        db::get_pool4(&mut conn, id).await.unwrap().unwrap().capacity
    }

    // Deterministic generator for the randomized sequence test; no need to
    // pull in a crate for a shuffle.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.0 >> 33
        }

        fn below(&mut self, n: u64) -> u64 {
            self.next() % n
        }
    }

    /// Random create/delete sequences over disjoint-by-construction reserved
    /// ranges: the counters must track the exact reserved sum at every step,
    /// never clamp, and return to the starting point once everything is
    /// deleted.
    #[tokio::test]
    async fn test_randomized_reserved_sequences_keep_counters_exact() {
        for seed in [7u64, 1999, 0xdead_beef] {
            let store = db::init_db(":memory:").await.unwrap();
            let mut subnet = Subnet4::new("10.0.0.0/16".parse().unwrap());
            subnet.subnet_id = 1;
            {
                let mut conn = store.acquire().await.unwrap();
                db::insert_subnet4(&mut conn, &subnet).await.unwrap();
            }
            let pool = add_pool4(&store, &subnet, "10.0.1.0", "10.0.40.255").await;
            let initial = pool.capacity;
            assert_eq!(initial, 40 * 256);

            let mut rng = Lcg(seed);
            // One candidate range per /24 block, disjoint by construction;
            // blocks 1..=40 sit inside the pool, 41..=50 outside it.
            let ranges: Vec<Ip4Range> = (1..=50u32)
                .map(|block| {
                    let start = (10u32 << 24) | (block << 8) | rng.below(200) as u32;
                    let len = 1 + rng.below(50) as u32;
                    Ip4Range::new(Ipv4Addr::from(start), Ipv4Addr::from(start + len - 1))
                        .unwrap()
                })
                .collect();

            let mut active = vec![false; ranges.len()];
            let mut expected_pool = initial;
            let mut expected_subnet = initial;
            for _ in 0..150 {
                let i = rng.below(ranges.len() as u64) as usize;
                let is_create = !active[i];
                active[i] = is_create;
                let size = ranges[i].size();
                {
                    let mut conn = store.acquire().await.unwrap();
                    let s = db::get_subnet4(&mut conn, subnet.id).await.unwrap().unwrap();
                    apply_reserved_pool4(&mut conn, &s, &ranges[i], is_create)
                        .await
                        .unwrap();
                }
                if i < 40 {
                    expected_pool = if is_create {
                        expected_pool - size
                    } else {
                        expected_pool + size
                    };
                }
                expected_subnet = if is_create {
                    expected_subnet - size
                } else {
                    expected_subnet + size
                };
                assert_eq!(pool4_capacity(&store, pool.id).await, expected_pool);
                assert_eq!(subnet4_capacity(&store, subnet.id).await, expected_subnet);
            }

            // Tear the remainder down; the counters land exactly where they
            // started.
            for (i, range) in ranges.iter().enumerate() {
                if active[i] {
                    let mut conn = store.acquire().await.unwrap();
                    let s = db::get_subnet4(&mut conn, subnet.id).await.unwrap().unwrap();
                    apply_reserved_pool4(&mut conn, &s, range, false).await.unwrap();
                }
            }
            assert_eq!(pool4_capacity(&store, pool.id).await, initial);
            assert_eq!(subnet4_capacity(&store, subnet.id).await, initial);
        }
    }

    #[tokio::test]
    async fn test_reserved_range_shrinks_pool_and_subnet() {
        let (store, subnet) = setup().await;
        let p = add_pool4(&store, &subnet, "10.0.0.10", "10.0.0.200").await;
        assert_eq!(p.capacity, 191);
        assert_eq!(subnet4_capacity(&store, subnet.id).await, 191);

        let range =
            Ip4Range::new("10.0.0.50".parse().unwrap(), "10.0.0.59".parse().unwrap()).unwrap();
        let subnet = {
            let mut conn = store.acquire().await.unwrap();
            let s = db::get_subnet4(&mut conn, subnet.id).await.unwrap().unwrap();
            apply_reserved_pool4(&mut conn, &s, &range, true).await.unwrap();
            s
        };
        assert_eq!(pool4_capacity(&store, p.id).await, 181);
        assert_eq!(subnet4_capacity(&store, subnet.id).await, 181);

        // Delete is the exact inverse.
        let mut conn = store.acquire().await.unwrap();
        let s = db::get_subnet4(&mut conn, subnet.id).await.unwrap().unwrap();
        apply_reserved_pool4(&mut conn, &s, &range, false).await.unwrap();
        drop(conn);
        assert_eq!(pool4_capacity(&store, p.id).await, 191);
        assert_eq!(subnet4_capacity(&store, subnet.id).await, 191);
    }

    #[tokio::test]
    async fn test_reserved_range_spanning_two_pools_sums_overlaps() {
        let (store, subnet) = setup().await;
        let a = add_pool4(&store, &subnet, "10.0.0.10", "10.0.0.50").await;
        let subnet = {
            let mut conn = store.acquire().await.unwrap();
            db::get_subnet4(&mut conn, subnet.id).await.unwrap().unwrap()
        };
        let b = add_pool4(&store, &subnet, "10.0.0.100", "10.0.0.150").await;
        assert_eq!(subnet4_capacity(&store, subnet.id).await, 41 + 51);

        // Covers the top 11 of pool a and the bottom 6 of pool b.
        let range =
            Ip4Range::new("10.0.0.40".parse().unwrap(), "10.0.0.105".parse().unwrap()).unwrap();
        let mut conn = store.acquire().await.unwrap();
        let s = db::get_subnet4(&mut conn, subnet.id).await.unwrap().unwrap();
        apply_reserved_pool4(&mut conn, &s, &range, true).await.unwrap();
        drop(conn);

        assert_eq!(pool4_capacity(&store, a.id).await, 41 - 11);
        assert_eq!(pool4_capacity(&store, b.id).await, 51 - 6);
        assert_eq!(subnet4_capacity(&store, subnet.id).await, 92 - 17);
    }

    #[tokio::test]
    async fn test_reserved_range_outside_all_pools_hits_subnet_only() {
        let (store, subnet) = setup().await;
        let p = add_pool4(&store, &subnet, "10.0.0.10", "10.0.0.50").await;

        let range =
            Ip4Range::new("10.0.0.200".parse().unwrap(), "10.0.0.209".parse().unwrap()).unwrap();
        let mut conn = store.acquire().await.unwrap();
        let s = db::get_subnet4(&mut conn, subnet.id).await.unwrap().unwrap();
        apply_reserved_pool4(&mut conn, &s, &range, true).await.unwrap();
        drop(conn);

        assert_eq!(pool4_capacity(&store, p.id).await, 41);
        assert_eq!(subnet4_capacity(&store, subnet.id).await, 31);
    }

    #[tokio::test]
    async fn test_reservation4_in_pool_and_out_of_pool() {
        let (store, subnet) = setup().await;
        let p = add_pool4(&store, &subnet, "10.0.0.10", "10.0.0.50").await;

        let mut conn = store.acquire().await.unwrap();
        let s = db::get_subnet4(&mut conn, subnet.id).await.unwrap().unwrap();
        apply_reservation4(&mut conn, &s, "10.0.0.20".parse().unwrap(), true)
            .await
            .unwrap();
        let s = db::get_subnet4(&mut conn, subnet.id).await.unwrap().unwrap();
        apply_reservation4(&mut conn, &s, "10.0.0.200".parse().unwrap(), true)
            .await
            .unwrap();
        drop(conn);

        // In-pool claim hits the pool, both claims hit the subnet.
        assert_eq!(pool4_capacity(&store, p.id).await, 40);
        assert_eq!(subnet4_capacity(&store, subnet.id).await, 39);
    }

    #[tokio::test]
    async fn test_pool_created_over_existing_reserved_range() {
        let (store, subnet) = setup().await;
        let mut conn = store.acquire().await.unwrap();
        let reserved = ReservedPool4::new(
            subnet.id,
            "10.0.0.50".parse().unwrap(),
            "10.0.0.59".parse().unwrap(),
        );
        db::insert_reserved_pool4(&mut conn, &reserved).await.unwrap();
        let r = Reservation4 {
            id: uuid::Uuid::now_v7(),
            subnet_id: subnet.id,
            hw_address: Some("aa:bb:cc:dd:ee:ff".to_string()),
            hostname: None,
            ip_address: "10.0.0.30".parse().unwrap(),
            comment: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        db::insert_reservation4(&mut conn, &r).await.unwrap();

        let s = db::get_subnet4(&mut conn, subnet.id).await.unwrap().unwrap();
        let range =
            Ip4Range::new("10.0.0.10".parse().unwrap(), "10.0.0.200".parse().unwrap()).unwrap();
        let capacity = pool4_initial_capacity(&mut conn, &s, &range).await.unwrap();
        // 191 addresses minus the 10 reserved minus the 1 reservation.
        assert_eq!(capacity, 180);
    }

    #[tokio::test]
    async fn test_pd_pool_delegation_accounting() {
        let store = db::init_db(":memory:").await.unwrap();
        let mut subnet = Subnet6::new("2001:db8::/48".parse().unwrap(), false);
        subnet.subnet_id = 1;
        let mut conn = store.acquire().await.unwrap();
        db::insert_subnet6(&mut conn, &subnet).await.unwrap();

        let mut pd = PdPool::new(subnet.id, "2001:db8::/56".parse().unwrap(), 64);
        let range = pd.range().unwrap();
        pd.capacity = pd_pool_initial_capacity(&mut conn, &subnet, &range).await.unwrap();
        assert_eq!(pd.capacity, Capacity::Bounded(256));
        db::insert_pd_pool(&mut conn, &pd).await.unwrap();
        apply_pd_pool(&mut conn, &subnet, pd.capacity, true).await.unwrap();

        // Reserve a /60 slice: 2^(64-60) = 16 delegation units.
        let reserved = PdRange::new("2001:db8:0:10::/60".parse().unwrap(), 64).unwrap();
        let s = db::get_subnet6(&mut conn, subnet.id).await.unwrap().unwrap();
        apply_reserved_pd_pool(&mut conn, &s, &reserved, true).await.unwrap();

        let pd_now = db::get_pd_pool(&mut conn, pd.id).await.unwrap().unwrap();
        assert_eq!(pd_now.capacity, Capacity::Bounded(240));
        let s = db::get_subnet6(&mut conn, subnet.id).await.unwrap().unwrap();
        assert_eq!(s.capacity, Capacity::Bounded(240));

        apply_reserved_pd_pool(&mut conn, &s, &reserved, false).await.unwrap();
        let pd_now = db::get_pd_pool(&mut conn, pd.id).await.unwrap().unwrap();
        assert_eq!(pd_now.capacity, Capacity::Bounded(256));
        let s = db::get_subnet6(&mut conn, subnet.id).await.unwrap().unwrap();
        assert_eq!(s.capacity, Capacity::Bounded(256));
    }

    #[tokio::test]
    async fn test_reservation6_claims_move_subnet_by_total() {
        let store = db::init_db(":memory:").await.unwrap();
        let mut subnet = Subnet6::new("2001:db8::/48".parse().unwrap(), false);
        subnet.subnet_id = 1;
        let mut conn = store.acquire().await.unwrap();
        db::insert_subnet6(&mut conn, &subnet).await.unwrap();

        let mut p = Pool6::new(
            subnet.id,
            "2001:db8::10".parse().unwrap(),
            "2001:db8::ff".parse().unwrap(),
        );
        let range = p.range().unwrap();
        p.capacity = pool6_initial_capacity(&mut conn, &subnet, &range).await.unwrap();
        db::insert_pool6(&mut conn, &p).await.unwrap();
        let before = apply_pool6(&mut conn, &subnet, p.capacity, true).await.unwrap();

        let r = Reservation6 {
            id: uuid::Uuid::now_v7(),
            subnet_id: subnet.id,
            duid: Some("000300011234".to_string()),
            hw_address: None,
            hostname: None,
            ip_addresses: vec!["2001:db8::20".parse().unwrap(), "2001:db8::300".parse().unwrap()],
            prefixes: vec![],
            comment: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let s = db::get_subnet6(&mut conn, subnet.id).await.unwrap().unwrap();
        apply_reservation6(&mut conn, &s, &r, true).await.unwrap();

        let p_now = db::get_pool6(&mut conn, p.id).await.unwrap().unwrap();
        assert_eq!(p_now.capacity, p.capacity.minus(Capacity::Bounded(1)));
        let s = db::get_subnet6(&mut conn, subnet.id).await.unwrap().unwrap();
        assert_eq!(s.capacity, before.minus(Capacity::Bounded(2)));
    }
}
