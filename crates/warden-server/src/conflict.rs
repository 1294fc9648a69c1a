//! Conflict checks run inside the mutating transaction, after the parent row
//! has been re-read. Every check reports the first conflicting sibling by id
//! so the API error names the offender.
//!
//! Pure functions take the freshly-listed siblings; the IPv4 reservation
//! identifier checks go through the store because the uniqueness columns are
//! indexed there.

use ipnet::{Ipv4Net, Ipv6Net};
use sqlx::SqliteConnection;
use std::net::{Ipv4Addr, Ipv6Addr};
use uuid::Uuid;

use warden_common::models::{
    Pool4, Pool6, PdPool, Reservation4, Reservation6, ReservedPdPool, ReservedPool4, ReservedPool6,
    Subnet4, Subnet6,
};
use warden_common::range::{Ip4Range, Ip6Range, PdRange};

use crate::db::{self, Reservation4Field};

fn nets_overlap4(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

fn nets_overlap6(a: &Ipv6Net, b: &Ipv6Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

/// No two managed IPv4 subnets may overlap.
pub fn check_subnet4_overlap(
    prefix: &Ipv4Net,
    siblings: &[Subnet4],
    exclude: Option<Uuid>,
) -> Result<(), String> {
    for sibling in siblings {
        if Some(sibling.id) == exclude {
            continue;
        }
        if nets_overlap4(prefix, &sibling.prefix) {
            return Err(format!(
                "prefix {} overlaps subnet {} ({})",
                prefix, sibling.subnet_id, sibling.prefix
            ));
        }
    }
    Ok(())
}

pub fn check_subnet6_overlap(
    prefix: &Ipv6Net,
    siblings: &[Subnet6],
    exclude: Option<Uuid>,
) -> Result<(), String> {
    for sibling in siblings {
        if Some(sibling.id) == exclude {
            continue;
        }
        if nets_overlap6(prefix, &sibling.prefix) {
            return Err(format!(
                "prefix {} overlaps subnet {} ({})",
                prefix, sibling.subnet_id, sibling.prefix
            ));
        }
    }
    Ok(())
}

// --- containment -----------------------------------------------------------

pub fn range4_within_subnet(range: &Ip4Range, subnet: &Ipv4Net) -> Result<(), String> {
    if range.within(subnet) {
        Ok(())
    } else {
        Err(format!(
            "range {}-{} is not contained in subnet {}",
            range.begin, range.end, subnet
        ))
    }
}

pub fn range6_within_subnet(range: &Ip6Range, subnet: &Ipv6Net) -> Result<(), String> {
    if range.within(subnet) {
        Ok(())
    } else {
        Err(format!(
            "range {}-{} is not contained in subnet {}",
            range.begin, range.end, subnet
        ))
    }
}

pub fn pd_range_within_subnet(range: &PdRange, subnet: &Ipv6Net) -> Result<(), String> {
    if subnet.contains(&range.net.network()) && range.net.prefix_len() >= subnet.prefix_len() {
        Ok(())
    } else {
        Err(format!(
            "prefix {} is not contained in subnet {}",
            range.net, subnet
        ))
    }
}

pub fn address4_within_subnet(ip: Ipv4Addr, subnet: &Ipv4Net) -> Result<(), String> {
    if subnet.contains(&ip) {
        Ok(())
    } else {
        Err(format!("address {} is not in subnet {}", ip, subnet))
    }
}

pub fn address6_within_subnet(ip: Ipv6Addr, subnet: &Ipv6Net) -> Result<(), String> {
    if subnet.contains(&ip) {
        Ok(())
    } else {
        Err(format!("address {} is not in subnet {}", ip, subnet))
    }
}

// --- same-kind sibling overlap ---------------------------------------------

pub fn check_pool4_overlap(
    candidate: &Ip4Range,
    siblings: &[Pool4],
    exclude: Option<Uuid>,
) -> Result<(), String> {
    for sibling in siblings {
        if Some(sibling.id) == exclude {
            continue;
        }
        let range = sibling.range().map_err(|e| e.to_string())?;
        if candidate.overlaps(&range) {
            return Err(format!(
                "range {}-{} overlaps pool {} ({}-{})",
                candidate.begin, candidate.end, sibling.id, range.begin, range.end
            ));
        }
    }
    Ok(())
}

pub fn check_reserved_pool4_overlap(
    candidate: &Ip4Range,
    siblings: &[ReservedPool4],
    exclude: Option<Uuid>,
) -> Result<(), String> {
    for sibling in siblings {
        if Some(sibling.id) == exclude {
            continue;
        }
        let range = sibling.range().map_err(|e| e.to_string())?;
        if candidate.overlaps(&range) {
            return Err(format!(
                "range {}-{} overlaps reserved pool {} ({}-{})",
                candidate.begin, candidate.end, sibling.id, range.begin, range.end
            ));
        }
    }
    Ok(())
}

pub fn check_pool6_overlap(
    candidate: &Ip6Range,
    siblings: &[Pool6],
    exclude: Option<Uuid>,
) -> Result<(), String> {
    for sibling in siblings {
        if Some(sibling.id) == exclude {
            continue;
        }
        let range = sibling.range().map_err(|e| e.to_string())?;
        if candidate.overlaps(&range) {
            return Err(format!(
                "range {}-{} overlaps pool {} ({}-{})",
                candidate.begin, candidate.end, sibling.id, range.begin, range.end
            ));
        }
    }
    Ok(())
}

pub fn check_reserved_pool6_overlap(
    candidate: &Ip6Range,
    siblings: &[ReservedPool6],
    exclude: Option<Uuid>,
) -> Result<(), String> {
    for sibling in siblings {
        if Some(sibling.id) == exclude {
            continue;
        }
        let range = sibling.range().map_err(|e| e.to_string())?;
        if candidate.overlaps(&range) {
            return Err(format!(
                "range {}-{} overlaps reserved pool {} ({}-{})",
                candidate.begin, candidate.end, sibling.id, range.begin, range.end
            ));
        }
    }
    Ok(())
}

pub fn check_pd_pool_overlap(
    candidate: &PdRange,
    siblings: &[PdPool],
    exclude: Option<Uuid>,
) -> Result<(), String> {
    for sibling in siblings {
        if Some(sibling.id) == exclude {
            continue;
        }
        if candidate.overlaps_net(&sibling.prefix) {
            return Err(format!(
                "prefix {} overlaps pd-pool {} ({})",
                candidate.net, sibling.id, sibling.prefix
            ));
        }
    }
    Ok(())
}

pub fn check_reserved_pd_pool_overlap(
    candidate: &PdRange,
    siblings: &[ReservedPdPool],
    exclude: Option<Uuid>,
) -> Result<(), String> {
    for sibling in siblings {
        if Some(sibling.id) == exclude {
            continue;
        }
        if candidate.overlaps_net(&sibling.prefix) {
            return Err(format!(
                "prefix {} overlaps reserved pd-pool {} ({})",
                candidate.net, sibling.id, sibling.prefix
            ));
        }
    }
    Ok(())
}

// --- cross-kind disjointness -----------------------------------------------

/// A reserved range may not contain any reserved address; the two mechanisms
/// exclude the same capacity and must stay disjoint.
pub fn check_reserved4_vs_reservations(
    candidate: &Ip4Range,
    reservations: &[Reservation4],
) -> Result<(), String> {
    for r in reservations {
        if candidate.contains(r.ip_address) {
            return Err(format!(
                "range {}-{} covers reservation {} ({})",
                candidate.begin, candidate.end, r.id, r.ip_address
            ));
        }
    }
    Ok(())
}

pub fn check_reservation4_vs_reserved(
    ip: Ipv4Addr,
    reserved: &[ReservedPool4],
) -> Result<(), String> {
    for pool in reserved {
        let range = pool.range().map_err(|e| e.to_string())?;
        if range.contains(ip) {
            return Err(format!(
                "address {} falls in reserved pool {} ({}-{})",
                ip, pool.id, range.begin, range.end
            ));
        }
    }
    Ok(())
}

pub fn check_reserved6_vs_reservations(
    candidate: &Ip6Range,
    reservations: &[Reservation6],
) -> Result<(), String> {
    for r in reservations {
        for ip in &r.ip_addresses {
            if candidate.contains(*ip) {
                return Err(format!(
                    "range {}-{} covers reservation {} ({})",
                    candidate.begin, candidate.end, r.id, ip
                ));
            }
        }
    }
    Ok(())
}

pub fn check_reservation6_vs_reserved(
    r: &Reservation6,
    reserved: &[ReservedPool6],
    reserved_pd: &[ReservedPdPool],
) -> Result<(), String> {
    for pool in reserved {
        let range = pool.range().map_err(|e| e.to_string())?;
        for ip in &r.ip_addresses {
            if range.contains(*ip) {
                return Err(format!(
                    "address {} falls in reserved pool {} ({}-{})",
                    ip, pool.id, range.begin, range.end
                ));
            }
        }
    }
    for pool in reserved_pd {
        for prefix in &r.prefixes {
            if pool.prefix.contains(&prefix.network()) || prefix.contains(&pool.prefix.network()) {
                return Err(format!(
                    "prefix {} overlaps reserved pd-pool {} ({})",
                    prefix, pool.id, pool.prefix
                ));
            }
        }
    }
    Ok(())
}

/// A reserved delegation range may not overlap any reserved prefix.
pub fn check_reserved_pd_vs_reservations(
    candidate: &PdRange,
    reservations: &[Reservation6],
) -> Result<(), String> {
    for r in reservations {
        for prefix in &r.prefixes {
            if candidate.overlaps_net(prefix) {
                return Err(format!(
                    "prefix {} overlaps reservation {} ({})",
                    candidate.net, r.id, prefix
                ));
            }
        }
    }
    Ok(())
}

/// IPv4 reservation identifier uniqueness within a subnet: the MAC, the
/// hostname, and the address must each be unclaimed by any other row.
pub async fn check_reservation4_unique(
    conn: &mut SqliteConnection,
    r: &Reservation4,
    exclude: Option<Uuid>,
) -> anyhow::Result<Result<(), String>> {
    if let Some(mac) = r.hw_address.as_deref() {
        let count =
            db::count_reservation4_field(conn, r.subnet_id, Reservation4Field::HwAddress, mac, exclude)
                .await?;
        if count > 0 {
            return Ok(Err(format!("hw-address {} is already reserved", mac)));
        }
    }
    if let Some(host) = r.hostname.as_deref() {
        let count =
            db::count_reservation4_field(conn, r.subnet_id, Reservation4Field::Hostname, host, exclude)
                .await?;
        if count > 0 {
            return Ok(Err(format!("hostname {} is already reserved", host)));
        }
    }
    let ip = r.ip_address.to_string();
    let count =
        db::count_reservation4_field(conn, r.subnet_id, Reservation4Field::IpAddress, &ip, exclude)
            .await?;
    if count > 0 {
        return Ok(Err(format!("address {} is already reserved", ip)));
    }
    Ok(Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pool4(begin: &str, end: &str) -> Pool4 {
        Pool4::new(Uuid::now_v7(), begin.parse().unwrap(), end.parse().unwrap())
    }

    #[test]
    fn test_subnet4_overlap_detected() {
        let existing = Subnet4::new("10.0.0.0/16".parse().unwrap());
        let err = check_subnet4_overlap(&"10.0.5.0/24".parse().unwrap(), &[existing.clone()], None)
            .unwrap_err();
        assert!(err.contains("overlaps subnet"));
        // Self is excluded on update revalidation.
        check_subnet4_overlap(
            &"10.0.5.0/24".parse().unwrap(),
            &[existing.clone()],
            Some(existing.id),
        )
        .unwrap();
        check_subnet4_overlap(&"10.1.0.0/16".parse().unwrap(), &[], None).unwrap();
    }

    #[test]
    fn test_pool4_overlap_names_first_conflict() {
        let a = pool4("10.0.0.10", "10.0.0.50");
        let b = pool4("10.0.0.100", "10.0.0.150");
        let candidate = Ip4Range::new("10.0.0.40".parse().unwrap(), "10.0.0.120".parse().unwrap())
            .unwrap();
        let err = check_pool4_overlap(&candidate, &[a.clone(), b], None).unwrap_err();
        assert!(err.contains(&a.id.to_string()));
    }

    #[test]
    fn test_containment() {
        let subnet: Ipv4Net = "10.0.0.0/24".parse().unwrap();
        let inside =
            Ip4Range::new("10.0.0.10".parse().unwrap(), "10.0.0.20".parse().unwrap()).unwrap();
        let outside =
            Ip4Range::new("10.0.0.250".parse().unwrap(), "10.0.1.5".parse().unwrap()).unwrap();
        range4_within_subnet(&inside, &subnet).unwrap();
        assert!(range4_within_subnet(&outside, &subnet).is_err());

        let pd = PdRange::new("2001:db8:0:10::/60".parse().unwrap(), 64).unwrap();
        pd_range_within_subnet(&pd, &"2001:db8::/56".parse().unwrap()).unwrap();
        assert!(pd_range_within_subnet(&pd, &"2001:db9::/56".parse().unwrap()).is_err());
    }

    #[test]
    fn test_reserved_vs_reservation_disjoint() {
        let reservation = Reservation4 {
            id: Uuid::now_v7(),
            subnet_id: Uuid::now_v7(),
            hw_address: Some("aa:bb:cc:dd:ee:ff".to_string()),
            hostname: None,
            ip_address: "10.0.0.55".parse().unwrap(),
            comment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let covering =
            Ip4Range::new("10.0.0.50".parse().unwrap(), "10.0.0.59".parse().unwrap()).unwrap();
        assert!(check_reserved4_vs_reservations(&covering, &[reservation.clone()]).is_err());

        let disjoint =
            Ip4Range::new("10.0.0.60".parse().unwrap(), "10.0.0.69".parse().unwrap()).unwrap();
        check_reserved4_vs_reservations(&disjoint, &[reservation]).unwrap();
    }

    #[test]
    fn test_reserved_pd_vs_reserved_prefixes() {
        let r = Reservation6 {
            id: Uuid::now_v7(),
            subnet_id: Uuid::now_v7(),
            duid: Some("0003000112".to_string()),
            hw_address: None,
            hostname: None,
            ip_addresses: vec![],
            prefixes: vec!["2001:db8:0:10::/64".parse().unwrap()],
            comment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let covering = PdRange::new("2001:db8:0:10::/60".parse().unwrap(), 64).unwrap();
        assert!(check_reserved_pd_vs_reservations(&covering, &[r.clone()]).is_err());
        let disjoint = PdRange::new("2001:db8:0:20::/60".parse().unwrap(), 64).unwrap();
        check_reserved_pd_vs_reservations(&disjoint, &[r]).unwrap();
    }
}
