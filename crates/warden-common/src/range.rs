//! Address-range arithmetic for the capacity ledger and conflict checker.
//!
//! Ranges are inclusive on both ends. IPv4 math is plain `u32`/`u64`; IPv6
//! math works in `u128` and reports counts as [`Capacity`] so a full /0 span
//! cannot silently wrap.

use crate::capacity::Capacity;
use ipnet::{Ipv4Net, Ipv6Net};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid range: {0}")]
pub struct InvalidRange(pub String);

/// Inclusive IPv4 address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ip4Range {
    pub begin: Ipv4Addr,
    pub end: Ipv4Addr,
}

impl Ip4Range {
    pub fn new(begin: Ipv4Addr, end: Ipv4Addr) -> Result<Self, InvalidRange> {
        if u32::from(begin) > u32::from(end) {
            return Err(InvalidRange(format!("begin {} after end {}", begin, end)));
        }
        Ok(Self { begin, end })
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let ip = u32::from(ip);
        u32::from(self.begin) <= ip && ip <= u32::from(self.end)
    }

    pub fn overlaps(&self, other: &Ip4Range) -> bool {
        u32::from(self.begin) <= u32::from(other.end) && u32::from(other.begin) <= u32::from(self.end)
    }

    /// Number of addresses in the range.
    pub fn size(&self) -> u64 {
        u64::from(u32::from(self.end)) - u64::from(u32::from(self.begin)) + 1
    }

    /// Cardinality of the overlap with `other`, clipped to this range.
    pub fn intersect_size(&self, other: &Ip4Range) -> u64 {
        let lo = u32::from(self.begin).max(u32::from(other.begin));
        let hi = u32::from(self.end).min(u32::from(other.end));
        if lo > hi {
            0
        } else {
            u64::from(hi) - u64::from(lo) + 1
        }
    }

    /// Whole range inside the subnet prefix.
    pub fn within(&self, net: &Ipv4Net) -> bool {
        net.contains(&self.begin) && net.contains(&self.end)
    }
}

impl fmt::Display for Ip4Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.begin, self.end)
    }
}

/// Inclusive IPv6 address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ip6Range {
    pub begin: Ipv6Addr,
    pub end: Ipv6Addr,
}

impl Ip6Range {
    pub fn new(begin: Ipv6Addr, end: Ipv6Addr) -> Result<Self, InvalidRange> {
        if u128::from(begin) > u128::from(end) {
            return Err(InvalidRange(format!("begin {} after end {}", begin, end)));
        }
        Ok(Self { begin, end })
    }

    pub fn contains(&self, ip: Ipv6Addr) -> bool {
        let ip = u128::from(ip);
        u128::from(self.begin) <= ip && ip <= u128::from(self.end)
    }

    pub fn overlaps(&self, other: &Ip6Range) -> bool {
        u128::from(self.begin) <= u128::from(other.end)
            && u128::from(other.begin) <= u128::from(self.end)
    }

    pub fn size(&self) -> Capacity {
        let span = u128::from(self.end) - u128::from(self.begin);
        match span.checked_add(1) {
            Some(n) => Capacity::Bounded(n),
            None => Capacity::Unbounded,
        }
    }

    pub fn intersect_size(&self, other: &Ip6Range) -> Capacity {
        let lo = u128::from(self.begin).max(u128::from(other.begin));
        let hi = u128::from(self.end).min(u128::from(other.end));
        if lo > hi {
            Capacity::ZERO
        } else {
            match (hi - lo).checked_add(1) {
                Some(n) => Capacity::Bounded(n),
                None => Capacity::Unbounded,
            }
        }
    }

    pub fn within(&self, net: &Ipv6Net) -> bool {
        net.contains(&self.begin) && net.contains(&self.end)
    }
}

impl fmt::Display for Ip6Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.begin, self.end)
    }
}

/// A delegated-prefix pool range: the pool prefix plus the length handed out
/// to each client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdRange {
    pub net: Ipv6Net,
    pub delegated_len: u8,
}

impl PdRange {
    pub fn new(net: Ipv6Net, delegated_len: u8) -> Result<Self, InvalidRange> {
        if delegated_len > 128 {
            return Err(InvalidRange(format!(
                "delegated length {} exceeds 128",
                delegated_len
            )));
        }
        if delegated_len < net.prefix_len() {
            return Err(InvalidRange(format!(
                "delegated length {} shorter than pool prefix /{}",
                delegated_len,
                net.prefix_len()
            )));
        }
        Ok(Self { net, delegated_len })
    }

    /// Delegation units in the pool: 2^(delegatedLen - prefixLen).
    pub fn capacity(&self) -> Capacity {
        Capacity::pow2(u32::from(self.delegated_len) - u32::from(self.net.prefix_len()))
    }

    /// Aligned prefixes overlap exactly when one contains the other.
    pub fn overlaps_net(&self, other: &Ipv6Net) -> bool {
        self.net.contains(other) || other.contains(&self.net)
    }

    /// Delegation units consumed by an overlapping reserved prefix of length
    /// `other_len`.
    ///
    /// The boundary policy is exact: a reserved prefix at or above the pool
    /// prefix covers the whole pool, one at or below the delegated length
    /// covers a single delegation unit.
    pub fn reserved_delegations(&self, other_len: u8) -> Capacity {
        let prefix_len = self.net.prefix_len();
        if other_len <= prefix_len {
            Capacity::pow2(u32::from(self.delegated_len) - u32::from(prefix_len))
        } else if other_len >= self.delegated_len {
            Capacity::Bounded(1)
        } else {
            Capacity::pow2(u32::from(self.delegated_len) - u32::from(other_len))
        }
    }
}

impl fmt::Display for PdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dlen {}", self.net, self.delegated_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r4(begin: &str, end: &str) -> Ip4Range {
        Ip4Range::new(begin.parse().unwrap(), end.parse().unwrap()).unwrap()
    }

    fn r6(begin: &str, end: &str) -> Ip6Range {
        Ip6Range::new(begin.parse().unwrap(), end.parse().unwrap()).unwrap()
    }

    #[test]
    fn test_ip4_range_rejects_inverted_bounds() {
        assert!(Ip4Range::new("10.0.0.9".parse().unwrap(), "10.0.0.1".parse().unwrap()).is_err());
    }

    #[test]
    fn test_ip4_size_and_contains() {
        let range = r4("10.0.0.10", "10.0.0.200");
        assert_eq!(range.size(), 191);
        assert!(range.contains("10.0.0.10".parse().unwrap()));
        assert!(range.contains("10.0.0.200".parse().unwrap()));
        assert!(!range.contains("10.0.0.9".parse().unwrap()));
        assert!(!range.contains("10.0.0.201".parse().unwrap()));
    }

    #[test]
    fn test_ip4_overlap_is_symmetric() {
        let a = r4("10.0.0.1", "10.0.0.100");
        let b = r4("10.0.0.100", "10.0.0.150");
        let c = r4("10.0.0.151", "10.0.0.200");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!b.overlaps(&c));
        assert!(!c.overlaps(&b));
        // A range overlaps itself when re-checked.
        assert!(a.overlaps(&a));
    }

    #[test]
    fn test_ip4_intersect_is_clipped() {
        let pool = r4("10.0.0.10", "10.0.0.200");
        let reserved = r4("10.0.0.50", "10.0.0.59");
        assert_eq!(pool.intersect_size(&reserved), 10);
        // Reserved range hanging off the pool edge only counts the inside part.
        let overhang = r4("10.0.0.190", "10.0.0.250");
        assert_eq!(pool.intersect_size(&overhang), 11);
        let disjoint = r4("10.0.1.1", "10.0.1.9");
        assert_eq!(pool.intersect_size(&disjoint), 0);
    }

    #[test]
    fn test_ip4_within_subnet() {
        let net: Ipv4Net = "10.0.0.0/24".parse().unwrap();
        assert!(r4("10.0.0.10", "10.0.0.200").within(&net));
        assert!(!r4("10.0.0.200", "10.0.1.10").within(&net));
    }

    #[test]
    fn test_ip4_full_range_size() {
        let all = r4("0.0.0.0", "255.255.255.255");
        assert_eq!(all.size(), 1u64 << 32);
    }

    #[test]
    fn test_ip6_size_and_intersect() {
        let range = r6("2001:db8::1", "2001:db8::100");
        assert_eq!(range.size(), Capacity::Bounded(0x100));
        let other = r6("2001:db8::f0", "2001:db8::1ff");
        assert_eq!(range.intersect_size(&other), Capacity::Bounded(0x11));
        assert!(range.overlaps(&other));
        assert!(other.overlaps(&range));
    }

    #[test]
    fn test_ip6_full_range_saturates() {
        let all = r6("::", "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff");
        assert_eq!(all.size(), Capacity::Unbounded);
    }

    #[test]
    fn test_ip6_within_subnet() {
        let net: Ipv6Net = "2001:db8::/64".parse().unwrap();
        assert!(r6("2001:db8::10", "2001:db8::ff").within(&net));
        assert!(!r6("2001:db8::10", "2001:db8:1::1").within(&net));
    }

    fn pd(net: &str, dlen: u8) -> PdRange {
        PdRange::new(net.parse().unwrap(), dlen).unwrap()
    }

    #[test]
    fn test_pd_capacity() {
        assert_eq!(pd("2001:db8::/56", 64).capacity(), Capacity::Bounded(256));
        assert_eq!(pd("2001:db8::/48", 64).capacity(), Capacity::Bounded(65536));
        assert_eq!(pd("2001:db8::/64", 64).capacity(), Capacity::Bounded(1));
    }

    #[test]
    fn test_pd_rejects_delegated_shorter_than_prefix() {
        let net: Ipv6Net = "2001:db8::/56".parse().unwrap();
        assert!(PdRange::new(net, 48).is_err());
    }

    #[test]
    fn test_reserved_delegations_boundary_rule() {
        let pool = pd("2001:db8::/48", 64);
        // Between prefixLen and delegatedLen: 2^(64-56).
        assert_eq!(pool.reserved_delegations(56), Capacity::Bounded(256));
        // Shorter than the pool prefix covers the whole pool: 2^(64-48).
        assert_eq!(pool.reserved_delegations(40), Capacity::Bounded(65536));
        // Longer than the delegated length covers a single unit.
        assert_eq!(pool.reserved_delegations(70), Capacity::Bounded(1));
        // Exact boundaries.
        assert_eq!(pool.reserved_delegations(48), Capacity::Bounded(65536));
        assert_eq!(pool.reserved_delegations(64), Capacity::Bounded(1));
    }

    #[test]
    fn test_pd_overlap() {
        let pool = pd("2001:db8::/56", 64);
        let inside: Ipv6Net = "2001:db8:0:10::/60".parse().unwrap();
        let outside: Ipv6Net = "2001:db8:1::/56".parse().unwrap();
        let covering: Ipv6Net = "2001:db8::/48".parse().unwrap();
        assert!(pool.overlaps_net(&inside));
        assert!(!pool.overlaps_net(&outside));
        assert!(pool.overlaps_net(&covering));
    }
}
