//! Entity models for the management plane.
//!
//! Every entity carries a UUIDv7 primary key and created/updated timestamps.
//! Subnets additionally carry the server-assigned numeric subnet id handed to
//! the remote agents.

use crate::capacity::Capacity;
use crate::range::{Ip4Range, Ip6Range, InvalidRange, PdRange};
use chrono::{DateTime, Utc};
use ipnet::{Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use uuid::Uuid;

/// An IPv4 subnet under management.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subnet4 {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    /// Server-assigned numeric id, max(existing)+1 starting at 1.
    #[serde(default)]
    pub subnet_id: u64,
    pub prefix: Ipv4Net,
    /// Allocatable addresses: sum of pool capacities plus out-of-pool
    /// reservations, minus reserved ranges.
    #[serde(default)]
    pub capacity: u64,
    /// Agent node ids this subnet is served by.
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default = "default_valid_lifetime")]
    pub valid_lifetime: u32,
    #[serde(default)]
    pub domain_servers: Vec<Ipv4Addr>,
    #[serde(default)]
    pub routers: Vec<Ipv4Addr>,
    #[serde(default)]
    pub client_class_whitelist: Vec<String>,
    #[serde(default)]
    pub client_class_blacklist: Vec<String>,
    #[serde(default)]
    pub relay_addresses: Vec<Ipv4Addr>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_valid_lifetime() -> u32 {
    14400
}

impl Subnet4 {
    pub fn new(prefix: Ipv4Net) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            subnet_id: 0,
            prefix,
            capacity: 0,
            nodes: Vec::new(),
            valid_lifetime: default_valid_lifetime(),
            domain_servers: Vec::new(),
            routers: Vec::new(),
            client_class_whitelist: Vec::new(),
            client_class_blacklist: Vec::new(),
            relay_addresses: Vec::new(),
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An IPv6 subnet under management.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subnet6 {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    #[serde(default)]
    pub subnet_id: u64,
    pub prefix: Ipv6Net,
    #[serde(default = "zero_capacity")]
    pub capacity: Capacity,
    #[serde(default)]
    pub nodes: Vec<String>,
    /// EUI64 autoconfiguration: capacity is unbounded and reservations and
    /// pd-pools are rejected.
    #[serde(default)]
    pub use_eui64: bool,
    #[serde(default = "default_valid_lifetime")]
    pub valid_lifetime: u32,
    #[serde(default)]
    pub domain_servers: Vec<Ipv6Addr>,
    #[serde(default)]
    pub client_class_whitelist: Vec<String>,
    #[serde(default)]
    pub client_class_blacklist: Vec<String>,
    #[serde(default)]
    pub relay_addresses: Vec<Ipv6Addr>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn zero_capacity() -> Capacity {
    Capacity::ZERO
}

impl Subnet6 {
    pub fn new(prefix: Ipv6Net, use_eui64: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            subnet_id: 0,
            prefix,
            capacity: if use_eui64 {
                Capacity::Unbounded
            } else {
                Capacity::ZERO
            },
            nodes: Vec::new(),
            use_eui64,
            valid_lifetime: default_valid_lifetime(),
            domain_servers: Vec::new(),
            client_class_whitelist: Vec::new(),
            client_class_blacklist: Vec::new(),
            relay_addresses: Vec::new(),
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Dynamic IPv4 allocation range inside a subnet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pool4 {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub subnet_id: Uuid,
    pub begin_address: Ipv4Addr,
    pub end_address: Ipv4Addr,
    /// Range size minus reservations and reserved sub-ranges inside it.
    #[serde(default)]
    pub capacity: u64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Pool4 {
    pub fn new(subnet_id: Uuid, begin: Ipv4Addr, end: Ipv4Addr) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            subnet_id,
            begin_address: begin,
            end_address: end,
            capacity: 0,
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn range(&self) -> Result<Ip4Range, InvalidRange> {
        Ip4Range::new(self.begin_address, self.end_address)
    }
}

/// IPv4 range excluded from dynamic allocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservedPool4 {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub subnet_id: Uuid,
    pub begin_address: Ipv4Addr,
    pub end_address: Ipv4Addr,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ReservedPool4 {
    pub fn new(subnet_id: Uuid, begin: Ipv4Addr, end: Ipv4Addr) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            subnet_id,
            begin_address: begin,
            end_address: end,
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn range(&self) -> Result<Ip4Range, InvalidRange> {
        Ip4Range::new(self.begin_address, self.end_address)
    }
}

/// Fixed IPv4 address bound to exactly one of a MAC address or a hostname.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation4 {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub subnet_id: Uuid,
    #[serde(default)]
    pub hw_address: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    pub ip_address: Ipv4Addr,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Reservation4 {
    /// Exactly one identifying key must be set.
    pub fn validate(&self) -> Result<(), String> {
        match (self.hw_address.as_deref(), self.hostname.as_deref()) {
            (Some(mac), None) if !mac.is_empty() => Ok(()),
            (None, Some(host)) if !host.is_empty() => Ok(()),
            (Some(_), Some(_)) => Err("both hw-address and hostname set".to_string()),
            _ => Err("one of hw-address or hostname is required".to_string()),
        }
    }
}

/// Dynamic IPv6 allocation range inside a subnet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pool6 {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub subnet_id: Uuid,
    pub begin_address: Ipv6Addr,
    pub end_address: Ipv6Addr,
    #[serde(default = "zero_capacity")]
    pub capacity: Capacity,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Pool6 {
    pub fn new(subnet_id: Uuid, begin: Ipv6Addr, end: Ipv6Addr) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            subnet_id,
            begin_address: begin,
            end_address: end,
            capacity: Capacity::ZERO,
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn range(&self) -> Result<Ip6Range, InvalidRange> {
        Ip6Range::new(self.begin_address, self.end_address)
    }
}

/// IPv6 range excluded from dynamic allocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservedPool6 {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub subnet_id: Uuid,
    pub begin_address: Ipv6Addr,
    pub end_address: Ipv6Addr,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ReservedPool6 {
    pub fn new(subnet_id: Uuid, begin: Ipv6Addr, end: Ipv6Addr) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            subnet_id,
            begin_address: begin,
            end_address: end,
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn range(&self) -> Result<Ip6Range, InvalidRange> {
        Ip6Range::new(self.begin_address, self.end_address)
    }
}

/// Fixed IPv6 binding: DUID, MAC, or hostname, each with a list of addresses
/// and/or delegated prefixes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation6 {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub subnet_id: Uuid,
    #[serde(default)]
    pub duid: Option<String>,
    #[serde(default)]
    pub hw_address: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub ip_addresses: Vec<Ipv6Addr>,
    #[serde(default)]
    pub prefixes: Vec<Ipv6Net>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Reservation6 {
    pub fn validate(&self) -> Result<(), String> {
        let keys = [
            self.duid.as_deref(),
            self.hw_address.as_deref(),
            self.hostname.as_deref(),
        ]
        .iter()
        .filter(|k| k.map_or(false, |s| !s.is_empty()))
        .count();
        if keys != 1 {
            return Err("exactly one of duid, hw-address or hostname is required".to_string());
        }
        if self.ip_addresses.is_empty() && self.prefixes.is_empty() {
            return Err("at least one address or prefix is required".to_string());
        }
        Ok(())
    }

    /// Addresses plus prefixes claimed, as counted against the subnet.
    pub fn claimed_count(&self) -> u64 {
        (self.ip_addresses.len() + self.prefixes.len()) as u64
    }
}

/// IPv6 delegated-prefix pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdPool {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub subnet_id: Uuid,
    pub prefix: Ipv6Net,
    pub delegated_len: u8,
    #[serde(default = "zero_capacity")]
    pub capacity: Capacity,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl PdPool {
    pub fn new(subnet_id: Uuid, prefix: Ipv6Net, delegated_len: u8) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            subnet_id,
            prefix,
            delegated_len,
            capacity: Capacity::ZERO,
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn range(&self) -> Result<PdRange, InvalidRange> {
        PdRange::new(self.prefix, self.delegated_len)
    }
}

/// Delegated-prefix range excluded from delegation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservedPdPool {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub subnet_id: Uuid,
    pub prefix: Ipv6Net,
    pub delegated_len: u8,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ReservedPdPool {
    pub fn new(subnet_id: Uuid, prefix: Ipv6Net, delegated_len: u8) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            subnet_id,
            prefix,
            delegated_len,
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn range(&self) -> Result<PdRange, InvalidRange> {
        PdRange::new(self.prefix, self.delegated_len)
    }
}

/// Match operator for a client-class filter expression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum MatchRule {
    /// Option value equals the given string.
    Equals(String),
    /// Option value contains the given substring.
    Contains(String),
    /// Option is present, value ignored.
    Exists,
}

/// Named filter over a DHCP option, referenced by subnets via
/// whitelist/blacklist. Cannot be deleted while referenced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientClass {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub name: String,
    pub option_code: u16,
    pub rule: MatchRule,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ClientClass {
    pub fn new(name: String, option_code: u16, rule: MatchRule) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name,
            option_code,
            rule,
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Named grouping of numeric subnet ids. A subnet cannot be deleted while a
/// shared network references it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SharedNetwork {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub subnet_ids: Vec<u64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Global MAC admission entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdmitMac {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub hw_address: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Global client-fingerprint admission entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdmitFingerprint {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub fingerprint: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Per-MAC rate limit, packets per second.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitMac {
    #[serde(default = "Uuid::now_v7")]
    pub id: Uuid,
    pub hw_address: String,
    pub rate_limit: u32,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// DHCP agent deployment role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Sentry4,
    Server4,
    Sentry6,
    Server6,
}

/// A remote DHCP agent node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Stable node identifier, also the dispatch topic.
    pub id: String,
    /// Base URL of the node's command endpoint.
    pub endpoint: String,
    #[serde(default)]
    pub roles: Vec<NodeRole>,
    /// Set when this node is the virtual-IP front of an HA group; commands
    /// for the group go to the VIP node only.
    #[serde(default)]
    pub virtual_ip: Option<String>,
    #[serde(default = "Utc::now")]
    pub registered_at: DateTime<Utc>,
}

impl Node {
    pub fn has_role(&self, role: NodeRole) -> bool {
        self.roles.contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet4_new() {
        let subnet = Subnet4::new("10.0.0.0/24".parse().unwrap());
        assert_eq!(subnet.capacity, 0);
        assert_eq!(subnet.subnet_id, 0);
        assert_eq!(subnet.valid_lifetime, 14400);
    }

    #[test]
    fn test_subnet6_eui64_starts_unbounded() {
        let subnet = Subnet6::new("2001:db8::/64".parse().unwrap(), true);
        assert!(subnet.capacity.is_unbounded());
        let plain = Subnet6::new("2001:db8::/64".parse().unwrap(), false);
        assert_eq!(plain.capacity, Capacity::ZERO);
    }

    #[test]
    fn test_reservation4_identifier_exclusivity() {
        let mut r = Reservation4 {
            id: Uuid::now_v7(),
            subnet_id: Uuid::now_v7(),
            hw_address: Some("aa:bb:cc:dd:ee:ff".to_string()),
            hostname: None,
            ip_address: "10.0.0.5".parse().unwrap(),
            comment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(r.validate().is_ok());

        r.hostname = Some("host1".to_string());
        assert!(r.validate().is_err());

        r.hw_address = None;
        assert!(r.validate().is_ok());

        r.hostname = None;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_reservation6_requires_one_key_and_a_claim() {
        let mut r = Reservation6 {
            id: Uuid::now_v7(),
            subnet_id: Uuid::now_v7(),
            duid: Some("000300011234".to_string()),
            hw_address: None,
            hostname: None,
            ip_addresses: vec!["2001:db8::10".parse().unwrap()],
            prefixes: vec![],
            comment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(r.validate().is_ok());
        assert_eq!(r.claimed_count(), 1);

        r.prefixes.push("2001:db8:0:10::/60".parse().unwrap());
        assert_eq!(r.claimed_count(), 2);

        r.hw_address = Some("aa:bb:cc:dd:ee:ff".to_string());
        assert!(r.validate().is_err());

        r.hw_address = None;
        r.ip_addresses.clear();
        r.prefixes.clear();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_models_serde_roundtrip() {
        let pool = Pool4::new(
            Uuid::now_v7(),
            "10.0.0.10".parse().unwrap(),
            "10.0.0.200".parse().unwrap(),
        );
        let json = serde_json::to_string(&pool).unwrap();
        let restored: Pool4 = serde_json::from_str(&json).unwrap();
        assert_eq!(pool, restored);

        let class = ClientClass::new("iot".to_string(), 60, MatchRule::Contains("cam".into()));
        let json = serde_json::to_string(&class).unwrap();
        let restored: ClientClass = serde_json::from_str(&json).unwrap();
        assert_eq!(class, restored);
    }
}
