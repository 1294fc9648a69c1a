//! Per-batch reservation identifier tracking.
//!
//! Batch imports validate every candidate against the claims made earlier in
//! the same batch before anything is persisted, so duplicates are rejected
//! while the store still holds zero of the batch's rows. Trackers are built
//! once per operation and seeded from the subnet's persisted reservations.

use std::collections::HashSet;

use warden_common::models::{Reservation4, Reservation6};

/// Tracks which IPv4 reservation identifiers have been claimed.
#[derive(Debug, Default)]
pub struct Reservation4Identifier {
    macs: HashSet<String>,
    hostnames: HashSet<String>,
    ips: HashSet<u32>,
}

impl Reservation4Identifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tracker with already-persisted reservations.
    pub fn seed<'a>(&mut self, existing: impl IntoIterator<Item = &'a Reservation4>) {
        for r in existing {
            if let Some(mac) = &r.hw_address {
                self.macs.insert(mac.clone());
            }
            if let Some(host) = &r.hostname {
                self.hostnames.insert(host.clone());
            }
            self.ips.insert(u32::from(r.ip_address));
        }
    }

    /// Claim all identifiers of `candidate`; fails fast on the first
    /// collision without inserting anything.
    pub fn add(&mut self, candidate: &Reservation4) -> Result<(), String> {
        if let Some(mac) = candidate.hw_address.as_deref() {
            if self.macs.contains(mac) {
                return Err(format!("duplicate hw-address {}", mac));
            }
        }
        if let Some(host) = candidate.hostname.as_deref() {
            if self.hostnames.contains(host) {
                return Err(format!("duplicate hostname {}", host));
            }
        }
        if self.ips.contains(&u32::from(candidate.ip_address)) {
            return Err(format!("duplicate ip address {}", candidate.ip_address));
        }

        if let Some(mac) = candidate.hw_address.clone() {
            self.macs.insert(mac);
        }
        if let Some(host) = candidate.hostname.clone() {
            self.hostnames.insert(host);
        }
        self.ips.insert(u32::from(candidate.ip_address));
        Ok(())
    }
}

/// Tracks which IPv6 reservation identifiers have been claimed.
#[derive(Debug, Default)]
pub struct Reservation6Identifier {
    duids: HashSet<String>,
    macs: HashSet<String>,
    hostnames: HashSet<String>,
    ips: HashSet<u128>,
    prefixes: HashSet<String>,
}

impl Reservation6Identifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed<'a>(&mut self, existing: impl IntoIterator<Item = &'a Reservation6>) {
        for r in existing {
            if let Some(duid) = &r.duid {
                self.duids.insert(duid.clone());
            }
            if let Some(mac) = &r.hw_address {
                self.macs.insert(mac.clone());
            }
            if let Some(host) = &r.hostname {
                self.hostnames.insert(host.clone());
            }
            for ip in &r.ip_addresses {
                self.ips.insert(u128::from(*ip));
            }
            for prefix in &r.prefixes {
                self.prefixes.insert(prefix.to_string());
            }
        }
    }

    pub fn add(&mut self, candidate: &Reservation6) -> Result<(), String> {
        if let Some(duid) = candidate.duid.as_deref() {
            if self.duids.contains(duid) {
                return Err(format!("duplicate duid {}", duid));
            }
        }
        if let Some(mac) = candidate.hw_address.as_deref() {
            if self.macs.contains(mac) {
                return Err(format!("duplicate hw-address {}", mac));
            }
        }
        if let Some(host) = candidate.hostname.as_deref() {
            if self.hostnames.contains(host) {
                return Err(format!("duplicate hostname {}", host));
            }
        }
        for ip in &candidate.ip_addresses {
            if self.ips.contains(&u128::from(*ip)) {
                return Err(format!("duplicate ip address {}", ip));
            }
        }
        // A batch item may not claim the same IP or prefix twice itself
        // either; collect before inserting.
        let mut seen_ips: HashSet<u128> = HashSet::new();
        for ip in &candidate.ip_addresses {
            if !seen_ips.insert(u128::from(*ip)) {
                return Err(format!("duplicate ip address {}", ip));
            }
        }
        for prefix in &candidate.prefixes {
            if self.prefixes.contains(&prefix.to_string()) {
                return Err(format!("duplicate prefix {}", prefix));
            }
        }
        let mut seen_prefixes: HashSet<String> = HashSet::new();
        for prefix in &candidate.prefixes {
            if !seen_prefixes.insert(prefix.to_string()) {
                return Err(format!("duplicate prefix {}", prefix));
            }
        }

        if let Some(duid) = candidate.duid.clone() {
            self.duids.insert(duid);
        }
        if let Some(mac) = candidate.hw_address.clone() {
            self.macs.insert(mac);
        }
        if let Some(host) = candidate.hostname.clone() {
            self.hostnames.insert(host);
        }
        for ip in &candidate.ip_addresses {
            self.ips.insert(u128::from(*ip));
        }
        for prefix in &candidate.prefixes {
            self.prefixes.insert(prefix.to_string());
        }
        Ok(())
    }
}
