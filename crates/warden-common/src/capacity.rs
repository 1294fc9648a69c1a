//! Allocation capacity counter.
//!
//! IPv4 capacities fit in a `u64`; IPv6 subnets of /64 or shorter hold more
//! addresses than fit in 64 bits, so the shared counter is `u128`-backed.
//! `Unbounded` marks EUI64-autoconfigured subnets (and the degenerate full
//! address space, which overflows even `u128` by one).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Bounded(u128),
    Unbounded,
}

impl Capacity {
    pub const ZERO: Capacity = Capacity::Bounded(0);

    /// 2^bits delegation units; saturates to Unbounded at 128 bits.
    pub fn pow2(bits: u32) -> Capacity {
        if bits >= 128 {
            Capacity::Unbounded
        } else {
            Capacity::Bounded(1u128 << bits)
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Capacity::Unbounded)
    }

    pub fn value(&self) -> Option<u128> {
        match self {
            Capacity::Bounded(n) => Some(*n),
            Capacity::Unbounded => None,
        }
    }

    /// Add `delta` units; overflow saturates to Unbounded.
    pub fn plus(self, delta: Capacity) -> Capacity {
        match (self, delta) {
            (Capacity::Bounded(a), Capacity::Bounded(b)) => match a.checked_add(b) {
                Some(sum) => Capacity::Bounded(sum),
                None => Capacity::Unbounded,
            },
            _ => Capacity::Unbounded,
        }
    }

    /// Subtract `delta` units, saturating at zero. Unbounded absorbs any
    /// subtraction. Valid ledger sequences never hit the floor; saturation
    /// only guards against a counter going negative on inconsistent input.
    pub fn minus(self, delta: Capacity) -> Capacity {
        match (self, delta) {
            (Capacity::Bounded(a), Capacity::Bounded(b)) => Capacity::Bounded(a.saturating_sub(b)),
            (Capacity::Unbounded, _) => Capacity::Unbounded,
            (Capacity::Bounded(_), Capacity::Unbounded) => Capacity::ZERO,
        }
    }

    /// Apply a signed delta: create subtracts allocatable units when the
    /// range is reserved, delete restores them.
    pub fn apply(self, delta: Capacity, is_create: bool) -> Capacity {
        if is_create {
            self.minus(delta)
        } else {
            self.plus(delta)
        }
    }

    /// True when subtracting this charge from `budget` would go below zero.
    /// An Unbounded budget absorbs any charge.
    pub fn exceeds(&self, budget: &Capacity) -> bool {
        match (self, budget) {
            (Capacity::Bounded(charge), Capacity::Bounded(have)) => charge > have,
            (Capacity::Unbounded, Capacity::Bounded(_)) => true,
            (_, Capacity::Unbounded) => false,
        }
    }
}

impl From<u128> for Capacity {
    fn from(n: u128) -> Self {
        Capacity::Bounded(n)
    }
}

impl From<u64> for Capacity {
    fn from(n: u64) -> Self {
        Capacity::Bounded(n as u128)
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Bounded(n) => write!(f, "{}", n),
            Capacity::Unbounded => write!(f, "unbounded"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid capacity: {0}")]
pub struct ParseCapacityError(String);

impl FromStr for Capacity {
    type Err = ParseCapacityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "unbounded" {
            return Ok(Capacity::Unbounded);
        }
        s.parse::<u128>()
            .map(Capacity::Bounded)
            .map_err(|_| ParseCapacityError(s.to_string()))
    }
}

// Stored and serialized as a decimal string: u128 does not fit in an i64
// column or a JSON number.
impl Serialize for Capacity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Capacity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plus_minus_roundtrip() {
        let cap = Capacity::Bounded(256);
        let reserved = Capacity::Bounded(16);
        let after = cap.apply(reserved, true);
        assert_eq!(after, Capacity::Bounded(240));
        assert_eq!(after.apply(reserved, false), cap);
    }

    #[test]
    fn test_minus_saturates_at_zero() {
        let cap = Capacity::Bounded(5);
        assert_eq!(cap.minus(Capacity::Bounded(10)), Capacity::ZERO);
    }

    #[test]
    fn test_unbounded_absorbs_arithmetic() {
        assert_eq!(
            Capacity::Unbounded.minus(Capacity::Bounded(1_000_000)),
            Capacity::Unbounded
        );
        assert_eq!(
            Capacity::Unbounded.plus(Capacity::Bounded(1)),
            Capacity::Unbounded
        );
    }

    #[test]
    fn test_plus_overflow_saturates_to_unbounded() {
        let near_max = Capacity::Bounded(u128::MAX);
        assert_eq!(near_max.plus(Capacity::Bounded(1)), Capacity::Unbounded);
    }

    #[test]
    fn test_exceeds() {
        assert!(Capacity::Bounded(11).exceeds(&Capacity::Bounded(10)));
        assert!(!Capacity::Bounded(10).exceeds(&Capacity::Bounded(10)));
        assert!(Capacity::Unbounded.exceeds(&Capacity::Bounded(u128::MAX)));
        assert!(!Capacity::Bounded(u128::MAX).exceeds(&Capacity::Unbounded));
        assert!(!Capacity::Unbounded.exceeds(&Capacity::Unbounded));
    }

    #[test]
    fn test_pow2() {
        assert_eq!(Capacity::pow2(0), Capacity::Bounded(1));
        assert_eq!(Capacity::pow2(8), Capacity::Bounded(256));
        assert_eq!(Capacity::pow2(64), Capacity::Bounded(1u128 << 64));
        assert_eq!(Capacity::pow2(128), Capacity::Unbounded);
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(Capacity::Bounded(65536).to_string(), "65536");
        assert_eq!(Capacity::Unbounded.to_string(), "unbounded");
        assert_eq!("240".parse::<Capacity>().unwrap(), Capacity::Bounded(240));
        assert_eq!(
            "unbounded".parse::<Capacity>().unwrap(),
            Capacity::Unbounded
        );
        assert!("-1".parse::<Capacity>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Capacity::Bounded(256)).unwrap();
        assert_eq!(json, "\"256\"");
        let cap: Capacity = serde_json::from_str("\"unbounded\"").unwrap();
        assert_eq!(cap, Capacity::Unbounded);
    }
}
