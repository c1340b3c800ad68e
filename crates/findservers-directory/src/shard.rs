//! Shard definitions for the upstream server directory.
//!
//! The upstream API caps every query at a fixed number of results, so one
//! directory-wide query is split into one query per region code. Codes
//! `0..=7` are geographic regions; `255` is the worldwide bucket that catches
//! servers not reporting a region.

use serde::{Deserialize, Serialize};

/// Partition key for one bounded upstream query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shard(u8);

impl Shard {
    /// US East
    pub const US_EAST: Self = Self(0);
    /// US West
    pub const US_WEST: Self = Self(1);
    /// South America
    pub const SOUTH_AMERICA: Self = Self(2);
    /// Europe
    pub const EUROPE: Self = Self(3);
    /// Asia
    pub const ASIA: Self = Self(4);
    /// Australia
    pub const AUSTRALIA: Self = Self(5);
    /// Middle East
    pub const MIDDLE_EAST: Self = Self(6);
    /// Africa
    pub const AFRICA: Self = Self(7);
    /// Worldwide fallback
    pub const WORLDWIDE: Self = Self(255);

    /// Every known shard, in the order refresh cycles merge them.
    pub const DEFAULT_SET: [Self; 9] = [
        Self::US_EAST,
        Self::US_WEST,
        Self::SOUTH_AMERICA,
        Self::EUROPE,
        Self::ASIA,
        Self::AUSTRALIA,
        Self::MIDDLE_EAST,
        Self::AFRICA,
        Self::WORLDWIDE,
    ];

    pub const fn new(region_code: u8) -> Self {
        Self(region_code)
    }

    pub const fn region_code(self) -> u8 {
        self.0
    }

    /// Upstream filter fragment restricting a query to this shard.
    pub fn filter_fragment(self) -> String {
        format!("\\region\\{}", self.0)
    }

    /// Short display label (`US`, `EU`, ...).
    pub fn label(self) -> &'static str {
        region_label(i32::from(self.0))
    }
}

impl Default for Shard {
    fn default() -> Self {
        Self::WORLDWIDE
    }
}

impl std::fmt::Display for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "region {}", self.0)
    }
}

/// Display label for a raw upstream region code.
///
/// Listings report `-1` for some US servers, which falls through to `??`
/// like any other unknown code.
pub fn region_label(code: i32) -> &'static str {
    match code {
        0 | 1 => "US",
        2 => "SA",
        3 => "EU",
        4 => "AS",
        5 => "AU",
        6 => "ME",
        7 => "AF",
        255 => "WD",
        _ => "??",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_order() {
        let codes: Vec<u8> = Shard::DEFAULT_SET.iter().map(|s| s.region_code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5, 6, 7, 255]);
    }

    #[test]
    fn test_filter_fragment() {
        assert_eq!(Shard::EUROPE.filter_fragment(), "\\region\\3");
        assert_eq!(Shard::WORLDWIDE.filter_fragment(), "\\region\\255");
    }

    #[test]
    fn test_labels() {
        assert_eq!(Shard::US_EAST.label(), "US");
        assert_eq!(Shard::US_WEST.label(), "US");
        assert_eq!(Shard::AFRICA.label(), "AF");
        assert_eq!(Shard::WORLDWIDE.label(), "WD");
        assert_eq!(region_label(-1), "??");
        assert_eq!(region_label(42), "??");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&Shard::ASIA).unwrap();
        assert_eq!(json, "4");
        let shard: Shard = serde_json::from_str("255").unwrap();
        assert_eq!(shard, Shard::WORLDWIDE);
    }
}
