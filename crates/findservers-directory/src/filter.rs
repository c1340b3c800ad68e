//! Merge, filter, deduplicate and normalize shard output.
//!
//! Raw listings are visited in shard order, then in upstream order within a
//! shard. Each one is checked against the exclusion rules below, in order,
//! and dropped on the first match:
//!
//! 1. name starts with the reserved official-server prefix
//! 2. `max_players` above the cap (placeholder/spam entries)
//! 3. tag string contains a blocked substring
//! 4. address already seen earlier in the merge
//! 5. empty map
//!
//! Survivors are normalized into [`CleanListing`]s. A bad record never aborts
//! the merge.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::listing::{CleanListing, RawListing};
use crate::shard::Shard;

/// Output of one shard query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardBatch {
    pub shard: Shard,
    pub listings: Vec<RawListing>,
}

impl ShardBatch {
    pub fn new(shard: Shard, listings: Vec<RawListing>) -> Self {
        Self { shard, listings }
    }
}

/// Exclusion rule configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRules {
    /// Names starting with this belong to operator-run official servers
    pub reserved_prefix: String,

    /// Listings advertising more slots than this are dropped
    pub max_players: u32,

    /// Tag strings containing any of these are dropped
    pub blocked_tag_substrings: Vec<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            reserved_prefix: "Valve Counter-Strike".to_string(),
            max_players: 64,
            blocked_tag_substrings: vec!["stalnoy".to_string()],
        }
    }
}

/// Why a raw listing was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exclusion {
    ReservedName,
    TooManySlots,
    BlockedTag,
    DuplicateAddress,
    EmptyMap,
}

/// Per-rule drop counters for one reduction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub raw: usize,
    pub kept: usize,
    pub reserved_name: usize,
    pub too_many_slots: usize,
    pub blocked_tag: usize,
    pub duplicate_address: usize,
    pub empty_map: usize,
}

impl FilterStats {
    fn record(&mut self, exclusion: Exclusion) {
        match exclusion {
            Exclusion::ReservedName => self.reserved_name += 1,
            Exclusion::TooManySlots => self.too_many_slots += 1,
            Exclusion::BlockedTag => self.blocked_tag += 1,
            Exclusion::DuplicateAddress => self.duplicate_address += 1,
            Exclusion::EmptyMap => self.empty_map += 1,
        }
    }

    pub fn dropped(&self) -> usize {
        self.raw - self.kept
    }
}

/// Result of [`AggregationFilter::reduce`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reduction {
    pub listings: Vec<CleanListing>,
    pub stats: FilterStats,
}

/// Pure reducer from shard batches to clean listings.
#[derive(Debug, Clone, Default)]
pub struct AggregationFilter {
    rules: FilterRules,
}

impl AggregationFilter {
    pub fn new(rules: FilterRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &FilterRules {
        &self.rules
    }

    /// First exclusion rule matching `raw`, ignoring deduplication.
    pub fn exclusion(&self, raw: &RawListing) -> Option<Exclusion> {
        if raw.name.starts_with(&self.rules.reserved_prefix) {
            return Some(Exclusion::ReservedName);
        }
        if raw.max_players > self.rules.max_players {
            return Some(Exclusion::TooManySlots);
        }
        if self
            .rules
            .blocked_tag_substrings
            .iter()
            .any(|blocked| raw.gametype.contains(blocked.as_str()))
        {
            return Some(Exclusion::BlockedTag);
        }
        None
    }

    /// Merge every batch into one clean, deduplicated list.
    pub fn reduce(&self, batches: &[ShardBatch]) -> Reduction {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stats = FilterStats::default();
        let mut listings = Vec::new();

        for raw in batches.iter().flat_map(|batch| batch.listings.iter()) {
            stats.raw += 1;

            let exclusion = self.exclusion(raw).or_else(|| {
                if seen.contains(raw.addr.as_str()) {
                    Some(Exclusion::DuplicateAddress)
                } else if raw.map.is_empty() {
                    Some(Exclusion::EmptyMap)
                } else {
                    None
                }
            });

            if let Some(exclusion) = exclusion {
                tracing::trace!(addr = %raw.addr, ?exclusion, "dropping listing");
                stats.record(exclusion);
                continue;
            }

            seen.insert(raw.addr.as_str());
            listings.push(CleanListing::from_raw(raw));
        }

        stats.kept = listings.len();
        Reduction { listings, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(addr: &str, name: &str, map: &str, max_players: u32) -> RawListing {
        RawListing {
            addr: addr.to_string(),
            name: name.to_string(),
            map: map.to_string(),
            max_players,
            ..RawListing::default()
        }
    }

    fn single(listings: Vec<RawListing>) -> Vec<ShardBatch> {
        vec![ShardBatch::new(Shard::US_EAST, listings)]
    }

    #[test]
    fn test_reserved_prefix_dropped() {
        let filter = AggregationFilter::default();
        let out = filter.reduce(&single(vec![raw(
            "1.1.1.1:27015",
            "Valve Counter-Strike 2 Server",
            "de_dust2",
            32,
        )]));
        assert!(out.listings.is_empty());
        assert_eq!(out.stats.reserved_name, 1);
    }

    #[test]
    fn test_oversized_server_dropped() {
        let filter = AggregationFilter::default();
        let out = filter.reduce(&single(vec![raw("1.1.1.1:27015", "A", "de_dust2", 100)]));
        assert!(out.listings.is_empty());
        assert_eq!(out.stats.too_many_slots, 1);
    }

    #[test]
    fn test_max_players_boundary_kept() {
        let filter = AggregationFilter::default();
        let out = filter.reduce(&single(vec![raw("1.1.1.1:27015", "A", "de_dust2", 64)]));
        assert_eq!(out.listings.len(), 1);
    }

    #[test]
    fn test_blocked_tag_dropped() {
        let filter = AggregationFilter::default();
        let mut listing = raw("1.1.1.1:27015", "A", "de_dust2", 32);
        listing.gametype = "secure,stalnoy_group".to_string();
        let out = filter.reduce(&single(vec![listing]));
        assert!(out.listings.is_empty());
        assert_eq!(out.stats.blocked_tag, 1);
    }

    #[test]
    fn test_empty_map_dropped() {
        let filter = AggregationFilter::default();
        let out = filter.reduce(&single(vec![raw("1.1.1.1:27015", "A", "", 32)]));
        assert!(out.listings.is_empty());
        assert_eq!(out.stats.empty_map, 1);
    }

    #[test]
    fn test_duplicate_address_first_wins() {
        let filter = AggregationFilter::default();
        let out = filter.reduce(&single(vec![
            raw("1.1.1.1:27015", "First", "de_dust2", 32),
            raw("1.1.1.1:27015", "Second", "de_mirage", 32),
        ]));
        assert_eq!(out.listings.len(), 1);
        assert_eq!(out.listings[0].name, "First");
        assert_eq!(out.stats.duplicate_address, 1);
    }

    #[test]
    fn test_duplicate_across_shards_first_shard_wins() {
        let filter = AggregationFilter::default();
        let batches = vec![
            ShardBatch::new(
                Shard::EUROPE,
                vec![raw("2.2.2.2:27015", "From Europe", "de_nuke", 20)],
            ),
            ShardBatch::new(
                Shard::WORLDWIDE,
                vec![
                    raw("3.3.3.3:27015", "Only Worldwide", "de_anubis", 20),
                    raw("2.2.2.2:27015", "From Worldwide", "de_nuke", 20),
                ],
            ),
        ];
        let out = filter.reduce(&batches);
        let names: Vec<&str> = out.listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["From Europe", "Only Worldwide"]);
    }

    #[test]
    fn test_dropped_listing_does_not_claim_address() {
        // An excluded record must not shadow a later valid one with the same address
        let filter = AggregationFilter::default();
        let out = filter.reduce(&single(vec![
            raw("1.1.1.1:27015", "Empty map first", "", 32),
            raw("1.1.1.1:27015", "Valid later", "de_dust2", 32),
        ]));
        assert_eq!(out.listings.len(), 1);
        assert_eq!(out.listings[0].name, "Valid later");
    }

    #[test]
    fn test_rule_order_reserved_before_slots() {
        let filter = AggregationFilter::default();
        let listing = raw("1.1.1.1:27015", "Valve Counter-Strike X", "", 255);
        assert_eq!(filter.exclusion(&listing), Some(Exclusion::ReservedName));
    }

    #[test]
    fn test_normalization_and_order() {
        let filter = AggregationFilter::default();
        let mut first = raw("1.2.3.4:27015", "B", "de_dust2", 10);
        first.gametype = "empty,secure".to_string();
        let second = raw("5.6.7.8:27016", "A", "de_inferno", 10);

        let out = filter.reduce(&single(vec![first, second]));
        assert_eq!(out.listings.len(), 2);
        assert_eq!(out.listings[0].ip, "1.2.3.4");
        assert_eq!(out.listings[0].port, 27015);
        assert_eq!(
            out.listings[0].tags.iter().cloned().collect::<Vec<_>>(),
            vec!["empty".to_string(), "secure".to_string()]
        );
        assert_eq!(out.listings[1].name, "A");
        assert_eq!(out.stats.raw, 2);
        assert_eq!(out.stats.dropped(), 0);
    }

    #[test]
    fn test_custom_rules() {
        let filter = AggregationFilter::new(FilterRules {
            reserved_prefix: "Official".to_string(),
            max_players: 10,
            blocked_tag_substrings: vec!["spam".to_string(), "bot".to_string()],
        });
        let mut tagged = raw("4.4.4.4:1", "Fine", "cs_office", 10);
        tagged.gametype = "botfarm".to_string();
        let out = filter.reduce(&single(vec![
            raw("1.1.1.1:1", "Official #1", "de_dust2", 10),
            raw("2.2.2.2:1", "Big", "de_dust2", 11),
            tagged,
            raw("3.3.3.3:1", "Valve Counter-Strike ok here", "de_dust2", 10),
        ]));
        assert_eq!(out.listings.len(), 1);
        assert_eq!(out.listings[0].address, "3.3.3.3:1");
    }

    #[test]
    fn test_empty_input() {
        let out = AggregationFilter::default().reduce(&[]);
        assert_eq!(out, Reduction::default());
    }
}
