//! Listing records and snapshots.
//!
//! A [`RawListing`] is what the upstream directory returns for one shard
//! query. A [`CleanListing`] is the normalized public record. A [`Snapshot`]
//! is the full set of clean listings produced by one refresh cycle.
//!
//! Example upstream record:
//!
//! ```json
//! {
//!     "addr": "102.216.74.10:27015",
//!     "gameport": 27015,
//!     "steamid": "90259233304408080",
//!     "name": "RapidNetworks Counter-Strike 2 Server",
//!     "appid": 730,
//!     "gamedir": "csgo",
//!     "version": "1.40.6.7",
//!     "product": "cs2",
//!     "region": 1,
//!     "players": 0,
//!     "max_players": 32,
//!     "bots": 0,
//!     "map": "de_dust2",
//!     "secure": true,
//!     "dedicated": true,
//!     "os": "l",
//!     "gametype": "empty,secure"
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::shard::region_label;

/// Delimiter between tags in the upstream `gametype` string.
pub const TAG_DELIMITER: char = ',';

/// One unfiltered upstream record.
///
/// Missing and `null` fields both take their zero value, so one sparse
/// record never invalidates the rest of a shard's payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawListing {
    /// `host:port`
    #[serde(deserialize_with = "null_as_default")]
    pub addr: String,
    #[serde(deserialize_with = "null_as_default")]
    pub gameport: u16,
    #[serde(deserialize_with = "null_as_default")]
    pub steamid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub appid: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub gamedir: String,
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub product: String,
    #[serde(deserialize_with = "null_as_default")]
    pub region: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub players: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub max_players: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub bots: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub map: String,
    #[serde(deserialize_with = "null_as_default")]
    pub secure: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub dedicated: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub os: String,
    /// Free-text, comma separated tag string
    #[serde(deserialize_with = "null_as_default")]
    pub gametype: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Normalized public record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanListing {
    pub ip: String,
    pub port: u16,
    /// Original `host:port`, the deduplication key
    pub address: String,
    pub name: String,
    pub region: i32,
    pub players: u32,
    pub max_players: u32,
    pub bots: u32,
    pub map: String,
    pub secure: bool,
    pub dedicated: bool,
    pub tags: BTreeSet<String>,
}

impl CleanListing {
    /// Normalize a raw record. Filtering happens before this, in the
    /// aggregation filter.
    pub fn from_raw(raw: &RawListing) -> Self {
        let (ip, port) = split_address(&raw.addr)
            .unwrap_or_else(|| (raw.addr.clone(), raw.gameport));

        Self {
            ip,
            port,
            address: raw.addr.clone(),
            name: raw.name.clone(),
            region: raw.region,
            players: raw.players,
            max_players: raw.max_players,
            bots: raw.bots,
            map: raw.map.clone(),
            secure: raw.secure,
            dedicated: raw.dedicated,
            tags: split_tags(&raw.gametype),
        }
    }

    pub fn region_label(&self) -> &'static str {
        region_label(self.region)
    }
}

impl From<&CleanListing> for RawListing {
    fn from(clean: &CleanListing) -> Self {
        Self {
            addr: clean.address.clone(),
            gameport: clean.port,
            name: clean.name.clone(),
            region: clean.region,
            players: clean.players,
            max_players: clean.max_players,
            bots: clean.bots,
            map: clean.map.clone(),
            secure: clean.secure,
            dedicated: clean.dedicated,
            gametype: clean
                .tags
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(","),
            ..Self::default()
        }
    }
}

/// Split `host:port` on the last colon.
///
/// Bracketed IPv6 hosts lose their brackets. Returns `None` when there is no
/// colon or the port is not a valid `u16`.
pub fn split_address(addr: &str) -> Option<(String, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port))
}

/// Split a tag string into a tag set, dropping empty segments.
pub fn split_tags(gametype: &str) -> BTreeSet<String> {
    gametype
        .split(TAG_DELIMITER)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Listings visible to readers at one point in time.
///
/// Always the complete output of a single refresh cycle (or a durable copy
/// of one); never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    listings: Vec<CleanListing>,
    created_at: DateTime<Utc>,
    ttl: Option<Duration>,
}

impl Snapshot {
    pub fn new(listings: Vec<CleanListing>) -> Self {
        Self {
            listings,
            created_at: Utc::now(),
            ttl: None,
        }
    }

    /// Rebuild a snapshot with a known creation time (durable loads).
    pub fn with_timestamp(listings: Vec<CleanListing>, created_at: DateTime<Utc>) -> Self {
        Self {
            listings,
            created_at,
            ttl: None,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn listings(&self) -> &[CleanListing] {
        &self.listings
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Age relative to now; zero if the clock moved backwards.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or_default()
    }

    /// `None` when no TTL applies; zero once expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.ttl.map(|ttl| ttl.saturating_sub(self.age()))
    }

    pub fn is_expired(&self) -> bool {
        self.ttl.is_some_and(|ttl| self.age() >= ttl)
    }
}
