//! Background refresh cycles.
//!
//! A cycle walks `Idle → Fetching → Aggregating → Publishing → Idle`. At
//! most one cycle runs at a time: a trigger that arrives while a cycle is in
//! flight is rejected with [`RefreshError::AlreadyRunning`] and the running
//! cycle's result stands for both callers. Timer ticks that land on a busy
//! scheduler are skipped the same way.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheStore;
use crate::config::RefreshConfig;
use crate::error::RefreshError;
use crate::fetcher::{ShardSource, fetch_all};
use crate::filter::{AggregationFilter, FilterStats};
use crate::listing::Snapshot;
use crate::shard::Shard;

/// Phase of the refresh state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum RefreshState {
    Idle = 0,
    Fetching = 1,
    Aggregating = 2,
    Publishing = 3,
}

impl RefreshState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Fetching,
            2 => Self::Aggregating,
            3 => Self::Publishing,
            _ => Self::Idle,
        }
    }
}

/// Outcome of a cycle that published a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Listings in the published snapshot
    pub listings: usize,
    /// Publish timestamp of the new snapshot
    pub created_at: DateTime<Utc>,
    pub filter: FilterStats,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// How the most recent finished cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    Published { listings: usize },
    Aborted { found: usize, required: usize },
}

/// Counters since the scheduler was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    pub state: RefreshState,
    pub cycles_started: u64,
    pub cycles_published: u64,
    pub cycles_aborted: u64,
    pub triggers_coalesced: u64,
    pub last_outcome: Option<CycleOutcome>,
    pub last_finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    published: AtomicU64,
    aborted: AtomicU64,
    coalesced: AtomicU64,
}

/// Resets the state to `Idle` when a cycle ends, including when its future is dropped.
struct StateGuard<'a>(&'a AtomicU8);

impl StateGuard<'_> {
    fn enter(&self, state: RefreshState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(RefreshState::Idle as u8, Ordering::Release);
    }
}

pub struct RefreshScheduler {
    source: Arc<dyn ShardSource>,
    filter: AggregationFilter,
    cache: Arc<CacheStore>,
    config: RefreshConfig,
    shards: Vec<Shard>,
    concurrency: usize,
    cycle_lock: Mutex<()>,
    state: AtomicU8,
    counters: Counters,
    last: parking_lot::Mutex<Option<(CycleOutcome, DateTime<Utc>)>>,
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("shards", &self.shards)
            .field("concurrency", &self.concurrency)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl RefreshScheduler {
    pub fn new(
        source: Arc<dyn ShardSource>,
        filter: AggregationFilter,
        cache: Arc<CacheStore>,
        config: RefreshConfig,
        shards: Vec<Shard>,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            filter,
            cache,
            config,
            shards,
            concurrency,
            cycle_lock: Mutex::new(()),
            state: AtomicU8::new(RefreshState::Idle as u8),
            counters: Counters::default(),
            last: parking_lot::Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn state(&self) -> RefreshState {
        RefreshState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> RefreshStats {
        let last = self.last.lock().clone();
        RefreshStats {
            state: self.state(),
            cycles_started: self.counters.started.load(Ordering::Relaxed),
            cycles_published: self.counters.published.load(Ordering::Relaxed),
            cycles_aborted: self.counters.aborted.load(Ordering::Relaxed),
            triggers_coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            last_finished_at: last.as_ref().map(|(_, at)| *at),
            last_outcome: last.map(|(outcome, _)| outcome),
        }
    }

    /// Run one full cycle unless another one is in flight.
    pub async fn run_cycle(&self) -> Result<RefreshReport, RefreshError> {
        let Ok(_running) = self.cycle_lock.try_lock() else {
            self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            tracing::info!("refresh already in progress, trigger coalesced");
            return Err(RefreshError::AlreadyRunning);
        };

        self.counters.started.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let state = StateGuard(&self.state);

        state.enter(RefreshState::Fetching);
        tracing::info!(shards = self.shards.len(), "refresh cycle started");
        let batches = fetch_all(Arc::clone(&self.source), &self.shards, self.concurrency).await;

        state.enter(RefreshState::Aggregating);
        let reduction = self.filter.reduce(&batches);
        let stats = reduction.stats;
        tracing::info!(
            raw = stats.raw,
            kept = stats.kept,
            reserved_name = stats.reserved_name,
            too_many_slots = stats.too_many_slots,
            blocked_tag = stats.blocked_tag,
            duplicate_address = stats.duplicate_address,
            empty_map = stats.empty_map,
            "aggregation finished"
        );

        let found = reduction.listings.len();
        if found <= self.config.min_listings {
            let required = self.config.min_listings;
            tracing::warn!(
                found,
                required,
                "too few listings, keeping the previous snapshot"
            );
            self.counters.aborted.fetch_add(1, Ordering::Relaxed);
            self.record(CycleOutcome::Aborted { found, required });
            return Err(RefreshError::InsufficientResults { found, required });
        }

        state.enter(RefreshState::Publishing);
        let snapshot = self
            .cache
            .publish(Snapshot::new(reduction.listings).with_ttl(self.config.snapshot_ttl))
            .await;

        self.counters.published.fetch_add(1, Ordering::Relaxed);
        self.record(CycleOutcome::Published { listings: found });

        let report = RefreshReport {
            listings: snapshot.len(),
            created_at: snapshot.created_at(),
            filter: stats,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            listings = report.listings,
            elapsed_ms = report.elapsed.as_millis(),
            "refresh cycle published"
        );
        Ok(report)
    }

    fn record(&self, outcome: CycleOutcome) {
        *self.last.lock() = Some((outcome, Utc::now()));
    }

    /// Drive cycles on the configured interval until `cancel` fires.
    ///
    /// The first scheduled cycle runs one interval after spawning; callers
    /// that want an immediate refresh run [`run_cycle`](Self::run_cycle)
    /// themselves first. Cancellation abandons an in-flight cycle.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let interval = self.config.interval;
        tokio::spawn(async move {
            let Some(start) = tokio::time::Instant::now().checked_add(interval) else {
                tracing::warn!(?interval, "refresh interval out of range, scheduler idle");
                cancel.cancelled().await;
                return;
            };
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(interval_secs = interval.as_secs(), "refresh scheduler started");
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    () = cancel.cancelled() => break,
                    result = self.run_cycle() => {
                        if let Err(e) = result {
                            tracing::warn!(error = %e, "scheduled refresh did not publish");
                        }
                    }
                }
            }
            tracing::info!("refresh scheduler stopped");
        })
    }
}
