//! Four in-memory tables feeding the selector: `ping_pool`, `tick_pool`,
//! `vote_pool`, `fork_pool`.
//!
//! Each keyed table is its own `DashMap` (one short, non-blocking lock per
//! table); `tick_pool`'s insertion-ordered priority structure lives behind
//! a single `tokio::sync::Mutex` since its operations are a handful of
//! comparisons, not a hot path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::continuity::measure_tick_continuity;
use crate::types::{Address, ChainEntry, Reference, Tick, Vote};
use crate::types::Ping;

/// `(−continuity, insertion_seq, tick)`. Negated continuity gives
/// max-priority-by-continuity when sorted ascending; `seq` breaks ties
/// FIFO (earliest wins).
type TickPoolEntry = (i64, u64, Tick);

pub struct Pools {
    ping_pool: DashMap<Address, Ping>,
    vote_pool: DashMap<Address, Reference>,
    tick_pool: Mutex<Vec<TickPoolEntry>>,
    fork_pool: DashMap<Address, Tick>,
    seq: AtomicU64,
    continuity_window: usize,
}

impl Pools {
    pub fn new(continuity_window: usize) -> Self {
        Self {
            ping_pool: DashMap::new(),
            vote_pool: DashMap::new(),
            tick_pool: Mutex::new(Vec::new()),
            fork_pool: DashMap::new(),
            seq: AtomicU64::new(0),
            continuity_window,
        }
    }

    /// Upsert by `addr(p.pubkey)`; a second ping from the same address in
    /// the same cycle replaces the prior one.
    pub fn add_ping(&self, addr: Address, ping: Ping) {
        self.ping_pool.insert(addr, ping);
    }

    pub fn ping_pool_len(&self) -> usize {
        self.ping_pool.len()
    }

    pub fn ping_pool_values(&self) -> Vec<Ping> {
        self.ping_pool.iter().map(|e| e.value().clone()).collect()
    }

    pub fn clear_ping_pool(&self) {
        self.ping_pool.clear();
    }

    /// Stores only the voted reference, keyed by voter address.
    pub fn add_vote(&self, addr: Address, vote: &Vote) {
        if let Some(reference) = &vote.reference {
            self.vote_pool.insert(addr, reference.clone());
        }
    }

    pub fn vote_counts(&self) -> HashMap<Reference, usize> {
        let mut counts = HashMap::new();
        for entry in self.vote_pool.iter() {
            *counts.entry(entry.value().clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Pushes `(−continuity, seq, tick)` onto the tick pool.
    pub async fn add_tick(&self, tick: Tick, chain_snapshot: &[ChainEntry]) {
        let continuity = measure_tick_continuity(&tick, chain_snapshot, self.continuity_window);
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.tick_pool.lock().await.push((-continuity, seq, tick));
    }

    /// Upsert by peer address: a tick whose `prev_tick` mismatches our tip.
    pub fn add_fork(&self, peer: Address, tick: Tick) {
        self.fork_pool.insert(peer, tick);
    }

    pub fn fork_pool_len(&self) -> usize {
        self.fork_pool.len()
    }

    pub fn fork_pool_snapshot(&self) -> Vec<(Address, Tick)> {
        self.fork_pool
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn clear_fork_pool(&self) {
        self.fork_pool.clear();
    }

    pub async fn tick_pool_len(&self) -> usize {
        self.tick_pool.lock().await.len()
    }

    pub async fn all_ticks(&self) -> Vec<Tick> {
        self.tick_pool
            .lock()
            .await
            .iter()
            .map(|(_, _, t)| t.clone())
            .collect()
    }

    pub async fn ticks_by_ref(&self, refs: &[Reference]) -> Vec<Tick> {
        self.tick_pool
            .lock()
            .await
            .iter()
            .filter(|(_, _, t)| {
                t.this_tick
                    .as_ref()
                    .is_some_and(|r| refs.contains(r))
            })
            .map(|(_, _, t)| t.clone())
            .collect()
    }

    /// Head of tick_pool by the continuity ordering; informational only.
    pub async fn active_tick(&self) -> Option<Tick> {
        let mut guard = self.tick_pool.lock().await;
        guard.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        guard.first().map(|(_, _, t)| t.clone())
    }

    pub async fn clear_tick_pool(&self) {
        self.tick_pool.lock().await.clear();
    }

    /// Resets `tick_pool`, `vote_pool`, `fork_pool`; `ping_pool` persists
    /// across cycles since faster peers may already have emitted
    /// next-round pings before we finish selecting.
    pub async fn restart_cycle(&self) {
        self.vote_pool.clear();
        self.tick_pool.lock().await.clear();
        self.fork_pool.clear();
    }
}
