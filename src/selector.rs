//! Deterministic tick-selection reduction: picks one winning tick (or,
//! when a tie survives both reductions, a multi-entry fork `ChainEntry`)
//! and commits it to the [`crate::store::ChainStore`].

use std::collections::BTreeMap;

use log::{debug, info};

use crate::crypto::{Hasher, hash_diff};
use crate::pools::Pools;
use crate::store::ChainStore;
use crate::types::{ChainEntry, Tick};

pub struct Selector;

impl Selector {
    pub fn new() -> Self {
        Self
    }

    /// Reduces the tick pool to a winning tick by ping count, tie-broken
    /// by hash distance. A no-op on an empty tick pool. Returns `true`
    /// iff a `ChainEntry` was appended.
    pub async fn select(&self, pools: &Pools, store: &ChainStore, hasher: &dyn Hasher) -> bool {
        let candidates = pools.all_ticks().await;
        if candidates.is_empty() {
            debug!("select: tick_pool empty, nothing to do");
            return false;
        }

        let winners = reduce(candidates, hasher);
        let entry: ChainEntry = winners
            .into_iter()
            .filter_map(|t| t.this_tick.clone().map(|r| (r, t)))
            .collect();

        if entry.is_empty() {
            debug!("select: no candidate carried a computable reference");
            return false;
        }

        if entry.len() > 1 {
            info!("select: tie survived reduction, committing a {}-way fork entry", entry.len());
        }

        store.append(entry).await;
        pools.restart_cycle().await;
        true
    }

    /// Alternative selection strategy that commits the tick(s) matching
    /// the most-voted-for reference in `vote_pool` instead of reducing
    /// `tick_pool` directly. Gated behind `Config::use_vote_selection`.
    pub async fn select_highest_voted(&self, pools: &Pools, store: &ChainStore) -> bool {
        let counts = pools.vote_counts();
        let Some(&top_score) = counts.values().max() else {
            debug!("select_highest_voted: vote_pool empty, nothing to do");
            return false;
        };
        let top_refs: Vec<_> = counts
            .into_iter()
            .filter(|(_, score)| *score == top_score)
            .map(|(reference, _)| reference)
            .collect();

        let winners = pools.ticks_by_ref(&top_refs).await;
        if winners.is_empty() {
            debug!("select_highest_voted: no pooled tick matches top-voted references");
            return false;
        }

        let entry: ChainEntry = winners
            .into_iter()
            .filter_map(|t| t.this_tick.clone().map(|r| (r, t)))
            .collect();
        store.append(entry).await;
        pools.restart_cycle().await;
        true
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduces by max ping count, then by max `hash_diff`. Whatever remains
/// (possibly more than one) is returned — the caller decides whether to
/// commit as a single winner or a fork entry.
fn reduce(candidates: Vec<Tick>, hasher: &dyn Hasher) -> Vec<Tick> {
    let max_len = candidates.iter().map(|t| t.list.len()).max().unwrap_or(0);
    let by_len: Vec<Tick> = candidates
        .into_iter()
        .filter(|t| t.list.len() == max_len)
        .collect();

    if by_len.len() <= 1 {
        return by_len;
    }

    let diffs: BTreeMap<usize, _> = by_len
        .iter()
        .enumerate()
        .map(|(i, t)| (i, hash_diff(hasher, &t.pubkey, &t.prev_tick)))
        .collect();
    let max_diff = diffs.values().max().cloned();
    let Some(max_diff) = max_diff else {
        return by_len;
    };

    by_len
        .into_iter()
        .enumerate()
        .filter(|(i, _)| diffs.get(i) == Some(&max_diff))
        .map(|(_, t)| t)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Sha256Hasher;
    use crate::types::{Ping, genesis_entry};

    fn ping(pubkey: &str) -> Ping {
        Ping {
            pubkey: pubkey.to_string(),
            timestamp: 0,
            reference: None,
            nonce: None,
            signature: None,
        }
    }

    fn tick(pubkey: &str, this_ref: &str, list_len: usize) -> Tick {
        Tick {
            pubkey: pubkey.to_string(),
            nonce: 0,
            signature: None,
            prev_tick: "parent".to_string(),
            height: 1,
            list: (0..list_len).map(|i| ping(&format!("pinger{i}"))).collect(),
            this_tick: Some(this_ref.to_string()),
        }
    }

    #[tokio::test]
    async fn select_on_empty_pool_is_noop() {
        let pools = Pools::new(3);
        let store = ChainStore::new(10);
        let hasher = Sha256Hasher;
        let before = store.snapshot().await;
        assert!(!Selector::new().select(&pools, &store, &hasher).await);
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn single_winner_by_ping_count() {
        let pools = Pools::new(3);
        let store = ChainStore::new(10);
        let hasher = Sha256Hasher;

        pools.add_tick(tick("a", "ta", 3), &[]).await;
        pools.add_tick(tick("b", "tb", 5), &[]).await;
        pools.add_tick(tick("c", "tc", 5), &[]).await;

        Selector::new().select(&pools, &store, &hasher).await;
        let tip = store.tip().await;
        assert_eq!(tip.len(), 1);
        assert!(tip.contains_key("tb") || tip.contains_key("tc"));
        assert_eq!(store.height().await, 1);
    }

    #[tokio::test]
    async fn tie_commits_fork_entry() {
        let pools = Pools::new(3);
        let store = ChainStore::new(10);
        let hasher = Sha256Hasher;

        // Identical pubkey/prev_tick => identical hash_diff too.
        pools.add_tick(tick("same", "ta", 3), &[]).await;
        let mut t2 = tick("same", "tb", 3);
        t2.pubkey = "same".to_string();
        pools.add_tick(t2, &[]).await;

        Selector::new().select(&pools, &store, &hasher).await;
        let tip = store.tip().await;
        assert_eq!(tip.len(), 2);
        assert_eq!(store.height().await, 1);
    }

    #[tokio::test]
    async fn select_is_order_independent() {
        let hasher = Sha256Hasher;
        let ticks = vec![tick("a", "ta", 3), tick("b", "tb", 5), tick("c", "tc", 4)];

        let forward = reduce(ticks.clone(), &hasher);
        let mut shuffled = ticks;
        shuffled.reverse();
        let reversed = reduce(shuffled, &hasher);

        let forward_refs: Vec<_> = forward.iter().filter_map(|t| t.this_tick.clone()).collect();
        let reversed_refs: Vec<_> = reversed.iter().filter_map(|t| t.this_tick.clone()).collect();
        assert_eq!(forward_refs, reversed_refs);
    }

    #[tokio::test]
    async fn genesis_snapshot_is_available_for_continuity() {
        let snapshot = vec![genesis_entry()];
        assert_eq!(snapshot.len(), 1);
    }
}
