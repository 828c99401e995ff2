//! Bounded FIFO of selected ticks.

use std::collections::VecDeque;

use log::{debug, warn};
use tokio::sync::RwLock;

use crate::error::ClockchainError;
use crate::types::{ChainEntry, genesis_entry};

pub struct ChainStore {
    entries: RwLock<VecDeque<ChainEntry>>,
    max_len: usize,
}

impl ChainStore {
    /// A fresh store always has the genesis entry installed.
    pub fn new(max_len: usize) -> Self {
        let mut entries = VecDeque::with_capacity(max_len.max(1));
        entries.push_back(genesis_entry());
        Self {
            entries: RwLock::new(entries),
            max_len: max_len.max(1),
        }
    }

    /// Atomic append with the drop-oldest-on-full ring rule. No partial
    /// state is visible to concurrent readers: the whole push+evict
    /// happens under a single write-lock acquisition.
    pub async fn append(&self, entry: ChainEntry) {
        let mut guard = self.entries.write().await;
        if guard.len() >= self.max_len {
            guard.pop_front();
        }
        guard.push_back(entry);
    }

    pub async fn tip(&self) -> ChainEntry {
        let guard = self.entries.read().await;
        guard.back().cloned().expect("chain store is never empty")
    }

    /// `max(e.height for e in tip.values())`.
    pub async fn height(&self) -> u64 {
        self.tip()
            .await
            .values()
            .map(|t| t.height)
            .max()
            .unwrap_or(0)
    }

    pub async fn snapshot(&self) -> Vec<ChainEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// Used only by `ForkResolver` under the cycle lock. Clears the FIFO
    /// and reinstalls the supplied sequence in order. Fails without
    /// mutating state if any entry's parent reference or height doesn't
    /// line up with the previous entry.
    pub async fn replace_all(&self, new_entries: Vec<ChainEntry>) -> Result<(), ClockchainError> {
        if new_entries.is_empty() {
            return Err(ClockchainError::StoreReplace(
                "refusing to replace chain with an empty sequence".to_string(),
            ));
        }
        for window in new_entries.windows(2) {
            let [prev, cur] = window else { unreachable!() };
            let prev_height = prev.values().map(|t| t.height).max().unwrap_or(0);
            for tick in cur.values() {
                if !prev.contains_key(&tick.prev_tick) {
                    warn!("rejecting chain replacement: unknown parent reference");
                    return Err(ClockchainError::StoreReplace(
                        "entry references a parent absent from the previous entry".to_string(),
                    ));
                }
                if tick.height != prev_height + 1 {
                    warn!("rejecting chain replacement: height mismatch");
                    return Err(ClockchainError::StoreReplace(
                        "entry height does not extend parent by one".to_string(),
                    ));
                }
            }
        }

        let mut guard = self.entries.write().await;
        guard.clear();
        let mut truncated = new_entries;
        while truncated.len() > self.max_len {
            truncated.remove(0);
        }
        guard.extend(truncated);
        debug!("chain store replaced with {} entries", guard.len());
        Ok(())
    }
}
