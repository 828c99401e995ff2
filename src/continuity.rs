//! Informational tick scoring used only to order `tick_pool` for
//! `Pools::active_tick`'s "best so far" peek. `Selector::select`'s
//! authoritative reduction never consults it.

use crate::types::{ChainEntry, Tick};

/// Sums, over the last `window` chain entries, how many pingers of
/// `candidate` also pinged in that entry's ticks. A deterministic,
/// total-orderable function of `(candidate, chain_snapshot)`.
pub fn measure_tick_continuity(candidate: &Tick, chain: &[ChainEntry], window: usize) -> i64 {
    let candidate_pingers: std::collections::HashSet<&str> =
        candidate.list.iter().map(|p| p.pubkey.as_str()).collect();
    if candidate_pingers.is_empty() {
        return 0;
    }

    let recent = chain.iter().rev().take(window);
    let mut score: i64 = 0;
    for entry in recent {
        for tick in entry.values() {
            for ping in &tick.list {
                if candidate_pingers.contains(ping.pubkey.as_str()) {
                    score += 1;
                }
            }
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Ping, genesis_entry};
    use std::collections::BTreeMap;

    fn ping(pubkey: &str) -> Ping {
        Ping {
            pubkey: pubkey.to_string(),
            timestamp: 0,
            reference: None,
            nonce: None,
            signature: None,
        }
    }

    #[test]
    fn counts_shared_pingers_in_recent_window() {
        let genesis = genesis_entry();
        let mut older_tick = genesis.values().next().unwrap().clone();
        older_tick.list = vec![ping("alice"), ping("bob")];
        let older_entry = BTreeMap::from([("h1".to_string(), older_tick)]);

        let candidate = Tick {
            pubkey: "carl".to_string(),
            nonce: 0,
            signature: None,
            prev_tick: "h1".to_string(),
            height: 2,
            list: vec![ping("alice"), ping("zoe")],
            this_tick: None,
        };

        let chain = vec![genesis, older_entry];
        assert_eq!(measure_tick_continuity(&candidate, &chain, 1), 1);
        assert_eq!(measure_tick_continuity(&candidate, &chain, 2), 1);
    }

    #[test]
    fn empty_candidate_list_scores_zero() {
        let candidate = Tick {
            pubkey: "carl".to_string(),
            nonce: 0,
            signature: None,
            prev_tick: "h1".to_string(),
            height: 2,
            list: vec![],
            this_tick: None,
        };
        assert_eq!(measure_tick_continuity(&candidate, &[], 3), 0);
    }
}
