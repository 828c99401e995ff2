//! Fork detection and chain resynchronization.

use std::collections::HashMap;

use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::config::Config;
use crate::network::Networker;
use crate::pools::Pools;
use crate::store::ChainStore;
use crate::validator::Validator;

pub struct ForkResolver {
    config: Config,
}

impl ForkResolver {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// True when more peers are voting on a different `prev_tick` than
    /// ours, suggesting we are on a minority branch.
    pub async fn needs_resync(&self, pools: &Pools) -> bool {
        pools.fork_pool_len() > pools.tick_pool_len().await
    }

    /// Acquires `cycle_lock` for the duration of the resync attempt; all
    /// workers idle while it is held. Returns whether the local chain was
    /// successfully replaced.
    pub async fn resync(
        &self,
        cycle_lock: &Mutex<()>,
        pools: &Pools,
        store: &ChainStore,
        networker: &dyn Networker,
        validator: &dyn Validator,
    ) -> bool {
        let _guard = cycle_lock.lock().await;

        let fork_entries = pools.fork_pool_snapshot();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for (_, tick) in &fork_entries {
            *counts.entry(tick.prev_tick.clone()).or_insert(0) += 1;
        }

        let Some(majority_prev) = pick_majority(&counts) else {
            debug!("resync: no alternative chains known in fork_pool, aborting");
            return false;
        };
        info!("resync: majority alternative reference is {majority_prev}");

        let majority_peers: Vec<String> = fork_entries
            .iter()
            .filter(|(_, t)| t.prev_tick == majority_prev)
            .map(|(peer, _)| peer.clone())
            .collect();

        sleep(self.config.resync_grace).await;

        let mut synced = false;
        for peer in &majority_peers {
            match networker.fetch_chain(peer).await {
                Ok(chain) if validator.validate_clockchain(&chain) => {
                    if store.replace_all(chain).await.is_ok() {
                        synced = true;
                        break;
                    }
                    warn!("resync: peer {peer} chain failed store invariants, trying next peer");
                }
                Ok(_) => warn!("resync: peer {peer} returned a chain that fails validation"),
                Err(err) => warn!("resync: fetch from peer {peer} failed: {err}"),
            }
        }

        if !synced {
            warn!("resync: failed to obtain a chain from any majority peer");
            return false;
        }

        pools.clear_tick_pool().await;
        let snapshot = store.snapshot().await;
        for (_, tick) in fork_entries {
            if tick.prev_tick == majority_prev {
                pools.add_tick(tick, &snapshot).await;
            }
        }
        pools.clear_fork_pool();
        true
    }
}

/// Mode of the multiset. Ties are broken by the lexicographically
/// smallest key, since insertion order isn't tracked by the `HashMap`
/// itself — an arbitrary but deterministic choice.
fn pick_majority(counts: &HashMap<String, usize>) -> Option<String> {
    counts
        .iter()
        .max_by(|(k_a, v_a), (k_b, v_b)| v_a.cmp(v_b).then_with(|| k_b.cmp(k_a)))
        .map(|(k, _)| k.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Ed25519Signer, Sha256Hasher};
    use crate::network::MockNetworker;
    use crate::types::{Tick, genesis_entry};
    use crate::validator::DefaultValidator;
    use std::collections::BTreeMap;

    fn tick_with_prev(prev: &str, this_ref: &str) -> Tick {
        Tick {
            pubkey: "p".to_string(),
            nonce: 0,
            signature: None,
            prev_tick: prev.to_string(),
            height: 1,
            list: vec![],
            this_tick: Some(this_ref.to_string()),
        }
    }

    #[tokio::test]
    async fn needs_resync_when_forks_outnumber_ticks() {
        let pools = Pools::new(3);
        pools.add_fork("p1".to_string(), tick_with_prev("X", "f1"));
        pools.add_fork("p2".to_string(), tick_with_prev("X", "f2"));
        pools.add_fork("p3".to_string(), tick_with_prev("X", "f3"));
        pools.add_fork("p4".to_string(), tick_with_prev("X", "f4"));
        pools.add_tick(tick_with_prev("Y", "t1"), &[]).await;

        let resolver = ForkResolver::new(Config {
            resync_grace: std::time::Duration::from_millis(1),
            ..Config::default()
        });
        assert!(resolver.needs_resync(&pools).await);
    }

    #[tokio::test]
    async fn resync_succeeds_with_valid_majority_chain() {
        let pools = Pools::new(3);
        for i in 0..4 {
            pools.add_fork(format!("p{i}"), tick_with_prev("X", &format!("f{i}")));
        }
        pools.add_tick(tick_with_prev("Y", "t1"), &[]).await;

        let store = ChainStore::new(10);
        let genesis = genesis_entry();
        let (genesis_ref, _) = genesis.iter().next().unwrap();
        let mut x_tick = tick_with_prev(genesis_ref, "X");
        x_tick.height = 1;
        let x_entry = BTreeMap::from([("X".to_string(), x_tick)]);

        let net = MockNetworker::new(HashMap::from([
            ("p0".to_string(), "http://p0".to_string()),
        ]));
        net.seed_chain(&"p0".to_string(), vec![genesis.clone(), x_entry]);

        let validator = DefaultValidator::new(Sha256Hasher, Ed25519Signer, 0, true);
        let resolver = ForkResolver::new(Config {
            resync_grace: std::time::Duration::from_millis(1),
            ..Config::default()
        });
        let cycle_lock = Mutex::new(());

        let synced = resolver
            .resync(&cycle_lock, &pools, &store, &net, &validator)
            .await;
        assert!(synced);
        assert_eq!(pools.fork_pool_len(), 0);
        let tip = store.tip().await;
        assert!(tip.contains_key("X"));
    }

    #[tokio::test]
    async fn resync_fails_when_all_peers_unreachable() {
        let pools = Pools::new(3);
        for i in 0..4 {
            pools.add_fork(format!("p{i}"), tick_with_prev("X", &format!("f{i}")));
        }
        let store = ChainStore::new(10);
        let before = store.snapshot().await;

        let net = MockNetworker::new(HashMap::new());
        let validator = DefaultValidator::new(Sha256Hasher, Ed25519Signer, 0, true);
        let resolver = ForkResolver::new(Config {
            resync_grace: std::time::Duration::from_millis(1),
            ..Config::default()
        });
        let cycle_lock = Mutex::new(());

        let synced = resolver
            .resync(&cycle_lock, &pools, &store, &net, &validator)
            .await;
        assert!(!synced);
        assert_eq!(store.snapshot().await, before);
        assert!(cycle_lock.try_lock().is_ok());
    }
}
