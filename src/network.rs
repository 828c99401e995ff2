//! Peer transport — the `Networker` capability, deliberately external to
//! the consensus core. Only the trait boundary plus an in-memory
//! [`MockNetworker`] (for tests and local simulation) live here; real
//! HTTP/WebSocket transport is outer-layer wiring.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::ClockchainError;
use crate::types::{Address, ChainEntry, Msg, Route};

/// Shared with [`crate::scheduler::StageScheduler`]; advisory for gossip
/// prioritization on the Networker side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Ping,
    Select,
}

/// `#[async_trait]` boxes `forward`/`fetch_chain`'s futures so the trait
/// stays object-safe and the futures are `Send`, letting
/// [`crate::scheduler::StageScheduler`] `tokio::spawn` work that awaits them.
#[async_trait]
pub trait Networker: Send + Sync {
    /// True once the peer set is usable.
    fn ready(&self) -> bool;
    fn stage(&self) -> Stage;
    fn set_stage(&self, stage: Stage);
    /// Best-effort broadcast.
    async fn forward(
        &self,
        msg: Msg,
        route: Route,
        origin: Address,
        redistribute: u32,
    ) -> Result<(), ClockchainError>;
    /// Peer address -> URL directory.
    fn reverse_peers(&self) -> HashMap<Address, String>;
    /// Blocking fetch of a peer's full chain.
    async fn fetch_chain(&self, peer: &Address) -> Result<Vec<ChainEntry>, ClockchainError>;
}

/// An in-memory [`Networker`] for tests: peers are pre-seeded with canned
/// chain responses, and every `forward` call is recorded for inspection.
pub struct MockNetworker {
    ready: AtomicBool,
    stage: Mutex<Stage>,
    peers: HashMap<Address, String>,
    chains: DashMap<Address, Vec<ChainEntry>>,
    unreachable: DashMap<Address, ()>,
    sent: Mutex<Vec<(Msg, Route, Address, u32)>>,
}

impl MockNetworker {
    pub fn new(peers: HashMap<Address, String>) -> Self {
        Self {
            ready: AtomicBool::new(true),
            stage: Mutex::new(Stage::Ping),
            peers,
            chains: DashMap::new(),
            unreachable: DashMap::new(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn seed_chain(&self, peer: &Address, chain: Vec<ChainEntry>) {
        self.chains.insert(peer.clone(), chain);
    }

    pub fn mark_unreachable(&self, peer: &Address) {
        self.unreachable.insert(peer.clone(), ());
    }

    pub async fn sent_messages(&self) -> Vec<(Msg, Route, Address, u32)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Networker for MockNetworker {
    fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn stage(&self) -> Stage {
        // try_lock is sufficient: this is an advisory read, never on the
        // critical path of a correctness invariant.
        self.stage.try_lock().map(|s| *s).unwrap_or(Stage::Ping)
    }

    fn set_stage(&self, stage: Stage) {
        if let Ok(mut guard) = self.stage.try_lock() {
            *guard = stage;
        }
    }

    async fn forward(
        &self,
        msg: Msg,
        route: Route,
        origin: Address,
        redistribute: u32,
    ) -> Result<(), ClockchainError> {
        self.sent.lock().await.push((msg, route, origin, redistribute));
        Ok(())
    }

    fn reverse_peers(&self) -> HashMap<Address, String> {
        self.peers.clone()
    }

    async fn fetch_chain(&self, peer: &Address) -> Result<Vec<ChainEntry>, ClockchainError> {
        if self.unreachable.contains_key(peer) {
            return Err(ClockchainError::Fetch(format!("peer {peer} unreachable")));
        }
        self.chains
            .get(peer)
            .map(|c| c.clone())
            .ok_or_else(|| ClockchainError::Fetch(format!("no chain known for peer {peer}")))
    }
}

impl Clone for MockNetworker {
    fn clone(&self) -> Self {
        // Only ever used to build fresh fixtures in tests; deep state
        // (sent log, seeded chains) intentionally starts empty.
        Self::new(self.peers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::genesis_entry;

    #[tokio::test]
    async fn fetch_chain_reports_unreachable_peers() {
        let net = MockNetworker::new(HashMap::from([("p1".to_string(), "http://p1".to_string())]));
        net.mark_unreachable(&"p1".to_string());
        let res = net.fetch_chain(&"p1".to_string()).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn seeded_chain_is_returned() {
        let net = MockNetworker::new(HashMap::new());
        net.seed_chain(&"p1".to_string(), vec![genesis_entry()]);
        let chain = net.fetch_chain(&"p1".to_string()).await.unwrap();
        assert_eq!(chain.len(), 1);
    }
}
