//! Three cooperating workers driving the node through repeating
//! PING → TICK → SELECT phases.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use color_eyre::Result;
use fastrace::Span;
use fastrace::future::FutureExt;
use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::context::Context;
use crate::crypto::{Crypto, Hasher, mine};
use crate::fork::ForkResolver;
use crate::network::{Networker, Stage};
use crate::pools::Pools;
use crate::selector::Selector;
use crate::store::ChainStore;
use crate::types::{Msg, Ping, Route, Tick};
use crate::validator::Validator;

pub struct StageScheduler<N: Networker, V: Validator, H: Hasher, C: Crypto> {
    context: Context,
    pools: Arc<Pools>,
    store: Arc<ChainStore>,
    networker: Arc<N>,
    validator: Arc<V>,
    hasher: Arc<H>,
    crypto: Arc<C>,
    fork_resolver: ForkResolver,
    selector: Selector,
    cycle_lock: Arc<Mutex<()>>,
    added_ping: Arc<AtomicBool>,
    cancel_token: CancellationToken,
}

impl<N, V, H, C> StageScheduler<N, V, H, C>
where
    N: Networker + 'static,
    V: Validator + 'static,
    H: Hasher + 'static,
    C: Crypto + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: Context,
        pools: Arc<Pools>,
        store: Arc<ChainStore>,
        networker: Arc<N>,
        validator: Arc<V>,
        hasher: Arc<H>,
        crypto: Arc<C>,
    ) -> Self {
        let fork_resolver = ForkResolver::new(context.cfg.clone());
        Self {
            context,
            pools,
            store,
            networker,
            validator,
            hasher,
            crypto,
            fork_resolver,
            selector: Selector::new(),
            cycle_lock: Arc::new(Mutex::new(())),
            added_ping: Arc::new(AtomicBool::new(false)),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    fn cfg(&self) -> &Config {
        &self.context.cfg
    }

    /// Spawns the three workers and waits for cancellation.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let ping_span = Span::enter_with_local_parent("ping worker");
        let nn = self.clone();
        let ping_task = tokio::spawn(async move { nn.ping_worker().await }.in_span(ping_span));

        let tick_span = Span::enter_with_local_parent("tick worker");
        let nn = self.clone();
        let tick_task = tokio::spawn(async move { nn.tick_worker().await }.in_span(tick_span));

        let select_span = Span::enter_with_local_parent("select worker");
        let nn = self.clone();
        let select_task =
            tokio::spawn(async move { nn.select_worker().await }.in_span(select_span));

        self.cancel_token.cancelled().await;
        ping_task.abort();
        tick_task.abort();
        select_task.abort();
        Ok(())
    }

    async fn current_tip_ref(&self) -> String {
        let tip = self.store.tip().await;
        tip.keys().next().cloned().unwrap_or_default()
    }

    /// while true: if ready ∧ ¬added_ping ∧ S ≠ SELECT ∧ ¬locked, build a
    /// local ping referencing the tip, mine, sign, validate, admit,
    /// broadcast.
    async fn ping_worker(&self) -> Result<()> {
        loop {
            if self.cancel_token.is_cancelled() {
                return Ok(());
            }
            let ready = self.networker.ready();
            let already_added = self.added_ping.load(Ordering::SeqCst);
            let locked = self.cycle_lock.try_lock().is_err();
            if ready && !already_added && self.networker.stage() != Stage::Select && !locked {
                self.networker.set_stage(Stage::Ping);
                debug!("ping stage ----------------------------------------");
                if self.generate_and_process_ping().await {
                    self.added_ping.store(true, Ordering::SeqCst);
                }
            } else {
                sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }

    /// every ≈tick_period: if ready ∧ ¬locked ∧ ping_pool ≠ ∅, build,
    /// mine, sign, validate, admit, broadcast, clear ping_pool, set
    /// S = SELECT.
    async fn tick_worker(&self) -> Result<()> {
        loop {
            if self.cancel_token.is_cancelled() {
                return Ok(());
            }
            sleep(self.cfg().tick_period).await;
            let locked = self.cycle_lock.try_lock().is_err();
            if !self.networker.ready() || locked {
                continue;
            }
            if self.pools.ping_pool_len() == 0 {
                debug!("tick_worker: no pings, waiting");
                continue;
            }
            info!("tick_worker: ping_pool not empty, building tick");
            self.generate_and_process_tick().await;
            self.networker.set_stage(Stage::Select);
        }
    }

    /// every ≈tick_period: if tick_pool ≠ ∅ ∧ ¬locked, sleep select_grace,
    /// resync if needed, then select().
    async fn select_worker(&self) -> Result<()> {
        loop {
            if self.cancel_token.is_cancelled() {
                return Ok(());
            }
            sleep(self.cfg().tick_period).await;
            let locked = self.cycle_lock.try_lock().is_err();
            if self.pools.tick_pool_len().await == 0 || locked {
                continue;
            }
            self.networker.set_stage(Stage::Select);
            debug!("select stage --------------------------------------");
            sleep(self.cfg().select_grace).await;

            debug!(
                "tick_pool={} fork_pool={}",
                self.pools.tick_pool_len().await,
                self.pools.fork_pool_len()
            );

            if self.fork_resolver.needs_resync(&self.pools).await {
                debug!("detected minority fork, syncing");
                let synced = self
                    .fork_resolver
                    .resync(
                        &self.cycle_lock,
                        &self.pools,
                        &self.store,
                        self.networker.as_ref(),
                        self.validator.as_ref(),
                    )
                    .await;
                if !synced {
                    warn!("sync failed, retrying next cycle");
                }
            }

            if self.cfg().use_vote_selection {
                self.selector.select_highest_voted(&self.pools, &self.store).await;
            } else {
                self.selector
                    .select(&self.pools, &self.store, self.hasher.as_ref())
                    .await;
            }
            self.added_ping.store(false, Ordering::SeqCst);
            self.networker.set_stage(Stage::Ping);
        }
    }

    async fn generate_and_process_ping(&self) -> bool {
        let reference = self.current_tip_ref().await;
        let mut ping = Ping {
            pubkey: self.context.creds.pubkey.clone(),
            timestamp: time::OffsetDateTime::now_utc().unix_timestamp(),
            reference: Some(reference),
            nonce: None,
            signature: None,
        };

        let (_, nonce) = mine(
            self.hasher.as_ref(),
            &ping.unsigned_value(),
            self.cfg().difficulty_target,
        );
        ping.nonce = Some(nonce);

        let body = self.hasher.canonical_encode(&ping.unsigned_value());
        let signature = self.crypto.sign(&body, &self.context.creds.secret_key);
        ping.signature = Some(signature);

        if !self.validator.validate_ping(&ping, None, false) {
            debug!("failed own ping validation");
            return false;
        }

        self.pools
            .add_ping(self.context.creds.address.clone(), ping.clone());

        let origin = self.context.creds.address.clone();
        if let Err(err) = self
            .networker
            .forward(Msg::Ping(ping), Route::Ping, origin, 0)
            .await
        {
            warn!("failed to forward own ping: {err}");
        }
        true
    }

    async fn generate_and_process_tick(&self) {
        let tip = self.store.tip().await;
        let (prev_ref, prev_tick) = tip.iter().next().expect("chain is never empty").clone();

        let mut tick = Tick {
            pubkey: self.context.creds.pubkey.clone(),
            nonce: 0,
            signature: None,
            prev_tick: prev_ref,
            height: prev_tick.height + 1,
            list: self.pools.ping_pool_values(),
            this_tick: None,
        };

        let (this_tick, nonce) = mine(
            self.hasher.as_ref(),
            &tick.body_value(),
            self.cfg().difficulty_target,
        );
        tick.nonce = nonce;

        let body = self.hasher.canonical_encode(&tick.body_value());
        let signature = self.crypto.sign(&body, &self.context.creds.secret_key);
        tick.signature = Some(signature);
        tick.this_tick = Some(this_tick);

        if !self.validator.validate_tick(&tick, &prev_tick, true) {
            debug!("failed own tick validation, not forwarded");
            return;
        }

        let snapshot = self.store.snapshot().await;
        self.pools.add_tick(tick.clone(), &snapshot).await;

        let origin = self.context.creds.address.clone();
        if let Err(err) = self
            .networker
            .forward(Msg::Tick(tick), Route::Tick, origin, 0)
            .await
        {
            warn!("failed to forward own tick: {err}");
        }

        self.pools.clear_ping_pool();
    }

    /// Ingests a peer-built ping (or vote) into the relevant pool. Called
    /// by the embedder's message-handling loop.
    pub fn ingest_ping(&self, origin: &str, ping: Ping, is_vote: bool) {
        if !self.validator.validate_ping(&ping, None, is_vote) {
            debug!("dropping invalid inbound ping from {origin}");
            return;
        }
        if is_vote {
            self.pools.add_vote(origin.to_string(), &ping);
        } else {
            self.pools.add_ping(origin.to_string(), ping);
        }
    }

    /// Ingests a peer-built tick: into `tick_pool` if it extends our tip,
    /// `fork_pool` otherwise.
    pub async fn ingest_tick(&self, origin: &str, tick: Tick) {
        let tip = self.store.tip().await;
        let Some(prev_tick) = tip.get(&tick.prev_tick) else {
            debug!("tick from {origin} forks from our tip, routing to fork_pool");
            self.pools.add_fork(origin.to_string(), tick);
            return;
        };
        if !self.validator.validate_tick(&tick, prev_tick, false) {
            debug!("dropping invalid inbound tick from {origin}");
            return;
        }
        let snapshot = self.store.snapshot().await;
        self.pools.add_tick(tick, &snapshot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Ed25519Signer, Sha256Hasher};
    use crate::network::MockNetworker;
    use crate::validator::DefaultValidator;
    use std::collections::HashMap;

    fn test_scheduler() -> Arc<
        StageScheduler<MockNetworker, DefaultValidator<Sha256Hasher, Ed25519Signer>, Sha256Hasher, Ed25519Signer>,
    > {
        let crypto = Ed25519Signer;
        let cfg = Config {
            difficulty_target: 0,
            tick_period: std::time::Duration::from_millis(5),
            select_grace: std::time::Duration::from_millis(1),
            resync_grace: std::time::Duration::from_millis(1),
            ..Config::default()
        };
        let context = Context::bootstrap(cfg.clone());
        Arc::new(StageScheduler::new(
            context,
            Arc::new(Pools::new(3)),
            Arc::new(ChainStore::new(10)),
            Arc::new(MockNetworker::new(HashMap::new())),
            Arc::new(DefaultValidator::new(Sha256Hasher, crypto, 0, false)),
            Arc::new(Sha256Hasher),
            Arc::new(Ed25519Signer),
        ))
    }

    #[tokio::test]
    async fn own_ping_is_admitted_and_forwarded() {
        let scheduler = test_scheduler();
        assert!(scheduler.generate_and_process_ping().await);
        assert_eq!(scheduler.pools.ping_pool_len(), 1);
        assert_eq!(scheduler.networker.sent_messages().await.len(), 1);
    }

    #[tokio::test]
    async fn own_tick_clears_ping_pool() {
        let scheduler = test_scheduler();
        scheduler.generate_and_process_ping().await;
        assert_eq!(scheduler.pools.ping_pool_len(), 1);
        scheduler.generate_and_process_tick().await;
        assert_eq!(scheduler.pools.ping_pool_len(), 0);
        assert_eq!(scheduler.pools.tick_pool_len().await, 1);
    }

    #[tokio::test]
    async fn ingest_tick_with_unknown_parent_goes_to_fork_pool() {
        let scheduler = test_scheduler();
        let stray = Tick {
            pubkey: "x".to_string(),
            nonce: 0,
            signature: None,
            prev_tick: "unknown-parent".to_string(),
            height: 99,
            list: vec![],
            this_tick: Some("stray".to_string()),
        };
        scheduler.ingest_tick("peer1", stray).await;
        assert_eq!(scheduler.pools.fork_pool_len(), 1);
        assert_eq!(scheduler.pools.tick_pool_len().await, 0);
    }
}
