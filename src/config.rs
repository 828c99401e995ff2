//! Runtime configuration consumed by the consensus core.
//!
//! Loading this from a file or environment is outer-layer wiring and not
//! this crate's concern — callers construct a [`Config`] however they like
//! and pass it into [`crate::context::Context::new`].

use std::time::Duration;

/// Tunables recognized by the consensus core.
#[derive(Clone, Debug)]
pub struct Config {
    /// Ring capacity of [`crate::store::ChainStore`].
    pub chain_max_length: usize,
    /// Interval on which `tick_worker` attempts to build a tick.
    pub tick_period: Duration,
    /// Grace period `select_worker` waits for peer ticks before reducing.
    pub select_grace: Duration,
    /// Grace period `resync` waits before fetching peer chains.
    pub resync_grace: Duration,
    /// Proof-of-work difficulty, expressed as required leading zero bits.
    pub difficulty_target: u32,
    /// Number of trailing chain entries `measure_tick_continuity` looks at.
    pub continuity_window: usize,
    /// Selects `Selector::select_highest_voted` over `Selector::select`.
    /// Off by default; most deployments never populate `vote_pool`.
    pub use_vote_selection: bool,
    /// Allow a non-genesis tick whose `prev_tick == "prev_tick"` (the
    /// placeholder genesis reference) to validate. Only ever set during
    /// network bootstrap by an embedder, never by this crate.
    pub bootstrap_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain_max_length: 1024,
            tick_period: Duration::from_secs(5),
            select_grace: Duration::from_secs(10),
            resync_grace: Duration::from_secs(5),
            difficulty_target: 8,
            continuity_window: 3,
            use_vote_selection: false,
            bootstrap_mode: false,
        }
    }
}
