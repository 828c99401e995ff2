//! A decentralized clock-chain consensus node.
//!
//! Peers exchange signed [`types::Ping`] beacons, batch them into
//! [`types::Tick`]s, and periodically reduce the competing ticks down to
//! one winning [`types::ChainEntry`] appended to a bounded
//! [`store::ChainStore`]. [`scheduler::StageScheduler`] drives the
//! repeating PING → TICK → SELECT cycle; [`fork::ForkResolver`] detects
//! and recovers from a node having committed to a minority branch.
//!
//! Most important component data structures defined in this crate are:
//! - [`pools::Pools`] holds the four in-flight message tables
//!   (`ping_pool`, `vote_pool`, `tick_pool`, `fork_pool`).
//! - [`store::ChainStore`] holds the committed, bounded chain history.
//! - [`scheduler::StageScheduler`] runs the three cooperating workers.
//!
//! Hashing, signing, peer transport, and message validation are modeled
//! as traits ([`crypto::Hasher`], [`crypto::Crypto`], [`network::Networker`],
//! [`validator::Validator`]) with reference implementations provided so the
//! crate is directly testable; embedders may supply their own.

pub mod config;
pub mod context;
pub mod continuity;
pub mod crypto;
pub mod error;
pub mod fork;
pub mod logging;
pub mod network;
pub mod pools;
pub mod scheduler;
pub mod selector;
pub mod store;
pub mod types;
pub mod validator;

pub use config::Config;
pub use context::{Context, Credentials};
pub use error::ClockchainError;
pub use fork::ForkResolver;
pub use pools::Pools;
pub use scheduler::StageScheduler;
pub use selector::Selector;
pub use store::ChainStore;
