//! Crate-level error taxonomy.
//!
//! Lock contention and an empty selection cycle are deliberately *not*
//! variants here: both are treated as non-errors (idle/no-op conditions),
//! so they show up as early returns in [`crate::scheduler::StageScheduler`]
//! and [`crate::selector::Selector`] respectively, logged at `trace`/`debug`.

use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum ClockchainError {
    /// A ping, tick, or chain failed shape/signature/PoW validation.
    /// Non-fatal: the caller drops the message and continues.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A remote chain fetch failed or returned a malformed response.
    /// `resync` treats this as "try the next majority peer".
    #[error("chain fetch failed: {0}")]
    Fetch(String),

    /// `ChainStore::replace_all` was given a sequence that violates the
    /// chain invariants; the store is left untouched.
    #[error("chain replace rejected: {0}")]
    StoreReplace(String),
}
