//! Shape/signature/PoW/schema validation — the `Validator` capability,
//! external to the consensus core but provided here in a reference
//! implementation so the crate is self-testing.

use log::debug;

use crate::crypto::{Crypto, Hasher, leading_zero_bits};
use crate::types::{ChainEntry, Ping, Tick};

pub trait Validator: Send + Sync {
    /// `ping_pool` lets an implementation cross-check against concurrently
    /// pooled pings (e.g. reject something that already collapsed via
    /// same-address upsert); the reference implementation doesn't need it
    /// but accepts it so other implementations of this trait can.
    fn validate_ping(&self, ping: &Ping, ping_pool: Option<&[Ping]>, is_vote: bool) -> bool;
    fn validate_tick(&self, tick: &Tick, prev_tick: &Tick, verbose: bool) -> bool;
    fn validate_clockchain(&self, chain: &[ChainEntry]) -> bool;
}

pub struct DefaultValidator<H: Hasher, C: Crypto> {
    hasher: H,
    crypto: C,
    difficulty_bits: u32,
    bootstrap_mode: bool,
}

impl<H: Hasher, C: Crypto> DefaultValidator<H, C> {
    pub fn new(hasher: H, crypto: C, difficulty_bits: u32, bootstrap_mode: bool) -> Self {
        Self {
            hasher,
            crypto,
            difficulty_bits,
            bootstrap_mode,
        }
    }

    fn meets_difficulty(&self, digest: &str) -> bool {
        leading_zero_bits(digest) >= self.difficulty_bits
    }
}

impl<H: Hasher, C: Crypto> Validator for DefaultValidator<H, C> {
    fn validate_ping(&self, ping: &Ping, _ping_pool: Option<&[Ping]>, is_vote: bool) -> bool {
        let Some(signature) = &ping.signature else {
            debug!("ping missing signature");
            return false;
        };
        let body = self.hasher.canonical_encode(&ping.unsigned_value());
        if !self.crypto.verify(&body, signature, &ping.pubkey) {
            debug!("ping signature invalid");
            return false;
        }
        let digest = self.hasher.hash(&ping.unsigned_value());
        if !self.meets_difficulty(&digest) {
            debug!("ping fails PoW target");
            return false;
        }
        if is_vote && ping.reference.is_none() {
            debug!("vote missing reference to candidate tick");
            return false;
        }
        true
    }

    fn validate_tick(&self, tick: &Tick, prev_tick: &Tick, verbose: bool) -> bool {
        if tick.prev_tick == Tick::GENESIS_PLACEHOLDER_PREV && !self.bootstrap_mode {
            if verbose {
                debug!("tick references placeholder genesis prev_tick outside bootstrap mode");
            }
            return false;
        }

        let prev_ref = prev_tick.this_tick.clone().unwrap_or_else(|| {
            self.hasher.hash(&prev_tick.body_value())
        });
        if tick.prev_tick != prev_ref {
            if verbose {
                debug!("tick.prev_tick does not match supplied parent");
            }
            return false;
        }

        if tick.height != prev_tick.height + 1 {
            if verbose {
                debug!("tick height does not extend parent by exactly one");
            }
            return false;
        }

        let is_genesis_height = tick.height == 0;
        if !is_genesis_height {
            if tick.list.is_empty() {
                if verbose {
                    debug!("non-genesis tick has empty ping list");
                }
                return false;
            }
            if tick.list.iter().any(|p| p.reference.as_deref() != Some(tick.prev_tick.as_str())) {
                if verbose {
                    debug!("tick contains a ping not referencing its own prev_tick");
                }
                return false;
            }
        }

        let Some(signature) = &tick.signature else {
            if verbose {
                debug!("tick missing signature");
            }
            return false;
        };
        let body = self.hasher.canonical_encode(&tick.body_value());
        if !self.crypto.verify(&body, signature, &tick.pubkey) {
            if verbose {
                debug!("tick signature invalid");
            }
            return false;
        }

        let digest = self.hasher.hash(&tick.body_value());
        if !self.meets_difficulty(&digest) {
            if verbose {
                debug!("tick fails PoW target");
            }
            return false;
        }
        if let Some(this_tick) = &tick.this_tick {
            if this_tick != &digest {
                if verbose {
                    debug!("tick.this_tick does not match recomputed digest");
                }
                return false;
            }
        }

        true
    }

    fn validate_clockchain(&self, chain: &[ChainEntry]) -> bool {
        if chain.is_empty() {
            return false;
        }
        for window in chain.windows(2) {
            let [prev_entry, entry] = window else { unreachable!() };
            let prev_height = prev_entry.values().map(|t| t.height).max().unwrap_or(0);
            for (tick_ref, tick) in entry {
                if !prev_entry.contains_key(&tick.prev_tick) {
                    debug!("tick {tick_ref} does not reference a known parent");
                    return false;
                }
                if tick.height != prev_height + 1 {
                    debug!("tick {tick_ref} has inconsistent height");
                    return false;
                }
                let Some(prev_tick) = prev_entry.get(&tick.prev_tick) else {
                    return false;
                };
                if !self.validate_tick(tick, prev_tick, false) {
                    return false;
                }
            }
        }
        true
    }
}
