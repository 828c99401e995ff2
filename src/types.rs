//! Tagged record types for pings, ticks, votes, and chain entries.
//!
//! Records are value types: once constructed they are immutable, and are
//! cloned rather than mutated in place by any caller that needs a
//! modified copy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub type Address = String;
pub type PubKey = String;
pub type Signature = String;
/// Hex digest naming a tick: the hash of its body minus `signature` and
/// `this_tick`.
pub type Reference = String;

/// A signed liveness beacon pointing at the current chain tip (or, as a
/// [`Vote`], at a tick-in-flight).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ping {
    pub pubkey: PubKey,
    pub timestamp: i64,
    /// Absent only for the special-cased genesis ping.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reference: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nonce: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<Signature>,
}

impl Ping {
    /// The JSON value hashed/mined/signed over: the ping minus its
    /// signature field.
    pub fn unsigned_value(&self) -> Value {
        let mut obj = json!({
            "pubkey": self.pubkey,
            "timestamp": self.timestamp,
        });
        if let Some(r) = &self.reference {
            obj["reference"] = json!(r);
        }
        if let Some(n) = self.nonce {
            obj["nonce"] = json!(n);
        }
        obj
    }
}

/// A `Ping` whose `reference` names a tick in the tick_pool rather than the
/// chain tip. Identical wire shape; the distinction is purely contextual
/// (how it is routed and stored).
pub type Vote = Ping;

/// A signed batch of pings forming one chain step.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tick {
    pub pubkey: PubKey,
    pub nonce: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<Signature>,
    pub prev_tick: Reference,
    pub height: u64,
    pub list: Vec<Ping>,
    /// Memoized content hash. Not authoritative — recomputable from the
    /// rest of the body via [`Tick::body_value`].
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub this_tick: Option<Reference>,
}

impl Tick {
    /// The JSON value hashed/mined/signed over: the tick minus `signature`
    /// and `this_tick`.
    pub fn body_value(&self) -> Value {
        json!({
            "pubkey": self.pubkey,
            "nonce": self.nonce,
            "prev_tick": self.prev_tick,
            "height": self.height,
            "list": self.list.iter().map(Ping::unsigned_value).collect::<Vec<_>>(),
        })
    }

    /// Placeholder previous-tick reference used only by the seeded genesis
    /// tick. Non-genesis ticks referencing this are rejected unless the
    /// validator runs in bootstrap mode.
    pub const GENESIS_PLACEHOLDER_PREV: &'static str = "prev_tick";
}

/// One slot in the bounded-FIFO chain: usually one tick, occasionally
/// several when a tie survives `Selector::select`'s reduction.
pub type ChainEntry = BTreeMap<Reference, Tick>;

/// Which wire route a [`Msg`] travels, mirroring `Networker::forward`'s
/// `route` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Ping,
    Tick,
    Vote,
}

/// Sum type for anything that travels a wire route.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Msg {
    Ping(Ping),
    Tick(Tick),
    Vote(Vote),
}

/// The genesis tick, identical on every node.
pub fn genesis_tick() -> Tick {
    Tick {
        pubkey: "pubkey".to_string(),
        nonce: 68_696_043_434,
        signature: None,
        prev_tick: Tick::GENESIS_PLACEHOLDER_PREV.to_string(),
        height: 0,
        list: vec![Ping {
            pubkey: "pubkey".to_string(),
            timestamp: 0,
            reference: None,
            nonce: None,
            signature: None,
        }],
        this_tick: Some(
            "55f5b323471532d860b11d4fc079ba38819567aa0915d83d4636d12e498a8f3e".to_string(),
        ),
    }
}

/// The genesis [`ChainEntry`] installed on every fresh [`crate::store::ChainStore`].
pub fn genesis_entry() -> ChainEntry {
    let tick = genesis_tick();
    let tick_ref = tick.this_tick.clone().expect("genesis tick has a fixed ref");
    BTreeMap::from([(tick_ref, tick)])
}
