//! Hashing, signing, and proof-of-work — the `Hasher`/`Crypto`/`Pow`
//! capability, deliberately a plain dependency of the core rather than
//! something the core implements by hand.
//!
//! A concrete [`Sha256Hasher`] and [`Ed25519Signer`] are provided so the
//! crate is directly testable; embedders may supply their own via the
//! [`Hasher`] / [`Crypto`] traits.

use ed25519_consensus::{Signature as EdSignature, SigningKey, VerificationKey};
use log::trace;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::{Address, PubKey, Signature};

/// Canonical encoding + hashing capability.
///
/// `serde_json::Value` objects serialize with keys ordered by `BTreeMap`
/// (this crate does not enable serde_json's `preserve_order` feature), so
/// `canonical_encode` is stable and key-sorted without extra bookkeeping.
pub trait Hasher: Send + Sync {
    fn canonical_encode(&self, value: &Value) -> Vec<u8>;
    fn hash(&self, value: &Value) -> String;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn canonical_encode(&self, value: &Value) -> Vec<u8> {
        serde_json::to_vec(value).expect("Value always serializes")
    }

    fn hash(&self, value: &Value) -> String {
        let bytes = self.canonical_encode(value);
        hex::encode(Sha256::digest(&bytes))
    }
}

/// Sign/verify/address-derivation capability.
pub trait Crypto: Send + Sync {
    fn sign(&self, bytes: &[u8], secret: &SigningKey) -> Signature;
    fn verify(&self, bytes: &[u8], signature: &str, pubkey: &str) -> bool;
    fn pubkey_to_address(&self, pubkey: &str) -> Address;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Signer;

impl Crypto for Ed25519Signer {
    fn sign(&self, bytes: &[u8], secret: &SigningKey) -> Signature {
        hex::encode(secret.sign(bytes).to_bytes())
    }

    fn verify(&self, bytes: &[u8], signature: &str, pubkey: &str) -> bool {
        let (Ok(sig_bytes), Ok(pk_bytes)) = (hex::decode(signature), hex::decode(pubkey)) else {
            return false;
        };
        let (Ok(sig_arr), Ok(pk_arr)) = (
            <[u8; 64]>::try_from(sig_bytes.as_slice()),
            <[u8; 32]>::try_from(pk_bytes.as_slice()),
        ) else {
            return false;
        };
        let Ok(vk) = VerificationKey::try_from(pk_arr) else {
            return false;
        };
        let sig = EdSignature::from(sig_arr);
        vk.verify(&sig, bytes).is_ok()
    }

    fn pubkey_to_address(&self, pubkey: &str) -> Address {
        // Address = first 40 hex chars (20 bytes) of the pubkey's hash,
        // in the style of an Ethereum-like account address.
        let digest = Sha256::digest(pubkey.as_bytes());
        hex::encode(&digest[..20])
    }
}

/// Mines a nonce such that `hasher.hash(value-with-nonce)` has at least
/// `difficulty_bits` leading zero bits. Returns `(digest, nonce)`.
pub fn mine(hasher: &dyn Hasher, value: &Value, difficulty_bits: u32) -> (String, u64) {
    let mut candidate = value.clone();
    let mut nonce: u64 = 0;
    loop {
        candidate["nonce"] = Value::from(nonce);
        let digest = hasher.hash(&candidate);
        if leading_zero_bits(&digest) >= difficulty_bits {
            trace!("mined nonce {nonce} for digest {digest}");
            return (digest, nonce);
        }
        nonce += 1;
    }
}

/// Counts leading zero bits of a hex digest.
pub fn leading_zero_bits(hex_digest: &str) -> u32 {
    let mut bits = 0;
    for c in hex_digest.chars() {
        let nibble = c.to_digit(16).unwrap_or(0);
        if nibble == 0 {
            bits += 4;
            continue;
        }
        bits += nibble.leading_zeros() - 28; // nibble fits in the low 4 bits of a u32
        break;
    }
    bits
}

/// `hash_diff(t) = |int(hash({"0":t.pubkey}) ++ hash({"0":t.prev_tick})) -
/// int(hash({"0":t.prev_tick}))|`. The concatenation of two 32-byte
/// digests is treated as one big-endian unsigned integer; the second
/// operand is the same digest alone, zero-extended to the same width.
/// Implemented with a small in-place byte-array subtraction rather than
/// pulling in a bignum dependency for a single computation.
pub fn hash_diff(hasher: &dyn Hasher, pubkey: &str, prev_tick: &str) -> HashDiff {
    let hash_pubkey = hasher.hash(&serde_json::json!({"0": pubkey}));
    let hash_prev = hasher.hash(&serde_json::json!({"0": prev_tick}));

    let mut a = hex::decode(&hash_pubkey).expect("hex digest");
    a.extend(hex::decode(&hash_prev).expect("hex digest"));
    let b = hex::decode(&hash_prev).expect("hex digest");

    HashDiff(big_sub_abs(&a, &b))
}

/// Absolute difference of two big-endian magnitudes, smaller one
/// zero-extended on the left to match.
fn big_sub_abs(a: &[u8], b: &[u8]) -> Vec<u8> {
    let len = a.len().max(b.len());
    let pad = |x: &[u8]| {
        let mut v = vec![0u8; len - x.len()];
        v.extend_from_slice(x);
        v
    };
    let a = pad(a);
    let b = pad(b);

    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };

    let mut result = vec![0u8; len];
    let mut borrow: i16 = 0;
    for i in (0..len).rev() {
        let mut diff = hi[i] as i16 - lo[i] as i16 - borrow;
        if diff < 0 {
            diff += 256;
            borrow = 1;
        } else {
            borrow = 0;
        }
        result[i] = diff as u8;
    }
    result
}

/// A big-endian unsigned magnitude, orderable for the selector's
/// max-`hash_diff` tie-break.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashDiff(Vec<u8>);

impl PartialOrd for HashDiff {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HashDiff {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Fixed-width big-endian byte vectors compare lexicographically
        // the same as their numeric magnitude.
        self.0.cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn canonical_encode_is_key_sorted() {
        let hasher = Sha256Hasher;
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        assert_eq!(hasher.canonical_encode(&a), hasher.canonical_encode(&b));
    }

    #[test]
    fn mine_meets_difficulty() {
        let hasher = Sha256Hasher;
        let value = serde_json::json!({"pubkey": "abc"});
        let (digest, _nonce) = mine(&hasher, &value, 4);
        assert!(leading_zero_bits(&digest) >= 4);
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let signer = Ed25519Signer;
        let sk = SigningKey::new(OsRng);
        let vk_hex = hex::encode(VerificationKey::from(&sk).to_bytes());
        let msg = b"hello clockchain";
        let sig = signer.sign(msg, &sk);
        assert!(signer.verify(msg, &sig, &vk_hex));
        assert!(!signer.verify(b"tampered", &sig, &vk_hex));
    }

    #[test]
    fn hash_diff_is_deterministic() {
        let hasher = Sha256Hasher;
        let a = hash_diff(&hasher, "pk1", "prev1");
        let b = hash_diff(&hasher, "pk1", "prev1");
        assert_eq!(a, b);
    }

    #[test]
    fn big_sub_abs_is_symmetric() {
        assert_eq!(big_sub_abs(&[5, 0], &[0, 3]), big_sub_abs(&[0, 3], &[5, 0]));
    }
}
