//! Explicit context passed into constructors instead of held as process
//! globals. Logging stays ambient (the `log` facade is a global by design
//! throughout the Rust ecosystem); `creds` and `cfg` are not.

use ed25519_consensus::{SigningKey, VerificationKey};

use crate::config::Config;
use crate::crypto::{Crypto, Ed25519Signer};
use crate::types::Address;

/// This node's keypair and derived address.
pub struct Credentials {
    pub pubkey: String,
    pub secret_key: SigningKey,
    pub address: Address,
}

impl Credentials {
    pub fn generate(crypto: &dyn Crypto) -> Self {
        let secret_key = SigningKey::new(rand::rngs::OsRng);
        let pubkey = hex::encode(VerificationKey::from(&secret_key).to_bytes());
        let address = crypto.pubkey_to_address(&pubkey);
        Self {
            pubkey,
            secret_key,
            address,
        }
    }

    pub fn from_secret_key(secret_key: SigningKey, crypto: &dyn Crypto) -> Self {
        let pubkey = hex::encode(VerificationKey::from(&secret_key).to_bytes());
        let address = crypto.pubkey_to_address(&pubkey);
        Self {
            pubkey,
            secret_key,
            address,
        }
    }
}

pub struct Context {
    pub creds: Credentials,
    pub cfg: Config,
}

impl Context {
    pub fn new(creds: Credentials, cfg: Config) -> Self {
        Self { creds, cfg }
    }

    pub fn bootstrap(cfg: Config) -> Self {
        let crypto = Ed25519Signer;
        Self::new(Credentials::generate(&crypto), cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_credentials_derive_consistent_address() {
        let crypto = Ed25519Signer;
        let creds = Credentials::generate(&crypto);
        assert_eq!(creds.address, crypto.pubkey_to_address(&creds.pubkey));
    }
}
