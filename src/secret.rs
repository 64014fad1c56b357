//! Secret values for contact verification
//!
//! Every replica executing a transaction must write the same secret, so a
//! provider may only depend on the transaction itself and on configuration
//! shared across the network. Local randomness would split consensus.

use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Minimum number of hex characters a derived secret may be truncated to
pub const MIN_SECRET_LENGTH: usize = 16;

/// Inputs a provider may draw on
#[derive(Debug, Clone, Copy)]
pub struct SecretContext<'a> {
    pub transaction_id: &'a str,
    pub timestamp: DateTime<Utc>,
    pub contact_id: &'a str,
    pub secret_id: &'a str,
}

pub trait SecretProvider: Send + Sync {
    fn produce(&self, ctx: &SecretContext<'_>) -> Result<String>;
}

/// Derives the secret from a network-wide key and the transaction.
pub struct DerivedSecretProvider {
    network_key: Vec<u8>,
    length: usize,
}

impl DerivedSecretProvider {
    pub fn new(network_key: impl Into<Vec<u8>>, length: usize) -> Result<Self> {
        let network_key = network_key.into();
        if network_key.is_empty() {
            return Err(LedgerError::ConfigError(
                "secret provider needs a non-empty network key".to_string(),
            ));
        }
        if !(MIN_SECRET_LENGTH..=64).contains(&length) {
            return Err(LedgerError::ConfigError(format!(
                "secret length must be between {} and 64, got {}",
                MIN_SECRET_LENGTH, length
            )));
        }
        Ok(DerivedSecretProvider {
            network_key,
            length,
        })
    }
}

impl SecretProvider for DerivedSecretProvider {
    fn produce(&self, ctx: &SecretContext<'_>) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(b"viridian-contact-secret");
        hasher.update((self.network_key.len() as u64).to_le_bytes());
        hasher.update(&self.network_key);
        // Length-prefix each part so field boundaries cannot shift
        for part in [ctx.transaction_id, ctx.contact_id, ctx.secret_id] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hasher.update(ctx.timestamp.timestamp_millis().to_le_bytes());

        let mut secret = hex::encode(hasher.finalize());
        secret.truncate(self.length);
        Ok(secret)
    }
}

/// Hands out the same value for every contact. Tests only.
pub struct FixedSecretProvider {
    value: String,
}

impl FixedSecretProvider {
    pub fn new(value: impl Into<String>) -> Self {
        FixedSecretProvider {
            value: value.into(),
        }
    }
}

impl SecretProvider for FixedSecretProvider {
    fn produce(&self, _ctx: &SecretContext<'_>) -> Result<String> {
        Ok(self.value.clone())
    }
}
