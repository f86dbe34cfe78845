use std::fmt;

use sha2::{Digest, Sha256};

use crate::client::AccountId;

/// A deterministic identifier naming the persistent scratch storage that
/// survives across the rounds of a resumable execution.
///
/// Derivation is idempotent: the same `(payer, seed, executor)` triple
/// always yields a byte-identical handle, so a client can resume an
/// interrupted session by re-deriving it from the same seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle([u8; 32]);

impl SessionHandle {
    /// Derives the handle as `sha256(payer ‖ seed ‖ executor)`.
    pub fn derive(payer: &AccountId, seed: &str, executor: &AccountId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(payer.0);
        hasher.update(seed.as_bytes());
        hasher.update(executor.0);
        Self(hasher.finalize().into())
    }

    /// The raw handle bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The handle viewed as the identity of its scratch account.
    pub fn account_id(&self) -> AccountId {
        AccountId(self.0)
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
