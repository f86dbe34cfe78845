use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::ClientError, session::SessionHandle};

/// Stable identity of an account or executable program on the backing
/// ledger. The driver treats identities as opaque 32-byte values.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({self})")
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        AccountId(bytes)
    }
}

/// An account reference attached to a submission. Accounts are passed by
/// stable identity in a fixed order matching the executing program's
/// expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    /// The referenced account.
    pub id: AccountId,

    /// Whether the account must sign the outer envelope.
    pub signer: bool,

    /// Whether the executing program may mutate the account.
    pub writable: bool,
}

impl AccountRef {
    /// A non-signing, read-only reference.
    pub fn readonly(id: AccountId) -> Self {
        Self { id, signer: false, writable: false }
    }

    /// A non-signing, writable reference.
    pub fn writable(id: AccountId) -> Self {
        Self { id, signer: false, writable: true }
    }
}

/// The finalized result of one submission round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// Raw log-channel entries in emission order, before any display
    /// encoding.
    pub logs: Vec<Vec<u8>>,

    /// Whether the transport confirmed finality within its timeout.
    pub finalized: bool,
}

/// A transport that submits opaque instruction payloads to an executable
/// program and polls for the finalized logs of each submission.
///
/// The driver consumes this interface and stays agnostic of the actual
/// transport, outer-envelope signing, and account-metadata semantics.
#[async_trait]
pub trait SubmissionClient {
    /// Submits `payload` to `program` with the given account references
    /// and blocks until the transport confirms finality or times out.
    async fn submit(
        &self,
        program: AccountId,
        accounts: &[AccountRef],
        payload: &[u8],
    ) -> Result<SubmissionReceipt, ClientError>;

    /// Returns whether scratch storage for `handle` already exists.
    async fn scratch_exists(&self, handle: &SessionHandle) -> Result<bool, ClientError>;

    /// Allocates scratch storage of `capacity` bytes for `handle`.
    async fn allocate_scratch(
        &self,
        handle: &SessionHandle,
        capacity: u64,
    ) -> Result<(), ClientError>;
}
