//! Ethereum-style transaction model built on the RLP codec.
//!
//! Decodes the canonical 9-tuple wire form, derives the chain-qualified
//! signing hash, and recovers the sending address from the attached
//! ECDSA signature. Also builds the authentication envelope payload that
//! carries a precomputed signature, digest, and recovered address for
//! out-of-band verification by an executing program.

/// Error types for the transaction model
pub mod error;

mod envelope;
mod transaction;

pub use envelope::AuthEnvelope;
pub use transaction::{recover_address, RecoverableSignature, Transaction};
