//! Error types for the transaction model

/// Errors that can occur while decoding or authenticating a transaction
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The raw bytes do not decode to a structurally valid transaction
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    /// A structural failure surfaced by the underlying RLP codec
    #[error(transparent)]
    Rlp(#[from] loaderkit_rlp::error::Error),

    /// Public-key recovery failed to produce a valid curve point
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// `v` does not encode a chain-qualified signature
    #[error("inconsistent chain id: v = {v} is below the replay-protected range")]
    InconsistentChainId {
        /// The offending `v` value
        v: u64,
    },
}
