//! Error types for the RLP codec

/// Errors that can occur while decoding an RLP-encoded byte stream
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input bytes are structurally invalid. Always a local,
    /// non-retriable failure.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),
}
