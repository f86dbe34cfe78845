//! Error types for the execution driver

use crate::session::SessionHandle;

/// Errors surfaced by a submission transport
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Submission or confirmation did not complete within the bound.
    /// The only condition eligible for automatic retry.
    #[error("submission did not reach finality within the transport timeout")]
    Timeout,

    /// The executing program rejected the submission
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The transport itself failed
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors that can occur while driving a resumable execution
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transaction was rejected before submission
    #[error(transparent)]
    Transaction(#[from] loaderkit_transaction::error::Error),

    /// A transport failure that survived the bounded retry policy
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A continuation was issued against a handle with no in-progress
    /// session. Fatal for that session, not retriable.
    #[error("session conflict: no in-progress session for handle {0}")]
    SessionConflict(SessionHandle),

    /// The configured round cap was reached before the log channel
    /// reported completion
    #[error("execution did not complete within {0} rounds")]
    RoundLimit(u64),

    /// The request carries an authentication envelope but no verifier
    /// program is configured
    #[error("request carries an authentication envelope but no verifier is configured")]
    MissingVerifier,

    /// The transaction is a contract creation and names no callee
    #[error("execution requests require a callee address")]
    MissingCallee,
}
