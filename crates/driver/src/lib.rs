//! Resumable, step-bounded execution driver.
//!
//! Drives a long-running computation on a step-limited executing program
//! to completion across multiple independent submission rounds: a
//! deterministically derived session handle names persistent scratch
//! storage, each round carries a fixed step budget, and completion is
//! detected from a terminal marker on the round's log channel.

/// Error types for the execution driver
pub mod error;

mod client;
mod driver;
mod session;

pub use client::{AccountId, AccountRef, SubmissionClient, SubmissionReceipt};
pub use driver::{
    DriverConfig, DriverConfigBuilder, ExecutionDriver, ExecutionOutcome, ExecutionRequest,
    SessionState,
};
pub use session::SessionHandle;
