use alloy::primitives::Address;
use derive_builder::Builder;
use loaderkit_transaction::{AuthEnvelope, Transaction};
use tokio_retry::{strategy::FixedInterval, RetryIf};
use tracing::{debug, trace, warn};

use crate::{
    client::{AccountId, AccountRef, SubmissionClient, SubmissionReceipt},
    error::{ClientError, Error},
    session::SessionHandle,
};

/// The lifecycle of a resumable execution session.
///
/// `Completed` is only observable from the log channel of the final
/// round; a handle whose scratch storage exists is reported as
/// `InProgress` until a round carries the terminal marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No scratch storage exists for the handle yet.
    NotStarted,
    /// Scratch storage exists and continuation rounds may be issued.
    InProgress,
    /// A round's log channel carried the terminal marker.
    Completed,
}

/// An opaque execution request: who calls what, with which data, and the
/// account references the executing program expects alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// The calling address.
    pub caller: Address,

    /// The called address.
    pub callee: Address,

    /// Call data forwarded to the callee.
    pub call_data: Vec<u8>,

    /// Account references passed with every round, in the fixed order
    /// the executing program expects. The scratch account is prepended
    /// by the driver.
    pub accounts: Vec<AccountRef>,

    /// Optional authentication envelope, submitted to the verifier
    /// program before the initiation round.
    pub envelope: Option<AuthEnvelope>,
}

impl ExecutionRequest {
    /// Builds a request from a signed transaction. The caller is the
    /// recovered sender, the callee the transaction's `to`, and the
    /// attached envelope carries the signing-message pre-image under
    /// `envelope_opcode`.
    pub fn from_transaction(
        tx: &Transaction,
        envelope_opcode: u8,
        accounts: Vec<AccountRef>,
    ) -> Result<Self, Error> {
        let callee = tx.to.ok_or(Error::MissingCallee)?;
        let caller = tx.sender()?;
        let signature = tx.signature()?;
        let message = tx.signing_message(None)?;

        Ok(Self {
            caller,
            callee,
            call_data: tx.data.clone(),
            accounts,
            envelope: Some(AuthEnvelope::over_message(
                envelope_opcode,
                &message,
                &signature,
                caller,
            )),
        })
    }

    /// Serializes the request body: `callee(20) ‖ caller(20) ‖ call data`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(40 + self.call_data.len());
        out.extend_from_slice(self.callee.as_slice());
        out.extend_from_slice(self.caller.as_slice());
        out.extend_from_slice(&self.call_data);
        out
    }
}

/// The accumulated result of a completed execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// The bytes of the terminal log entry after the done tag.
    pub return_data: Vec<u8>,

    /// Number of rounds submitted to the executing program, including
    /// the initiation round.
    pub rounds: u64,

    /// Every log-channel entry observed, in emission order.
    pub logs: Vec<Vec<u8>>,
}

/// Configuration for an [`ExecutionDriver`]. All identities are explicit
/// values; nothing is read from ambient state.
#[derive(Debug, Clone, Builder)]
pub struct DriverConfig {
    /// The executable program driven through the protocol.
    pub executor: AccountId,

    /// The account funding scratch allocation; one of the three inputs
    /// to session-handle derivation.
    pub payer: AccountId,

    /// The program that verifies authentication envelopes, when requests
    /// carry one.
    #[builder(default)]
    pub verifier: Option<AccountId>,

    /// Opcode tag selecting "initiate bounded execution".
    #[builder(default = "0x09")]
    pub initiate_opcode: u8,

    /// Opcode tag selecting "continue bounded execution".
    #[builder(default = "0x0a")]
    pub continue_opcode: u8,

    /// First byte of the terminal log entry signalling completion.
    #[builder(default = "0x06")]
    pub done_tag: u8,

    /// Maximum execution steps per round. A fixed, client-chosen
    /// constant; the driver never adapts it to observed progress.
    #[builder(default = "100")]
    pub step_budget: u64,

    /// Capacity of the scratch storage allocated for a new session,
    /// large enough for the maximum in-flight execution context.
    #[builder(default = "128 * 1024")]
    pub scratch_capacity: u64,

    /// Additional submission attempts after a transport timeout.
    #[builder(default = "3")]
    pub retry_attempts: usize,

    /// Fixed interval between retry attempts, in milliseconds.
    #[builder(default = "200")]
    pub retry_interval_ms: u64,

    /// Optional cap on rounds per execution. `None` leaves termination
    /// to the caller's choice of step budget.
    #[builder(default)]
    pub max_rounds: Option<u64>,
}

/// Drives a step-bounded execution to completion across multiple
/// independent submission rounds.
///
/// Each round is a blocking submit-then-confirm operation; the driver
/// inspects the round's log channel and keeps issuing continuation
/// rounds until the terminal marker appears. No two rounds for the same
/// session handle may be in flight concurrently; sessions with distinct
/// handles are fully independent.
#[derive(Debug)]
pub struct ExecutionDriver<C> {
    client: C,
    config: DriverConfig,
}

impl<C: SubmissionClient + Send + Sync> ExecutionDriver<C> {
    /// Creates a driver over the given transport and configuration.
    pub fn new(client: C, config: DriverConfig) -> Self {
        Self { client, config }
    }

    /// The driver's configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Reports the externally observable state of the session named by
    /// `seed`.
    pub async fn session_state(&self, seed: &str) -> Result<SessionState, Error> {
        let handle = self.handle_for(seed);
        if self.client.scratch_exists(&handle).await? {
            Ok(SessionState::InProgress)
        } else {
            Ok(SessionState::NotStarted)
        }
    }

    /// Runs a request to completion: allocates scratch storage if the
    /// session is new, submits the authentication envelope and the
    /// initiation round, then continuation rounds until the log channel
    /// carries the terminal marker.
    pub async fn execute(
        &self,
        seed: &str,
        request: &ExecutionRequest,
    ) -> Result<ExecutionOutcome, Error> {
        let handle = self.handle_for(seed);
        debug!("executing session {handle} against {}", self.config.executor);

        if !self.client.scratch_exists(&handle).await? {
            debug!(
                "allocating {} bytes of scratch storage for {handle}",
                self.config.scratch_capacity
            );
            self.client.allocate_scratch(&handle, self.config.scratch_capacity).await?;
        }

        if let Some(envelope) = &request.envelope {
            let verifier = self.config.verifier.ok_or(Error::MissingVerifier)?;
            trace!("submitting authentication envelope to {verifier}");
            self.submit_round(verifier, &[AccountRef::readonly(verifier)], envelope.as_bytes())
                .await?;
        }

        let accounts = self.round_accounts(&handle, &request.accounts);

        let mut payload = Vec::with_capacity(9 + 40 + request.call_data.len());
        payload.push(self.config.initiate_opcode);
        payload.extend_from_slice(&self.config.step_budget.to_le_bytes());
        payload.extend_from_slice(&request.to_bytes());

        let receipt = self.submit_round(self.config.executor, &accounts, &payload).await?;
        let terminal = self.terminal_payload(&receipt.logs);
        let logs = receipt.logs;

        if let Some(return_data) = terminal {
            debug!("session {handle} completed in the initiation round");
            return Ok(ExecutionOutcome { return_data, rounds: 1, logs });
        }

        self.continue_rounds(&handle, &accounts, 1, logs).await
    }

    /// Resumes an interrupted session by re-deriving its handle from the
    /// same seed and issuing continuation rounds only. The original
    /// request payload is not resent; the executing program recovers it
    /// from the session's scratch storage.
    pub async fn resume(
        &self,
        seed: &str,
        accounts: &[AccountRef],
    ) -> Result<ExecutionOutcome, Error> {
        let handle = self.handle_for(seed);
        if !self.client.scratch_exists(&handle).await? {
            return Err(Error::SessionConflict(handle));
        }

        debug!("resuming session {handle}");
        let accounts = self.round_accounts(&handle, accounts);
        self.continue_rounds(&handle, &accounts, 0, Vec::new()).await
    }

    fn handle_for(&self, seed: &str) -> SessionHandle {
        SessionHandle::derive(&self.config.payer, seed, &self.config.executor)
    }

    /// Prepends the writable scratch account to the request's accounts.
    fn round_accounts(&self, handle: &SessionHandle, accounts: &[AccountRef]) -> Vec<AccountRef> {
        let mut out = Vec::with_capacity(1 + accounts.len());
        out.push(AccountRef::writable(handle.account_id()));
        out.extend_from_slice(accounts);
        out
    }

    /// Issues continuation rounds until the terminal marker appears.
    async fn continue_rounds(
        &self,
        handle: &SessionHandle,
        accounts: &[AccountRef],
        mut rounds: u64,
        mut logs: Vec<Vec<u8>>,
    ) -> Result<ExecutionOutcome, Error> {
        let mut payload = Vec::with_capacity(9);
        payload.push(self.config.continue_opcode);
        payload.extend_from_slice(&self.config.step_budget.to_le_bytes());

        loop {
            if let Some(max) = self.config.max_rounds {
                if rounds >= max {
                    return Err(Error::RoundLimit(max));
                }
            }

            let receipt = self.submit_round(self.config.executor, accounts, &payload).await?;
            rounds += 1;

            let terminal = self.terminal_payload(&receipt.logs);
            logs.extend(receipt.logs);

            if let Some(return_data) = terminal {
                debug!("session {handle} completed after {rounds} rounds");
                return Ok(ExecutionOutcome { return_data, rounds, logs });
            }
            trace!("session {handle} still in progress after {rounds} rounds");
        }
    }

    /// Submits one round, retrying timeouts at a fixed interval up to
    /// the configured attempt bound. All other failures surface
    /// immediately.
    async fn submit_round(
        &self,
        program: AccountId,
        accounts: &[AccountRef],
        payload: &[u8],
    ) -> Result<SubmissionReceipt, Error> {
        let strategy = FixedInterval::from_millis(self.config.retry_interval_ms)
            .take(self.config.retry_attempts);

        RetryIf::spawn(
            strategy,
            || self.submit_once(program, accounts, payload),
            |e: &ClientError| matches!(e, ClientError::Timeout),
        )
        .await
        .map_err(Error::Client)
    }

    async fn submit_once(
        &self,
        program: AccountId,
        accounts: &[AccountRef],
        payload: &[u8],
    ) -> Result<SubmissionReceipt, ClientError> {
        let receipt = self.client.submit(program, accounts, payload).await?;
        if !receipt.finalized {
            warn!("submission to {program} was not finalized within the transport timeout");
            return Err(ClientError::Timeout);
        }
        Ok(receipt)
    }

    /// Returns the bytes after the done tag when the last log entry of a
    /// round carries the terminal marker.
    fn terminal_payload(&self, round_logs: &[Vec<u8>]) -> Option<Vec<u8>> {
        let last = round_logs.last()?;
        let (&tag, rest) = last.split_first()?;
        (tag == self.config.done_tag).then(|| rest.to_vec())
    }
}
