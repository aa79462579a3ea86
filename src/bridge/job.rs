// src/bridge/job.rs

//! Job handles and the failure type surfaced to script callers.

use std::fmt;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::catalog;
use crate::engine::JobKind;

/// What the background worker reported for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Worker ran to completion with this status (`0` = success).
    Finished(i32),
    /// Worker raised an error or panicked.
    Raised(String),
}

/// Why a computation was reported as failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Status(i32),
    Raised(String),
    /// The completion token was dropped before a result arrived.
    Interrupted,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Status(status) => write!(f, "worker returned status {status}"),
            FailureReason::Raised(cause) => write!(f, "worker raised: {cause}"),
            FailureReason::Interrupted => f.write_str("wait was interrupted"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    /// A submitted Run, Trial or Forecast did not succeed.
    #[error("{message} ({reason})")]
    ComputationFailed {
        kind: JobKind,
        target: String,
        message: String,
        reason: FailureReason,
    },

    /// A synchronous script operation was rejected.
    #[error("{message}")]
    Script { code: u32, message: String },
}

impl BridgeError {
    pub(crate) fn computation_failed(kind: JobKind, target: &str, reason: FailureReason) -> Self {
        BridgeError::ComputationFailed {
            kind,
            target: target.to_string(),
            message: catalog::get_message(kind.failure_code(), &[target]),
            reason,
        }
    }

    pub(crate) fn script<S: AsRef<str>>(code: u32, args: &[S]) -> Self {
        BridgeError::Script {
            code,
            message: catalog::get_message(code, args),
        }
    }

    /// Catalog code of the message carried by this error.
    pub fn code(&self) -> u32 {
        match self {
            BridgeError::ComputationFailed { kind, .. } => kind.failure_code(),
            BridgeError::Script { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            BridgeError::ComputationFailed { message, .. } | BridgeError::Script { message, .. } => {
                message
            }
        }
    }
}

/// Token for one submitted computation.
///
/// Consumed by [`JobHandle::wait_blocking`] or [`JobHandle::wait`], so a
/// handle can be awaited at most once.
#[derive(Debug)]
pub struct JobHandle {
    kind: JobKind,
    target: String,
    completion: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    pub(crate) fn new(
        kind: JobKind,
        target: String,
        completion: oneshot::Receiver<JobOutcome>,
    ) -> Self {
        Self {
            kind,
            target,
            completion,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Block the current thread until the job completes.
    ///
    /// Must not be called from inside an async context.
    pub fn wait_blocking(self) -> Result<i32, BridgeError> {
        let received = self.completion.blocking_recv().ok();
        settle(self.kind, &self.target, received)
    }

    pub async fn wait(self) -> Result<i32, BridgeError> {
        let received = self.completion.await.ok();
        settle(self.kind, &self.target, received)
    }
}

fn settle(kind: JobKind, target: &str, received: Option<JobOutcome>) -> Result<i32, BridgeError> {
    let reason = match received {
        Some(JobOutcome::Finished(0)) => return Ok(0),
        Some(JobOutcome::Finished(status)) => FailureReason::Status(status),
        Some(JobOutcome::Raised(cause)) => FailureReason::Raised(cause),
        None => FailureReason::Interrupted,
    };
    tracing::warn!(kind = %kind, target = %target, reason = %reason, "computation failed");
    Err(BridgeError::computation_failed(kind, target, reason))
}

/// Await a submitted job from a blocking caller.
pub fn await_job(handle: JobHandle) -> Result<i32, BridgeError> {
    handle.wait_blocking()
}
