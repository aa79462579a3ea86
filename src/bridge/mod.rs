// src/bridge/mod.rs

//! Scripting-facing compute API.
//!
//! [`JobBridge::submit`] hands a Run / Trial / Forecast to tokio's blocking
//! pool and returns a [`JobHandle`]; [`await_job`] blocks the caller until the
//! worker reports back. Every kind of failure (non-zero status, worker error
//! or panic, interrupted wait) surfaces as one
//! [`BridgeError::ComputationFailed`].
//!
//! Jobs take the session's dispatch lock before touching the engine, so a
//! job and a remote command never mutate engine state at the same time.
//!
//! The synchronous script operations (`open_project`, `set_time_window`, ...)
//! must be called from a blocking thread, never from inside the runtime.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::catalog::codes;
use crate::engine::{EngineError, JobKind};
use crate::errors::error_chain;
use crate::session::ServerSession;

pub mod job;
pub mod script;

pub use job::{BridgeError, FailureReason, JobHandle, JobOutcome, await_job};
pub use script::{ScriptError, execute_source, run_script};

#[derive(Debug, Clone)]
pub struct JobBridge {
    session: Arc<ServerSession>,
    runtime: Handle,
}

impl JobBridge {
    pub fn new(session: Arc<ServerSession>, runtime: Handle) -> Self {
        Self { session, runtime }
    }

    pub fn session(&self) -> &Arc<ServerSession> {
        &self.session
    }

    /// Submit a computation to the background worker.
    pub fn submit(&self, kind: JobKind, target: impl Into<String>) -> JobHandle {
        let target = target.into();
        let (done_tx, done_rx) = oneshot::channel::<JobOutcome>();
        let session = Arc::clone(&self.session);
        let name = target.clone();

        debug!(kind = %kind, target = %target, "submitting job");
        self.runtime.spawn(async move {
            let worker_name = name.clone();
            let worker = tokio::task::spawn_blocking(move || {
                let mut state = session.blocking_lock();
                state.engine_mut().compute(kind, &worker_name)
            });

            let outcome = match worker.await {
                Ok(Ok(status)) => JobOutcome::Finished(status),
                Ok(Err(err)) => JobOutcome::Raised(error_chain(&err)),
                Err(join_err) => JobOutcome::Raised(format!("worker panicked: {join_err}")),
            };
            debug!(kind = %kind, target = %name, outcome = ?outcome, "job finished");

            if done_tx.send(outcome).is_err() {
                debug!(kind = %kind, target = %name, "job handle dropped before completion");
            }
        });

        JobHandle::new(kind, target, done_rx)
    }

    /// Submit and wait.
    pub fn compute(&self, kind: JobKind, target: &str) -> Result<i32, BridgeError> {
        await_job(self.submit(kind, target))
    }

    pub fn compute_run(&self, run: &str) -> Result<i32, BridgeError> {
        self.compute(JobKind::Run, run)
    }

    pub fn compute_trial(&self, trial: &str) -> Result<i32, BridgeError> {
        self.compute(JobKind::Trial, trial)
    }

    pub fn compute_forecast(&self, forecast: &str) -> Result<i32, BridgeError> {
        self.compute(JobKind::Forecast, forecast)
    }

    /// Older scripts call `Compute(run)`; it behaves like `compute_run`.
    pub fn compute_deprecated(&self, run: &str) -> Result<i32, BridgeError> {
        warn!(run = %run, "Compute() is deprecated; use ComputeRun()");
        self.compute_run(run)
    }

    pub fn open_project(&self, name: &str, directory: Option<PathBuf>) -> Result<(), BridgeError> {
        let mut state = self.session.blocking_lock();
        match state.engine_mut().open_project(name, directory) {
            Ok(project) => {
                info!(project = %project.name, "script opened project");
                Ok(())
            }
            Err(EngineError::ProjectNotFound(_)) => {
                Err(BridgeError::script(codes::PROJECT_NOT_FOUND, &[name]))
            }
            Err(err) => {
                warn!(project = %name, error = %error_chain(&err), "project could not be opened");
                Err(BridgeError::script(codes::PROJECT_NOT_OPENED, &[name]))
            }
        }
    }

    pub fn set_time_window(&self, start: &str, end: &str) -> Result<(), BridgeError> {
        let mut state = self.session.blocking_lock();
        state
            .engine_mut()
            .set_time_window(start, end)
            .map_err(|err| match err {
                EngineError::NoProject => {
                    BridgeError::script::<&str>(codes::NO_TIME_WINDOW_CONTROL, &[])
                }
                other => engine_rejection(other, "SetTimeWindow"),
            })
    }

    pub fn create(&self, kind: JobKind, name: &str) -> Result<(), BridgeError> {
        let mut state = self.session.blocking_lock();
        state
            .engine_mut()
            .define(kind, name)
            .map_err(|err| engine_rejection(err, &format!("Create{kind}")))
    }

    pub fn select_trial(&self, trial: &str) -> Result<(), BridgeError> {
        let mut state = self.session.blocking_lock();
        state
            .engine_mut()
            .select_trial(trial)
            .map_err(|err| engine_rejection(err, "SelectTrial"))
    }
}

/// Map an engine rejection to a catalog-coded script error.
fn engine_rejection(err: EngineError, operation: &str) -> BridgeError {
    let code = match &err {
        EngineError::NoProject => codes::NO_PROJECT_OPEN,
        EngineError::ProjectNotFound(_) => codes::PROJECT_NOT_FOUND,
        EngineError::UnknownTarget { .. } => codes::UNKNOWN_TARGET,
        EngineError::DuplicateTarget { .. } => codes::DUPLICATE_TARGET,
        EngineError::InvalidTimeWindow { .. } => codes::INVALID_TIME_WINDOW,
        EngineError::Backend(_) => codes::SCRIPT_FAILED,
    };
    BridgeError::Script {
        code,
        message: err.catalog_message(operation),
    }
}
