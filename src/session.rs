// src/session.rs

//! Process-wide server session.
//!
//! A [`ServerSession`] is built once at startup and shared (via `Arc`) by the
//! command router, the job bridge and the endpoint. It owns:
//!
//! - the **dispatch lock**: a `tokio::sync::Mutex<SessionState>` around the
//!   engine and the lazily created program handlers. Whoever holds the guard
//!   is the only mutator of engine state; both command dispatch and compute
//!   jobs take it.
//! - the optional session log,
//! - the "close requested" flag raised by handlers,
//! - the liveness monitor, once registered.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::{info, warn};

use crate::engine::Engine;
use crate::liveness::LivenessMonitor;
use crate::program::{
    ClientProgram, HandlerError, MfpHandler, ProgramHandler, RtsHandler, WatHandler,
};
use crate::protocol::{CommandRequest, CommandResponse};
use crate::session_log::SessionLog;

/// Result of running one resolved request through a handler.
#[derive(Debug)]
pub struct Dispatched {
    pub response: CommandResponse,
    /// The handler reports that the session should end after this response.
    pub close_requested: bool,
}

/// State guarded by the dispatch lock.
#[derive(Debug)]
pub struct SessionState {
    engine: Engine,
    rts: Option<RtsHandler>,
    mfp: Option<MfpHandler>,
    wat: Option<WatHandler>,
}

impl SessionState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            rts: None,
            mfp: None,
            wat: None,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Which handlers have been constructed so far.
    pub fn active_programs(&self) -> Vec<ClientProgram> {
        let mut active = Vec::new();
        if self.rts.is_some() {
            active.push(ClientProgram::Rts);
        }
        if self.mfp.is_some() {
            active.push(ClientProgram::Mfp);
        }
        if self.wat.is_some() {
            active.push(ClientProgram::Wat);
        }
        active
    }

    /// Route a request to the handler for `program`, creating the handler on
    /// first use. MFP creation also creates RTS, whose resources it wraps.
    pub fn dispatch(
        &mut self,
        program: ClientProgram,
        request: &CommandRequest,
    ) -> Result<Dispatched, HandlerError> {
        let Self {
            engine,
            rts,
            mfp,
            wat,
        } = self;

        match program {
            ClientProgram::Rts => {
                let handler = rts.get_or_insert_with(RtsHandler::new);
                run_handler(handler, engine, request)
            }
            ClientProgram::Mfp => {
                let rts = rts.get_or_insert_with(RtsHandler::new);
                let handler = mfp.get_or_insert_with(|| MfpHandler::new(rts));
                run_handler(handler, engine, request)
            }
            ClientProgram::Wat => {
                let handler = wat.get_or_insert_with(WatHandler::new);
                run_handler(handler, engine, request)
            }
        }
    }
}

fn run_handler<H: ProgramHandler>(
    handler: &mut H,
    engine: &mut Engine,
    request: &CommandRequest,
) -> Result<Dispatched, HandlerError> {
    let response = handler.handle(engine, request)?;
    Ok(Dispatched {
        response,
        close_requested: handler.close_requested(),
    })
}

#[derive(Debug)]
pub struct ServerSession {
    state: AsyncMutex<SessionState>,
    session_log: Mutex<Option<SessionLog>>,
    close_requested: AtomicBool,
    liveness: Mutex<Option<LivenessMonitor>>,
}

impl ServerSession {
    pub fn new(engine: Engine, session_log: Option<SessionLog>) -> Self {
        Self {
            state: AsyncMutex::new(SessionState::new(engine)),
            session_log: Mutex::new(session_log),
            close_requested: AtomicBool::new(false),
            liveness: Mutex::new(None),
        }
    }

    /// Acquire the dispatch lock from async code.
    pub async fn lock(&self) -> AsyncMutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// Acquire the dispatch lock from a blocking (non-async) thread.
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_lock(&self) -> AsyncMutexGuard<'_, SessionState> {
        self.state.blocking_lock()
    }

    /// Active session log, if any.
    pub fn session_log(&self) -> Option<SessionLog> {
        self.log_slot().clone()
    }

    /// Flush and release the session log. No-op without one.
    pub fn release_session_log(&self) {
        let Some(log) = self.log_slot().take() else {
            return;
        };
        info!(path = %log.path().display(), "releasing session log");
        if let Err(err) = log.close() {
            warn!(path = %log.path().display(), error = %err, "failed to flush session log");
        }
    }

    pub fn mark_close_requested(&self) {
        self.close_requested.store(true, Ordering::SeqCst);
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::SeqCst)
    }

    pub fn set_liveness_monitor(&self, monitor: LivenessMonitor) {
        let mut slot = self.liveness.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(monitor);
    }

    pub fn has_liveness_monitor(&self) -> bool {
        self.liveness
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    fn log_slot(&self) -> MutexGuard<'_, Option<SessionLog>> {
        self.session_log.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Run `f`, converting a panic into `Err(message)`.
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        }
    })
}
