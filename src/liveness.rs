// src/liveness.rs

//! Client liveness monitoring.
//!
//! When the server is started on behalf of a client (typically a GUI), the
//! client publishes a check-in authority. The monitor registers this process
//! with it and then heartbeats at a fixed interval. The process is
//! terminated when:
//!
//! - the authority reports the client is no longer alive, or
//! - `max_missed_checkins` consecutive heartbeats fail to reach it or go
//!   unanswered.
//!
//! A missing or unreachable authority at startup is not an error; the server
//! simply runs unmonitored.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::LivenessConfig;
use crate::endpoint::address::EndpointAddress;
use crate::endpoint::registry::RegistryClient;
use crate::endpoint::wire::{CheckInCall, CheckInReply, Connection, WireError};

/// Exit status used when the client is gone.
pub const EXIT_CLIENT_GONE: i32 = 4;

/// Upper bound for one registry lookup or check-in exchange. Heartbeats use
/// the smaller of this and the check-in interval.
pub const CHECKIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
enum CheckInError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("no answer within {0:?}")]
    Timeout(Duration),
}

/// Ends the process. Injected so tests can observe termination.
pub trait ProcessTerminator: Send + Sync {
    fn terminate(&self, code: i32);
}

/// Production terminator: `std::process::exit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitProcess;

impl ProcessTerminator for ExitProcess {
    fn terminate(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Running heartbeat. Dropping the monitor stops it.
pub struct LivenessMonitor {
    authority: String,
    task: JoinHandle<()>,
}

impl fmt::Debug for LivenessMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LivenessMonitor")
            .field("authority", &self.authority)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

impl Drop for LivenessMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl LivenessMonitor {
    /// Register with the authority named by `config.checkin_url` and start
    /// heartbeating. Returns `None` when no authority is configured or it
    /// cannot be reached.
    pub async fn start(
        config: &LivenessConfig,
        published_name: &str,
        terminator: Arc<dyn ProcessTerminator>,
    ) -> Option<Self> {
        let url = config.checkin_url.as_deref()?;

        let address = match EndpointAddress::parse(url) {
            Ok(address) => address,
            Err(err) => {
                warn!(url = %url, error = %err, "invalid check-in address; liveness disabled");
                return None;
            }
        };

        let registry = RegistryClient::new(address.registry_addr());
        let lookup = tokio::time::timeout(CHECKIN_TIMEOUT, registry.lookup(&address.name));
        let authority = match lookup.await {
            Ok(Ok(Some(authority))) => authority,
            Ok(Ok(None)) => {
                warn!(url = %url, "check-in authority is not bound; liveness disabled");
                return None;
            }
            Ok(Err(err)) => {
                warn!(url = %url, error = %err, "check-in registry unreachable; liveness disabled");
                return None;
            }
            Err(_) => {
                warn!(url = %url, timeout = ?CHECKIN_TIMEOUT, "check-in registry did not answer; liveness disabled");
                return None;
            }
        };

        let pid = std::process::id();
        let register = CheckInCall::Register {
            pid,
            name: published_name.to_string(),
        };
        match exchange(&authority, &register, CHECKIN_TIMEOUT).await {
            Ok(CheckInReply::Registered) => {
                info!(authority = %authority, pid, "registered with check-in authority");
            }
            Ok(other) => {
                warn!(authority = %authority, reply = ?other, "check-in registration refused; liveness disabled");
                return None;
            }
            Err(err) => {
                warn!(authority = %authority, error = %err, "check-in authority unreachable; liveness disabled");
                return None;
            }
        }

        let task = tokio::spawn(heartbeat(
            authority.clone(),
            pid,
            config.checkin_interval,
            config.max_missed_checkins.max(1),
            terminator,
        ));
        Some(Self { authority, task })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

async fn exchange(
    authority: &str,
    call: &CheckInCall,
    deadline: Duration,
) -> Result<CheckInReply, CheckInError> {
    let attempt = async {
        let mut conn = Connection::connect(authority).await?;
        conn.call::<_, CheckInReply>(call).await
    };
    match tokio::time::timeout(deadline, attempt).await {
        Ok(reply) => Ok(reply?),
        Err(_) => Err(CheckInError::Timeout(deadline)),
    }
}

async fn heartbeat(
    authority: String,
    pid: u32,
    interval: Duration,
    max_missed: u32,
    terminator: Arc<dyn ProcessTerminator>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; registration just happened.
    ticker.tick().await;

    let deadline = interval.min(CHECKIN_TIMEOUT);
    let mut missed = 0u32;
    loop {
        ticker.tick().await;

        match exchange(&authority, &CheckInCall::Heartbeat { pid }, deadline).await {
            Ok(CheckInReply::Status { client_alive: true }) => {
                missed = 0;
                debug!(authority = %authority, "client alive");
            }
            Ok(CheckInReply::Status {
                client_alive: false,
            }) => {
                error!(authority = %authority, "client is gone; terminating");
                terminator.terminate(EXIT_CLIENT_GONE);
                return;
            }
            Ok(other) => {
                missed += 1;
                warn!(authority = %authority, reply = ?other, missed, "unexpected check-in reply");
            }
            Err(err) => {
                missed += 1;
                warn!(authority = %authority, error = %err, missed, "check-in failed");
            }
        }

        if missed >= max_missed {
            error!(
                authority = %authority,
                missed,
                "check-in authority unreachable; assuming client is gone"
            );
            terminator.terminate(EXIT_CLIENT_GONE);
            return;
        }
    }
}
