use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hms_command_server::endpoint::wire::{CheckInCall, CheckInReply, Connection};
use hms_command_server::endpoint::{RegistryClient, RegistryServer};
use hms_command_server::liveness::ProcessTerminator;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Name the fake authority is bound under in its registry.
pub const CHECKIN_NAME: &str = "ClientCheckIn";

#[derive(Debug, Default)]
struct AuthorityState {
    client_alive: AtomicBool,
    silent: AtomicBool,
    heartbeats: AtomicUsize,
    registrations: Mutex<Vec<(u32, String)>>,
}

/// A check-in authority with its own registry, both on ephemeral ports.
///
/// - answers `register` with `registered`
/// - answers `heartbeat` with the current "client alive" flag
/// - can go silent (read heartbeats, never answer) to simulate a hung client
/// - can be shut down to simulate an unreachable client.
pub struct FakeCheckInAuthority {
    registry: RegistryServer,
    state: Arc<AuthorityState>,
    task: JoinHandle<()>,
}

impl FakeCheckInAuthority {
    pub async fn start() -> Self {
        let registry = RegistryServer::create("127.0.0.1", 0)
            .await
            .expect("fake registry");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("fake authority");
        let authority_addr = listener.local_addr().expect("local addr");

        let state = Arc::new(AuthorityState::default());
        state.client_alive.store(true, Ordering::SeqCst);

        let task = tokio::spawn(serve(listener, Arc::clone(&state)));

        RegistryClient::new(registry.local_addr().to_string())
            .rebind(CHECKIN_NAME, &authority_addr.to_string())
            .await
            .expect("bind fake authority");

        Self {
            registry,
            state,
            task,
        }
    }

    /// Address to put in `[liveness] checkin_url`.
    pub fn url(&self) -> String {
        format!("hms://127.0.0.1:{}/{CHECKIN_NAME}", self.registry.port())
    }

    pub fn set_client_alive(&self, alive: bool) {
        self.state.client_alive.store(alive, Ordering::SeqCst);
    }

    /// Keep accepting heartbeats but stop answering them.
    pub fn set_silent(&self, silent: bool) {
        self.state.silent.store(silent, Ordering::SeqCst);
    }

    pub fn heartbeats(&self) -> usize {
        self.state.heartbeats.load(Ordering::SeqCst)
    }

    pub fn registrations(&self) -> Vec<(u32, String)> {
        self.state
            .registrations
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Stop answering. Subsequent heartbeats fail to connect.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for FakeCheckInAuthority {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, state: Arc<AuthorityState>) {
    while let Ok((stream, _)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut conn = Connection::new(stream);
            while let Ok(Some(call)) = conn.recv::<CheckInCall>().await {
                let reply = match call {
                    CheckInCall::Register { pid, name } => {
                        if let Ok(mut regs) = state.registrations.lock() {
                            regs.push((pid, name));
                        }
                        CheckInReply::Registered
                    }
                    CheckInCall::Heartbeat { .. } => {
                        state.heartbeats.fetch_add(1, Ordering::SeqCst);
                        if state.silent.load(Ordering::SeqCst) {
                            continue;
                        }
                        CheckInReply::Status {
                            client_alive: state.client_alive.load(Ordering::SeqCst),
                        }
                    }
                };
                if conn.send(&reply).await.is_err() {
                    break;
                }
            }
        });
    }
}

/// Terminator that records exit codes instead of exiting.
#[derive(Debug, Default)]
pub struct RecordingTerminator {
    codes: Mutex<Vec<i32>>,
}

impl RecordingTerminator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn codes(&self) -> Vec<i32> {
        self.codes.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Poll until a termination is recorded or `timeout` elapses.
    pub async fn wait_for_termination(&self, timeout: Duration) -> Option<i32> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(code) = self.codes().first().copied() {
                return Some(code);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl ProcessTerminator for RecordingTerminator {
    fn terminate(&self, code: i32) {
        if let Ok(mut codes) = self.codes.lock() {
            codes.push(code);
        }
    }
}
