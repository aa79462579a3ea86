pub mod builders;
pub mod fake_authority;
pub mod fake_backend;

use std::sync::{Arc, Once};

use hms_command_server::engine::{Engine, EngineBackend};
use hms_command_server::router::CommandRouter;
use hms_command_server::session::ServerSession;
use hms_command_server::session_log::SessionLog;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Session around `backend`, without a session log.
pub fn session_with(backend: impl EngineBackend + 'static) -> Arc<ServerSession> {
    Arc::new(ServerSession::new(Engine::new(Arc::new(backend)), None))
}

/// Session around `backend` writing to `log`.
pub fn session_with_log(
    backend: impl EngineBackend + 'static,
    log: SessionLog,
) -> Arc<ServerSession> {
    Arc::new(ServerSession::new(Engine::new(Arc::new(backend)), Some(log)))
}

/// Router over a fresh session around `backend`.
pub fn router_with(backend: impl EngineBackend + 'static) -> CommandRouter {
    CommandRouter::new(session_with(backend))
}
