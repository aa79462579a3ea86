// src/lib.rs

pub mod bridge;
pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod engine;
pub mod errors;
pub mod liveness;
pub mod logging;
pub mod program;
pub mod protocol;
pub mod router;
pub mod session;
pub mod session_log;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use crate::bridge::JobBridge;
use crate::cli::{CliArgs, Mode};
use crate::config::ServerConfig;
use crate::engine::{Engine, InMemoryBackend};
use crate::errors::error_chain;
use crate::liveness::ExitProcess;
use crate::session::ServerSession;
use crate::session_log::SessionLog;

/// High-level entry point used by `main.rs`. Returns the process exit
/// status.
///
/// This wires together:
/// - config loading (file + environment + CLI overrides)
/// - the session log and logging
/// - the server session around the engine
/// - either the remote endpoint or the one-shot script runner
pub async fn run(args: CliArgs) -> Result<i32> {
    let mode = args.mode();
    if mode == Mode::Info {
        print_info();
        return Ok(0);
    }

    let mut config = config::resolve(args.config.as_deref())?;
    let session_log = SessionLog::from_config(config.log_file.as_deref());
    logging::init_logging(args.log_level, session_log.as_ref())?;

    let engine = Engine::new(Arc::new(InMemoryBackend));
    let session = Arc::new(ServerSession::new(engine, session_log));

    match mode {
        Mode::CommandServer { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            Ok(serve(&config, session).await)
        }
        Mode::Script(path) => run_script_file(session, path).await,
        Mode::Info => Ok(0),
    }
}

/// Bootstrap the endpoint and serve until killed. On bootstrap failure the
/// error is logged and its exit code returned.
pub async fn serve(config: &ServerConfig, session: Arc<ServerSession>) -> i32 {
    match endpoint::bootstrap(config, Arc::clone(&session), Arc::new(ExitProcess)).await {
        Ok(handle) => {
            handle.wait().await;
            0
        }
        Err(err) => {
            let code = err.exit_code();
            error!(error = %error_chain(&err), exit_code = code, "server bootstrap failed");
            if let Some(log) = session.session_log() {
                log.note_error("Server bootstrap failed", &err);
            }
            session.release_session_log();
            code
        }
    }
}

/// Run a script on the blocking pool and return its status.
pub async fn run_script_file(session: Arc<ServerSession>, path: PathBuf) -> Result<i32> {
    let bridge = JobBridge::new(Arc::clone(&session), tokio::runtime::Handle::current());
    let status = tokio::task::spawn_blocking(move || bridge::run_script(&bridge, &path)).await?;
    info!(status, "script finished");
    session.release_session_log();
    Ok(status)
}

fn print_info() {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("  command server name: {}", endpoint::SERVER_NAME);
    println!("  default registry port: {}", ServerConfig::default().port);
}
