// src/endpoint/service.rs

//! Command listener: accepts client connections and feeds each `execute`
//! call to the router.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::router::CommandRouter;

use super::wire::{Connection, EndpointCall, EndpointReply, WireError};

#[derive(Debug)]
pub struct CommandService {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl CommandService {
    /// Bind an ephemeral port on `bind_address` and start accepting.
    pub async fn start(bind_address: &str, router: CommandRouter) -> std::io::Result<Self> {
        let listener = TcpListener::bind((bind_address, 0)).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "command listener started");

        let task = tokio::spawn(accept_loop(listener, router));
        Ok(Self { local_addr, task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the accept loop. It only ends if the task is aborted.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            if !err.is_cancelled() {
                warn!(error = %err, "command listener task failed");
            }
        }
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

async fn accept_loop(listener: TcpListener, router: CommandRouter) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "error accepting command client");
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };
        debug!(peer = %peer, "command client connected");

        let router = router.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_client(stream, router).await {
                warn!(peer = %peer, error = %err, "command client connection error");
            }
            debug!(peer = %peer, "command client disconnected");
        });
    }
}

async fn handle_client(stream: TcpStream, router: CommandRouter) -> Result<(), WireError> {
    let mut conn = Connection::new(stream);
    loop {
        let call = match conn.recv::<EndpointCall>().await {
            Ok(Some(call)) => call,
            Ok(None) => return Ok(()),
            Err(WireError::Json(err)) => {
                // Framing survived; tell the client and keep the connection.
                conn.send(&EndpointReply::Error {
                    message: format!("malformed call: {err}"),
                })
                .await?;
                continue;
            }
            Err(err) => return Err(err),
        };

        let reply = match call {
            EndpointCall::Execute { document } => EndpointReply::Document {
                document: router.execute(&document).await,
            },
            EndpointCall::Ping => EndpointReply::Pong,
        };
        conn.send(&reply).await?;
    }
}
