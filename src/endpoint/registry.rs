// src/endpoint/registry.rs

//! Name registry: maps published names to endpoint socket addresses.
//!
//! One registry per port is shared by every server on the machine. A server
//! first tries to [`RegistryClient::locate`] an existing registry and only
//! creates its own with [`RegistryServer::create`] when none answers.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::wire::{Connection, RegistryReply, RegistryRequest, WireError};

type Bindings = Arc<Mutex<BTreeMap<String, String>>>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("registry rejected the request: {0}")]
    Rejected(String),

    #[error("unexpected registry reply: {0:?}")]
    UnexpectedReply(RegistryReply),

    #[error("registry at {0} did not answer in time")]
    Timeout(String),
}

/// How long [`RegistryClient::locate`] waits for a `list` answer.
pub const LOCATE_TIMEOUT: Duration = Duration::from_secs(2);

/// Registry hosted by this process.
///
/// The accept loop is aborted when the server is dropped.
#[derive(Debug)]
pub struct RegistryServer {
    local_addr: SocketAddr,
    bindings: Bindings,
    task: JoinHandle<()>,
}

impl RegistryServer {
    /// Bind `bind_address:port` and start serving. Port 0 picks a free port.
    pub async fn create(bind_address: &str, port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind((bind_address, port)).await?;
        let local_addr = listener.local_addr()?;
        let bindings: Bindings = Arc::default();

        info!(addr = %local_addr, "registry created");
        let task = tokio::spawn(serve(listener, Arc::clone(&bindings)));

        Ok(Self {
            local_addr,
            bindings,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Names currently bound.
    pub fn names(&self) -> Vec<String> {
        lock(&self.bindings).keys().cloned().collect()
    }
}

impl Drop for RegistryServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lock(bindings: &Bindings) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
    bindings.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn serve(listener: TcpListener, bindings: Bindings) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "registry accept failed");
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };
        let bindings = Arc::clone(&bindings);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, bindings).await {
                debug!(peer = %peer, error = %err, "registry connection ended with error");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, bindings: Bindings) -> Result<(), WireError> {
    let mut conn = Connection::new(stream);
    while let Some(request) = conn.recv::<RegistryRequest>().await? {
        let reply = apply(&bindings, request);
        conn.send(&reply).await?;
    }
    Ok(())
}

fn apply(bindings: &Bindings, request: RegistryRequest) -> RegistryReply {
    let mut map = lock(bindings);
    match request {
        RegistryRequest::List => RegistryReply::Names {
            names: map.keys().cloned().collect(),
        },
        RegistryRequest::Lookup { name } => match map.get(&name) {
            Some(address) => RegistryReply::Address {
                address: address.clone(),
            },
            None => RegistryReply::NotBound { name },
        },
        RegistryRequest::Rebind { name, address } => {
            if name.trim().is_empty() {
                return RegistryReply::Error {
                    message: "name must not be empty".to_string(),
                };
            }
            info!(name = %name, address = %address, "registry rebind");
            map.insert(name, address);
            RegistryReply::Bound
        }
    }
}

/// Client side of the registry protocol. Each call uses a fresh connection.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    addr: String,
}

impl RegistryClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Connect to the registry at `addr` and check that it answers `list`.
    pub async fn locate(addr: impl Into<String>) -> Result<Self, RegistryError> {
        let client = Self::new(addr);
        tokio::time::timeout(LOCATE_TIMEOUT, client.list())
            .await
            .map_err(|_| RegistryError::Timeout(client.addr.clone()))??;
        Ok(client)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn call(&self, request: &RegistryRequest) -> Result<RegistryReply, RegistryError> {
        let mut conn = Connection::connect(self.addr.as_str()).await?;
        match conn.call(request).await? {
            RegistryReply::Error { message } => Err(RegistryError::Rejected(message)),
            reply => Ok(reply),
        }
    }

    pub async fn list(&self) -> Result<Vec<String>, RegistryError> {
        match self.call(&RegistryRequest::List).await? {
            RegistryReply::Names { names } => Ok(names),
            other => Err(RegistryError::UnexpectedReply(other)),
        }
    }

    /// Address bound to `name`, or `None` if the name is not bound.
    pub async fn lookup(&self, name: &str) -> Result<Option<String>, RegistryError> {
        let request = RegistryRequest::Lookup {
            name: name.to_string(),
        };
        match self.call(&request).await? {
            RegistryReply::Address { address } => Ok(Some(address)),
            RegistryReply::NotBound { .. } => Ok(None),
            other => Err(RegistryError::UnexpectedReply(other)),
        }
    }

    pub async fn rebind(&self, name: &str, address: &str) -> Result<(), RegistryError> {
        let request = RegistryRequest::Rebind {
            name: name.to_string(),
            address: address.to_string(),
        };
        match self.call(&request).await? {
            RegistryReply::Bound => Ok(()),
            other => Err(RegistryError::UnexpectedReply(other)),
        }
    }
}
