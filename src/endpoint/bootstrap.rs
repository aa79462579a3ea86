// src/endpoint/bootstrap.rs

//! Bring the remote endpoint up: registry, command listener, published name,
//! liveness monitor. Every failure class has its own process exit code.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::liveness::{LivenessMonitor, ProcessTerminator};
use crate::router::CommandRouter;
use crate::session::ServerSession;

use super::address::{AddressError, EndpointAddress};
use super::registry::{RegistryClient, RegistryError, RegistryServer};
use super::service::CommandService;

/// Name under which the command router is published.
pub const SERVER_NAME: &str = "HmsCommandServer";

pub mod exit_codes {
    pub const INVALID_PORT: i32 = 2;
    pub const REGISTRY_CREATE: i32 = 3;
    pub const NETWORK: i32 = 5;
    pub const MALFORMED_ADDRESS: i32 = 6;
}

#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("invalid registry port {0} (expected 0..=65535)")]
    InvalidPort(i64),

    #[error("could not create registry on port {port}")]
    RegistryCreate {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("could not start the command listener")]
    Export(#[source] std::io::Error),

    #[error("could not publish {name}")]
    Publish {
        name: String,
        #[source]
        source: RegistryError,
    },

    #[error("malformed endpoint address")]
    MalformedAddress(#[from] AddressError),
}

impl EndpointError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            EndpointError::InvalidPort(_) => exit_codes::INVALID_PORT,
            EndpointError::RegistryCreate { .. } => exit_codes::REGISTRY_CREATE,
            EndpointError::Export(_) | EndpointError::Publish { .. } => exit_codes::NETWORK,
            EndpointError::MalformedAddress(_) => exit_codes::MALFORMED_ADDRESS,
        }
    }
}

/// A running endpoint.
#[derive(Debug)]
pub struct ServerHandle {
    address: EndpointAddress,
    service: CommandService,
    /// Present only when this process created the registry.
    registry: Option<RegistryServer>,
    session: Arc<ServerSession>,
}

impl ServerHandle {
    /// Published address, `hms://host:port/HmsCommandServer`.
    pub fn address(&self) -> &EndpointAddress {
        &self.address
    }

    pub fn command_addr(&self) -> SocketAddr {
        self.service.local_addr()
    }

    pub fn registry_port(&self) -> u16 {
        self.address.port
    }

    pub fn owns_registry(&self) -> bool {
        self.registry.is_some()
    }

    pub fn session(&self) -> &Arc<ServerSession> {
        &self.session
    }

    /// Serve until the process is killed.
    pub async fn wait(self) {
        let Self {
            service, registry, ..
        } = self;
        service.join().await;
        drop(registry);
    }
}

/// Start the endpoint described by `config`.
pub async fn bootstrap(
    config: &ServerConfig,
    session: Arc<ServerSession>,
    terminator: Arc<dyn ProcessTerminator>,
) -> Result<ServerHandle, EndpointError> {
    let port = u16::try_from(config.port).map_err(|_| EndpointError::InvalidPort(config.port))?;

    let (registry_client, registry, registry_port) = locate_or_create(config, port).await?;

    let router = CommandRouter::new(Arc::clone(&session));
    let service = CommandService::start(&config.bind_address, router)
        .await
        .map_err(EndpointError::Export)?;

    let host = resolve_hostname(config.hostname.as_deref());
    let address = EndpointAddress::parse(&format!("hms://{host}:{registry_port}/{SERVER_NAME}"))?;
    let published = address.to_string();

    let command_addr = format!("{host}:{}", service.local_addr().port());
    registry_client
        .rebind(&address.name, &command_addr)
        .await
        .map_err(|source| EndpointError::Publish {
            name: published.clone(),
            source,
        })?;

    if let Some(monitor) = LivenessMonitor::start(&config.liveness, &published, terminator).await {
        session.set_liveness_monitor(monitor);
    }

    info!(name = %published, command_addr = %command_addr, "HMS command server ready");
    Ok(ServerHandle {
        address,
        service,
        registry,
        session,
    })
}

async fn locate_or_create(
    config: &ServerConfig,
    port: u16,
) -> Result<(RegistryClient, Option<RegistryServer>, u16), EndpointError> {
    let host = registry_host(&config.bind_address);
    if port != 0 {
        match RegistryClient::locate(format!("{host}:{port}")).await {
            Ok(client) => {
                info!(port, "using existing registry");
                return Ok((client, None, port));
            }
            Err(err) => debug!(port, error = %err, "no registry answering; creating one"),
        }
    }

    let server = RegistryServer::create(&config.bind_address, port)
        .await
        .map_err(|source| EndpointError::RegistryCreate { port, source })?;
    let actual = server.port();
    let client = RegistryClient::new(format!("{host}:{actual}"));
    Ok((client, Some(server), actual))
}

/// Host to reach a registry listening on `bind_address`. Wildcard binds are
/// reached over loopback.
fn registry_host(bind_address: &str) -> String {
    match bind_address.trim() {
        "" | "0.0.0.0" => "127.0.0.1".to_string(),
        "::" | "[::]" => "[::1]".to_string(),
        host if host.contains(':') && !host.starts_with('[') => format!("[{host}]"),
        host => host.to_string(),
    }
}

/// Configured hostname, else the machine hostname, else `localhost`.
pub fn resolve_hostname(configured: Option<&str>) -> String {
    configured
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(machine_hostname)
        .unwrap_or_else(|| "localhost".to_string())
}

fn machine_hostname() -> Option<String> {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .chain(std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .find(|h| !h.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_located_on_the_bind_address() {
        assert_eq!(registry_host("0.0.0.0"), "127.0.0.1");
        assert_eq!(registry_host("::"), "[::1]");
        assert_eq!(registry_host("10.1.2.3"), "10.1.2.3");
        assert_eq!(registry_host("fe80::1"), "[fe80::1]");
        assert_eq!(registry_host("modeling-host"), "modeling-host");
    }

    #[test]
    fn configured_hostname_wins() {
        assert_eq!(resolve_hostname(Some(" modeling-host ")), "modeling-host");
    }

    #[test]
    fn blank_hostname_falls_back() {
        assert!(!resolve_hostname(Some("  ")).is_empty());
        assert!(!resolve_hostname(None).is_empty());
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EndpointError::InvalidPort(-1).exit_code(),
            EndpointError::RegistryCreate {
                port: 1,
                source: std::io::Error::other("x"),
            }
            .exit_code(),
            EndpointError::MalformedAddress(AddressError::Host("x".into())).exit_code(),
            EndpointError::Export(std::io::Error::other("x")).exit_code(),
        ];
        assert_eq!(codes, [2, 3, 6, 5]);
    }
}
