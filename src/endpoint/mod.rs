// src/endpoint/mod.rs

//! Remote endpoint: the TCP surface of the command server.
//!
//! - `wire.rs`: line-delimited JSON framing and message enums.
//! - `address.rs`: `hms://host:port/name` addresses.
//! - `registry.rs`: the name registry (server and client).
//! - `service.rs`: the command listener in front of the router.
//! - `bootstrap.rs`: startup sequence and exit codes.

pub mod address;
pub mod bootstrap;
pub mod registry;
pub mod service;
pub mod wire;

pub use address::{AddressError, EndpointAddress};
pub use bootstrap::{EndpointError, SERVER_NAME, ServerHandle, bootstrap, resolve_hostname};
pub use registry::{RegistryClient, RegistryError, RegistryServer};
pub use service::CommandService;
pub use wire::{Connection, WireError};
