// src/endpoint/address.rs

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const SCHEME: &str = "hms";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address \"{0}\" must start with hms://")]
    Scheme(String),

    #[error("address \"{0}\" must have the form hms://host:port/name")]
    Shape(String),

    #[error("address \"{address}\" has an invalid port: {port}")]
    Port { address: String, port: String },

    #[error("address \"{0}\" has an invalid host")]
    Host(String),
}

/// `hms://host:port/name`: a name bound in the registry at `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
    pub host: String,
    pub port: u16,
    pub name: String,
}

impl EndpointAddress {
    pub fn new(host: impl Into<String>, port: u16, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            name: name.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let raw = raw.trim();
        let rest = raw
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| AddressError::Scheme(raw.to_string()))?;

        let (authority, name) = rest
            .split_once('/')
            .ok_or_else(|| AddressError::Shape(raw.to_string()))?;
        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| AddressError::Shape(raw.to_string()))?;

        if name.is_empty() || name.contains('/') {
            return Err(AddressError::Shape(raw.to_string()));
        }
        if host.is_empty() || !host.chars().all(is_host_char) {
            return Err(AddressError::Host(raw.to_string()));
        }
        let port = port.parse().map_err(|_| AddressError::Port {
            address: raw.to_string(),
            port: port.to_string(),
        })?;

        Ok(Self::new(host, port, name))
    }

    /// `host:port` of the registry holding this name.
    pub fn registry_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '[' | ']' | ':')
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}:{}/{}", self.host, self.port, self.name)
    }
}

impl FromStr for EndpointAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
