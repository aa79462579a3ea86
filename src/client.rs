// src/client.rs

//! Client for a published command server.

use thiserror::Error;

use crate::endpoint::wire::{Connection, EndpointCall, EndpointReply, WireError};
use crate::endpoint::{AddressError, EndpointAddress, RegistryClient, RegistryError};
use crate::protocol::CommandResponse;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{0} is not bound in the registry")]
    NotBound(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("server reported an error: {0}")]
    Server(String),

    #[error("unexpected reply from server: {0:?}")]
    UnexpectedReply(EndpointReply),

    #[error("response document could not be parsed: {0}")]
    Response(#[from] serde_json::Error),
}

/// Connection to a command server resolved through its registry.
#[derive(Debug)]
pub struct CommandClient {
    address: EndpointAddress,
    conn: Connection,
}

impl CommandClient {
    /// Resolve `url` (`hms://host:port/name`) and connect to the endpoint.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let address = EndpointAddress::parse(url)?;
        let registry = RegistryClient::new(address.registry_addr());
        let endpoint = registry
            .lookup(&address.name)
            .await?
            .ok_or_else(|| ClientError::NotBound(address.to_string()))?;
        let conn = Connection::connect(endpoint.as_str()).await?;
        Ok(Self { address, conn })
    }

    pub fn address(&self) -> &EndpointAddress {
        &self.address
    }

    /// Send a raw request document and return the raw response document.
    pub async fn execute(&mut self, document: &str) -> Result<String, ClientError> {
        let call = EndpointCall::Execute {
            document: document.to_string(),
        };
        match self.conn.call(&call).await? {
            EndpointReply::Document { document } => Ok(document),
            EndpointReply::Error { message } => Err(ClientError::Server(message)),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    /// Like [`Self::execute`], parsing the response document.
    pub async fn request(&mut self, document: &str) -> Result<CommandResponse, ClientError> {
        let raw = self.execute(document).await?;
        Ok(CommandResponse::from_document_str(&raw)?)
    }

    pub async fn ping(&mut self) -> Result<(), ClientError> {
        match self.conn.call(&EndpointCall::Ping).await? {
            EndpointReply::Pong => Ok(()),
            EndpointReply::Error { message } => Err(ClientError::Server(message)),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }
}
