// src/endpoint/wire.rs

//! Line-delimited JSON framing and the message types spoken over it.
//!
//! Every message is one JSON object followed by `\n`. The registry, the
//! command endpoint and the check-in authority all use the same framing;
//! each has its own request/reply enums below.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

#[derive(Error, Debug)]
pub enum WireError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("peer closed the connection")]
    Closed,
}

/// One framed TCP connection.
#[derive(Debug)]
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    line: String,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
            line: String::new(),
        }
    }

    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, WireError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), WireError> {
        let mut bytes = serde_json::to_vec(message)?;
        bytes.push(b'\n');
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next message, or `None` once the peer has closed its side.
    /// Blank lines are skipped.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<Option<T>, WireError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                return Ok(None);
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(serde_json::from_str(trimmed)?));
        }
    }

    /// Send a request and wait for its reply.
    pub async fn call<Req, Rep>(&mut self, request: &Req) -> Result<Rep, WireError>
    where
        Req: Serialize,
        Rep: DeserializeOwned,
    {
        self.send(request).await?;
        self.recv().await?.ok_or(WireError::Closed)
    }
}

/// Name registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RegistryRequest {
    List,
    Lookup { name: String },
    Rebind { name: String, address: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum RegistryReply {
    Names { names: Vec<String> },
    Address { address: String },
    Bound,
    NotBound { name: String },
    Error { message: String },
}

/// Calls accepted by the command endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EndpointCall {
    Execute { document: String },
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum EndpointReply {
    Document { document: String },
    Pong,
    Error { message: String },
}

/// Calls understood by a client's check-in authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CheckInCall {
    Register { pid: u32, name: String },
    Heartbeat { pid: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum CheckInReply {
    Registered,
    Status { client_alive: bool },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_messages_are_tagged_by_operation() {
        let text = serde_json::to_string(&RegistryRequest::Lookup {
            name: "HmsCommandServer".into(),
        })
        .expect("serialize");
        assert_eq!(text, r#"{"op":"lookup","name":"HmsCommandServer"}"#);

        let reply: CheckInReply =
            serde_json::from_str(r#"{"reply":"status","client_alive":false}"#).expect("parse");
        assert_eq!(reply, CheckInReply::Status { client_alive: false });
    }
}
