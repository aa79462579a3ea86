// src/protocol/response.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CommandStatus, RESPONSE_ROOT};

/// Response to a single request. Every dispatch path produces exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Original command name, or a classification sentinel such as
    /// `UndefinedCommand`.
    pub command: String,
    pub id: String,
    pub status: CommandStatus,
    pub message: String,
    /// Error chain for failures caused by an unexpected fault.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Handler payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct ResponseDocument {
    #[serde(rename = "Response")]
    response: CommandResponse,
}

impl CommandResponse {
    pub fn ok(command: impl Into<String>, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(command, id, CommandStatus::Ok, message)
    }

    pub fn new(
        command: impl Into<String>,
        id: impl Into<String>,
        status: CommandStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            id: id.into(),
            status,
            message: message.into(),
            details: None,
            result: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    /// Serialize as `{"Response": {...}}`.
    pub fn to_document_string(&self) -> String {
        let doc = ResponseDocument {
            response: self.clone(),
        };
        match serde_json::to_string(&doc) {
            Ok(text) => text,
            // Only reachable if a handler put a non-serializable value in
            // `result`; degrade to the bare status line.
            Err(err) => Value::Object(
                [(
                    RESPONSE_ROOT.to_string(),
                    serde_json::json!({
                        "command": self.command,
                        "id": self.id,
                        "status": self.status.as_str(),
                        "message": format!("{} (result dropped: {err})", self.message),
                    }),
                )]
                .into_iter()
                .collect(),
            )
            .to_string(),
        }
    }

    /// Parse a response document produced by [`Self::to_document_string`].
    pub fn from_document_str(raw: &str) -> Result<Self, serde_json::Error> {
        let doc: ResponseDocument = serde_json::from_str(raw)?;
        Ok(doc.response)
    }
}
