// src/protocol/request.rs

//! Request documents and their classification.
//!
//! Parsing is a two-stage state machine:
//!
//! 1. [`RequestDocument::parse`] turns raw text into a document with a root
//!    marker and a field map, or fails with [`DocumentError`].
//! 2. [`RequestDocument::classify`] inspects the document and yields a
//!    [`Classification`]: either a recognized [`CommandRequest`] ready for
//!    dispatch, or one of the rejection classes.

use serde_json::{Map, Value};
use thiserror::Error;

use super::{DEFAULT_ID, REQUEST_ROOT};

/// Raw request text could not be turned into a document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("document is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("document must be an object with exactly one root element (found {0})")]
    Root(String),

    #[error("root element '{0}' must be an object")]
    RootBody(String),
}

/// A parsed, not yet classified, request document.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDocument {
    root: String,
    fields: Map<String, Value>,
}

impl RequestDocument {
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_str(raw)?;

        let Value::Object(top) = value else {
            return Err(DocumentError::Root(describe(&value).to_string()));
        };
        if top.len() != 1 {
            return Err(DocumentError::Root(format!("{} elements", top.len())));
        }

        let Some((root, body)) = top.into_iter().next() else {
            return Err(DocumentError::Root("0 elements".to_string()));
        };
        match body {
            Value::Object(fields) => Ok(Self { root, fields }),
            _ => Err(DocumentError::RootBody(root)),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// String attribute on the root element. Numbers and booleans are
    /// rendered as text; anything else is treated as absent.
    pub fn attribute(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Serialized form, used to echo the request back in diagnostics.
    pub fn to_document_string(&self) -> String {
        let mut top = Map::with_capacity(1);
        top.insert(self.root.clone(), Value::Object(self.fields.clone()));
        Value::Object(top).to_string()
    }

    pub fn classify(&self) -> Classification {
        let id = self.attribute("id").unwrap_or_else(|| DEFAULT_ID.to_string());

        if !self.root.eq_ignore_ascii_case(REQUEST_ROOT) {
            return Classification::UnrecognizedDocument { id };
        }

        let Some(command) = self.attribute("command").filter(|c| !c.trim().is_empty()) else {
            return Classification::UndefinedCommand { id };
        };

        let Some(client_program) = self.attribute("clientProgram") else {
            return Classification::UndefinedProgram { command, id };
        };

        let body = self
            .fields
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "command" | "id" | "clientProgram"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Classification::Recognized(CommandRequest {
            command,
            id,
            client_program,
            body,
            document: self.to_document_string(),
        })
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Outcome of classifying a parsed document.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Recognized(CommandRequest),
    UnrecognizedDocument { id: String },
    UndefinedCommand { id: String },
    UndefinedProgram { command: String, id: String },
}

/// A structurally valid request. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    command: String,
    id: String,
    client_program: String,
    body: Map<String, Value>,
    document: String,
}

impl CommandRequest {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client_program(&self) -> &str {
        &self.client_program
    }

    /// Handler-specific content: every field other than the routing
    /// attributes.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Body parameter as a non-empty string.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.body
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The request as it arrived, re-serialized.
    pub fn document(&self) -> &str {
        &self.document
    }
}
