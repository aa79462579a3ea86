#![allow(dead_code)]

use serde_json::{Map, Value};

/// Builder for raw request documents.
///
/// ```ignore
/// let doc = rts("Compute").id("7").param("run", "Run 1").build();
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    root: String,
    fields: Map<String, Value>,
}

impl RequestBuilder {
    /// A `Request` document with `command` set and nothing else.
    pub fn new(command: &str) -> Self {
        Self::bare().field("command", command)
    }

    /// A `Request` document with no attributes at all.
    pub fn bare() -> Self {
        Self {
            root: "Request".to_string(),
            fields: Map::new(),
        }
    }

    pub fn root(mut self, root: &str) -> Self {
        self.root = root.to_string();
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.field("id", id)
    }

    pub fn program(self, program: &str) -> Self {
        self.field("clientProgram", program)
    }

    pub fn param(self, name: &str, value: &str) -> Self {
        self.field(name, value)
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.fields.remove(name);
        self
    }

    pub fn build(self) -> String {
        let mut top = Map::with_capacity(1);
        top.insert(self.root, Value::Object(self.fields));
        Value::Object(top).to_string()
    }
}

pub fn rts(command: &str) -> RequestBuilder {
    RequestBuilder::new(command).program("RTS")
}

pub fn mfp(command: &str) -> RequestBuilder {
    RequestBuilder::new(command).program("MFP")
}

pub fn wat(command: &str) -> RequestBuilder {
    RequestBuilder::new(command).program("WAT")
}
