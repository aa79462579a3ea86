// src/protocol/mod.rs

//! Request/response documents exchanged with command clients.
//!
//! The wire encoding is JSON:
//!
//! ```json
//! {"Request": {"command": "Compute", "id": "42", "clientProgram": "RTS", "run": "Run 1"}}
//! {"Response": {"command": "Compute", "id": "42", "status": "OK", "message": "..."}}
//! ```

pub mod request;
pub mod response;
pub mod status;

pub use request::{Classification, CommandRequest, DocumentError, RequestDocument};
pub use response::CommandResponse;
pub use status::CommandStatus;

/// Root marker expected on request documents (matched case-insensitively).
pub const REQUEST_ROOT: &str = "Request";
/// Root marker written on response documents.
pub const RESPONSE_ROOT: &str = "Response";
/// Id used when a request does not carry one.
pub const DEFAULT_ID: &str = "-1";

/// Classification sentinels echoed in the `command` field of rejections.
pub mod sentinel {
    pub const UNRECOGNIZED_DOCUMENT: &str = "UnrecognizedDocument";
    pub const UNDEFINED_COMMAND: &str = "UndefinedCommand";
    pub const UNDEFINED_PROGRAM: &str = "UndefinedProgram";
    pub const UNCAUGHT_EXCEPTION: &str = "UncaughtException";
}
