// src/protocol/status.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status code carried by every response document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "Error_UnableToProcessDocument")]
    UnableToProcessDocument,
    #[serde(rename = "Error_UndefinedCommand")]
    UndefinedCommand,
    #[serde(rename = "Error_UndefinedProgram")]
    UndefinedProgram,
    #[serde(rename = "Error_CommandFailed")]
    CommandFailed,
    #[serde(rename = "Error_InvalidParameter")]
    InvalidParameter,
    #[serde(rename = "Error_ComputeFailed")]
    ComputeFailed,
}

impl CommandStatus {
    pub const ALL: [CommandStatus; 7] = [
        CommandStatus::Ok,
        CommandStatus::UnableToProcessDocument,
        CommandStatus::UndefinedCommand,
        CommandStatus::UndefinedProgram,
        CommandStatus::CommandFailed,
        CommandStatus::InvalidParameter,
        CommandStatus::ComputeFailed,
    ];

    /// Wire name, e.g. `"Error_UndefinedProgram"`.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandStatus::Ok => "OK",
            CommandStatus::UnableToProcessDocument => "Error_UnableToProcessDocument",
            CommandStatus::UndefinedCommand => "Error_UndefinedCommand",
            CommandStatus::UndefinedProgram => "Error_UndefinedProgram",
            CommandStatus::CommandFailed => "Error_CommandFailed",
            CommandStatus::InvalidParameter => "Error_InvalidParameter",
            CommandStatus::ComputeFailed => "Error_ComputeFailed",
        }
    }

    pub fn is_ok(self) -> bool {
        self == CommandStatus::Ok
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("unknown command status: {s}"))
    }
}
