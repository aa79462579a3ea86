// src/program/mod.rs

//! Program handlers: the per-subsystem executors behind the router.
//!
//! - [`rts`] owns the real-time simulation vocabulary and the shared RTS
//!   resources.
//! - [`mfp`] handles forecasts and optimization trials; it holds a
//!   non-owning reference to the RTS resources.
//! - [`wat`] handles watershed-analysis alternatives.
//!
//! Every handler implements [`ProgramHandler`]. Command names resolve
//! case-insensitively; an unknown name is answered by the handler itself with
//! the same shape the router uses for a missing command.

use std::fmt;
use std::str::FromStr;

use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::catalog::{self, codes};
use crate::engine::{Engine, EngineError, JobKind};
use crate::protocol::{CommandRequest, CommandResponse, CommandStatus, sentinel};

pub mod mfp;
pub mod rts;
pub mod wat;

pub use mfp::{MfpCommand, MfpHandler};
pub use rts::{LastCompute, RtsCommand, RtsHandler, RtsResources, SharedRtsResources};
pub use wat::{WatCommand, WatHandler};

/// Client programs a request may address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientProgram {
    Rts,
    Mfp,
    Wat,
}

impl ClientProgram {
    pub fn as_str(self) -> &'static str {
        match self {
            ClientProgram::Rts => "RTS",
            ClientProgram::Mfp => "MFP",
            ClientProgram::Wat => "WAT",
        }
    }
}

impl fmt::Display for ClientProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientProgram {
    type Err = String;

    /// Program names are matched exactly, as clients send them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RTS" => Ok(ClientProgram::Rts),
            "MFP" => Ok(ClientProgram::Mfp),
            "WAT" => Ok(ClientProgram::Wat),
            other => Err(format!("unknown client program: {other}")),
        }
    }
}

/// A program's closed command vocabulary.
pub trait ProgramCommand: Copy + fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn resolve(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|command| command.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("command \"{command}\" requires parameter \"{param}\"")]
    MissingParameter { command: String, param: &'static str },

    #[error("alternative \"{0}\" does not exist")]
    UnknownAlternative(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("RTS shared resources have been released")]
    SharedResourcesReleased,

    #[error("{0} handler state is poisoned")]
    Poisoned(ClientProgram),
}

impl HandlerError {
    /// Faults escape to the router; everything else becomes a response.
    pub fn is_fault(&self) -> bool {
        match self {
            HandlerError::Engine(err) => err.is_fault(),
            HandlerError::SharedResourcesReleased | HandlerError::Poisoned(_) => true,
            HandlerError::MissingParameter { .. } | HandlerError::UnknownAlternative(_) => false,
        }
    }

    fn into_response(self, request: &CommandRequest) -> CommandResponse {
        let message = match &self {
            HandlerError::MissingParameter { command, param } => {
                catalog::get_message(codes::MISSING_PARAMETER, &[command.as_str(), *param])
            }
            HandlerError::UnknownAlternative(name) => {
                catalog::get_message(codes::UNKNOWN_TARGET, &["Alternative", name.as_str()])
            }
            HandlerError::Engine(err) => err.catalog_message(request.command()),
            other => other.to_string(),
        };
        CommandResponse::new(
            request.command(),
            request.id(),
            CommandStatus::InvalidParameter,
            message,
        )
    }
}

/// Capability set shared by the RTS, MFP and WAT handlers.
pub trait ProgramHandler {
    type Command: ProgramCommand;

    const PROGRAM: ClientProgram;

    /// Execute a resolved command against engine state.
    fn execute(
        &mut self,
        engine: &mut Engine,
        request: &CommandRequest,
        command: Self::Command,
    ) -> Result<CommandResponse, HandlerError>;

    /// Whether a command executed so far asked for the session to end.
    fn close_requested(&self) -> bool;

    /// Resolve the request's command and execute it.
    ///
    /// Caller mistakes (unknown command, bad parameters) come back as
    /// responses; only faults are returned as errors.
    fn handle(
        &mut self,
        engine: &mut Engine,
        request: &CommandRequest,
    ) -> Result<CommandResponse, HandlerError> {
        let Some(command) = Self::Command::resolve(request.command()) else {
            warn!(
                program = %Self::PROGRAM,
                command = %request.command(),
                id = %request.id(),
                "command not defined for program"
            );
            return Ok(CommandResponse::new(
                sentinel::UNDEFINED_COMMAND,
                request.id(),
                CommandStatus::UndefinedCommand,
                catalog::get_message(codes::COMMAND_NOT_DEFINED, &[request.document()]),
            ));
        };

        match self.execute(engine, request, command) {
            Ok(response) => Ok(response),
            Err(err) if err.is_fault() => Err(err),
            Err(err) => Ok(err.into_response(request)),
        }
    }
}

/// Required, non-empty string parameter from the request body.
pub(crate) fn require<'a>(
    request: &'a CommandRequest,
    param: &'static str,
) -> Result<&'a str, HandlerError> {
    request
        .param(param)
        .ok_or_else(|| HandlerError::MissingParameter {
            command: request.command().to_string(),
            param,
        })
}

pub(crate) fn ok(request: &CommandRequest, message: impl Into<String>) -> CommandResponse {
    CommandResponse::ok(request.command(), request.id(), message)
}

/// Response for a finished compute: `OK` on status 0, `Error_ComputeFailed`
/// otherwise.
pub(crate) fn compute_response(
    request: &CommandRequest,
    kind: JobKind,
    name: &str,
    status: i32,
) -> CommandResponse {
    let status_text = status.to_string();
    let message =
        catalog::get_message(codes::COMPUTE_RETURNED, &[kind.label(), name, status_text.as_str()]);
    let outcome = if status == 0 {
        CommandStatus::Ok
    } else {
        CommandStatus::ComputeFailed
    };
    CommandResponse::new(request.command(), request.id(), outcome, message).with_result(json!({
        "kind": kind,
        "name": name,
        "status": status,
    }))
}

/// Names of the targets of `kind` in the open project.
pub(crate) fn target_names(engine: &Engine, kind: JobKind) -> Result<Vec<String>, HandlerError> {
    let project = engine.project().ok_or(EngineError::NoProject)?;
    Ok(project.targets(kind).keys().cloned().collect())
}
