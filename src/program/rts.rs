// src/program/rts.rs

//! Real-time simulation (RTS) handler.
//!
//! The RTS handler owns [`RtsResources`], which the MFP handler reaches
//! through a `Weak` reference. Both handlers therefore see the same close
//! flag and the same "last compute" record.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::engine::{Engine, JobKind};
use crate::protocol::{CommandRequest, CommandResponse};

use super::{
    ClientProgram, HandlerError, ProgramCommand, ProgramHandler, compute_response, ok, require,
    target_names,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtsCommand {
    Ping,
    OpenProject,
    CloseProject,
    SetTimeWindow,
    CreateRun,
    Compute,
    GetRunStatus,
    ListRuns,
    Exit,
}

impl ProgramCommand for RtsCommand {
    const ALL: &'static [Self] = &[
        RtsCommand::Ping,
        RtsCommand::OpenProject,
        RtsCommand::CloseProject,
        RtsCommand::SetTimeWindow,
        RtsCommand::CreateRun,
        RtsCommand::Compute,
        RtsCommand::GetRunStatus,
        RtsCommand::ListRuns,
        RtsCommand::Exit,
    ];

    fn name(self) -> &'static str {
        match self {
            RtsCommand::Ping => "Ping",
            RtsCommand::OpenProject => "OpenProject",
            RtsCommand::CloseProject => "CloseProject",
            RtsCommand::SetTimeWindow => "SetTimeWindow",
            RtsCommand::CreateRun => "CreateRun",
            RtsCommand::Compute => "Compute",
            RtsCommand::GetRunStatus => "GetRunStatus",
            RtsCommand::ListRuns => "ListRuns",
            RtsCommand::Exit => "Exit",
        }
    }
}

/// Most recent compute issued through RTS or MFP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastCompute {
    pub kind: JobKind,
    pub name: String,
    pub status: i32,
}

/// State shared between the RTS handler and the MFP handler.
#[derive(Debug, Default)]
pub struct RtsResources {
    pub close_requested: bool,
    pub last_compute: Option<LastCompute>,
}

pub type SharedRtsResources = Arc<Mutex<RtsResources>>;

pub(crate) fn lock_resources(
    resources: &Mutex<RtsResources>,
    program: ClientProgram,
) -> Result<MutexGuard<'_, RtsResources>, HandlerError> {
    resources.lock().map_err(|_| HandlerError::Poisoned(program))
}

#[derive(Debug, Default)]
pub struct RtsHandler {
    resources: SharedRtsResources,
}

impl RtsHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-owning handle for handlers that wrap RTS (MFP).
    pub fn shared_resources(&self) -> Weak<Mutex<RtsResources>> {
        Arc::downgrade(&self.resources)
    }

    fn resources(&self) -> Result<MutexGuard<'_, RtsResources>, HandlerError> {
        lock_resources(&self.resources, ClientProgram::Rts)
    }
}

impl ProgramHandler for RtsHandler {
    type Command = RtsCommand;

    const PROGRAM: ClientProgram = ClientProgram::Rts;

    fn execute(
        &mut self,
        engine: &mut Engine,
        request: &CommandRequest,
        command: RtsCommand,
    ) -> Result<CommandResponse, HandlerError> {
        match command {
            RtsCommand::Ping => {
                let last = self.resources()?.last_compute.clone();
                Ok(ok(request, "RTS ready").with_result(json!({
                    "program": ClientProgram::Rts.as_str(),
                    "project": engine.project().map(|p| p.name.clone()),
                    "revision": engine.revision(),
                    "lastCompute": last,
                })))
            }
            RtsCommand::OpenProject => {
                let name = require(request, "project")?;
                let directory = request.param("directory").map(PathBuf::from);
                let project = engine.open_project(name, directory)?;
                Ok(ok(request, format!("Project \"{}\" opened", project.name)))
            }
            RtsCommand::CloseProject => {
                let message = match engine.close_project() {
                    Some(name) => format!("Project \"{name}\" closed"),
                    None => "No project was open".to_string(),
                };
                Ok(ok(request, message))
            }
            RtsCommand::SetTimeWindow => {
                let start = require(request, "start")?;
                let end = require(request, "end")?;
                engine.set_time_window(start, end)?;
                Ok(ok(request, format!("Time window set to {start} - {end}")))
            }
            RtsCommand::CreateRun => {
                let run = require(request, "run")?;
                engine.define(JobKind::Run, run)?;
                Ok(ok(request, format!("Run \"{run}\" created")))
            }
            RtsCommand::Compute => {
                let run = require(request, "run")?;
                let status = engine.compute(JobKind::Run, run)?;
                self.resources()?.last_compute = Some(LastCompute {
                    kind: JobKind::Run,
                    name: run.to_string(),
                    status,
                });
                Ok(compute_response(request, JobKind::Run, run, status))
            }
            RtsCommand::GetRunStatus => {
                let run = require(request, "run")?;
                let record = engine.record(JobKind::Run, run)?;
                Ok(ok(request, format!("Run \"{run}\" status")).with_result(json!({
                    "run": run,
                    "computeCount": record.compute_count,
                    "lastStatus": record.last_status,
                })))
            }
            RtsCommand::ListRuns => {
                let runs = target_names(engine, JobKind::Run)?;
                Ok(ok(request, format!("{} run(s)", runs.len())).with_result(json!(runs)))
            }
            RtsCommand::Exit => {
                self.resources()?.close_requested = true;
                info!(id = %request.id(), "RTS client requested session close");
                Ok(ok(request, "Session closing"))
            }
        }
    }

    fn close_requested(&self) -> bool {
        self.resources
            .lock()
            .map(|r| r.close_requested)
            .unwrap_or(false)
    }
}
