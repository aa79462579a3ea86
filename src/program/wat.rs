// src/program/wat.rs

//! Watershed-analysis tool (WAT) handler.
//!
//! WAT keeps its own table of alternatives, each mapped onto a simulation
//! run of the open project. Computing an alternative computes that run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::json;
use tracing::info;

use crate::engine::{Engine, JobKind};
use crate::protocol::{CommandRequest, CommandResponse};

use super::{ClientProgram, HandlerError, ProgramCommand, ProgramHandler, compute_response, ok, require};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatCommand {
    Ping,
    OpenProject,
    CreateAlternative,
    ComputeAlternative,
    ListAlternatives,
    Exit,
}

impl ProgramCommand for WatCommand {
    const ALL: &'static [Self] = &[
        WatCommand::Ping,
        WatCommand::OpenProject,
        WatCommand::CreateAlternative,
        WatCommand::ComputeAlternative,
        WatCommand::ListAlternatives,
        WatCommand::Exit,
    ];

    fn name(self) -> &'static str {
        match self {
            WatCommand::Ping => "Ping",
            WatCommand::OpenProject => "OpenProject",
            WatCommand::CreateAlternative => "CreateAlternative",
            WatCommand::ComputeAlternative => "ComputeAlternative",
            WatCommand::ListAlternatives => "ListAlternatives",
            WatCommand::Exit => "Exit",
        }
    }
}

#[derive(Debug, Default)]
pub struct WatHandler {
    /// Alternative name → run name.
    alternatives: BTreeMap<String, String>,
    close_requested: bool,
}

impl WatHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgramHandler for WatHandler {
    type Command = WatCommand;

    const PROGRAM: ClientProgram = ClientProgram::Wat;

    fn execute(
        &mut self,
        engine: &mut Engine,
        request: &CommandRequest,
        command: WatCommand,
    ) -> Result<CommandResponse, HandlerError> {
        match command {
            WatCommand::Ping => Ok(ok(request, "WAT ready").with_result(json!({
                "program": ClientProgram::Wat.as_str(),
                "project": engine.project().map(|p| p.name.clone()),
                "alternatives": self.alternatives.len(),
            }))),
            WatCommand::OpenProject => {
                let name = require(request, "project")?;
                let directory = request.param("directory").map(PathBuf::from);
                let project = engine.open_project(name, directory)?;
                let message = format!("Project \"{}\" opened", project.name);
                // Alternatives refer to runs of the previous project.
                self.alternatives.clear();
                Ok(ok(request, message))
            }
            WatCommand::CreateAlternative => {
                let alternative = require(request, "alternative")?;
                let run = require(request, "run")?;
                engine.record(JobKind::Run, run)?;
                self.alternatives
                    .insert(alternative.to_string(), run.to_string());
                Ok(ok(
                    request,
                    format!("Alternative \"{alternative}\" mapped to run \"{run}\""),
                ))
            }
            WatCommand::ComputeAlternative => {
                let alternative = require(request, "alternative")?;
                let run = self
                    .alternatives
                    .get(alternative)
                    .cloned()
                    .ok_or_else(|| HandlerError::UnknownAlternative(alternative.to_string()))?;
                let status = engine.compute(JobKind::Run, &run)?;
                Ok(compute_response(request, JobKind::Run, &run, status))
            }
            WatCommand::ListAlternatives => {
                let listing: Vec<_> = self
                    .alternatives
                    .iter()
                    .map(|(alternative, run)| json!({ "alternative": alternative, "run": run }))
                    .collect();
                Ok(ok(request, format!("{} alternative(s)", listing.len()))
                    .with_result(json!(listing)))
            }
            WatCommand::Exit => {
                self.close_requested = true;
                info!(id = %request.id(), "WAT client requested session close");
                Ok(ok(request, "Session closing"))
            }
        }
    }

    fn close_requested(&self) -> bool {
        self.close_requested
    }
}
