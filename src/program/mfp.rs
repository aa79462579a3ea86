// src/program/mfp.rs

//! Forecast and optimization (MFP) handler.
//!
//! MFP does not own any session resources of its own: it works through a
//! `Weak` reference to the RTS handler's [`RtsResources`], so an `Exit` sent
//! as MFP closes the same session RTS reports on.

use std::sync::{Mutex, Weak};

use serde_json::json;
use tracing::info;

use crate::engine::{Engine, JobKind};
use crate::protocol::{CommandRequest, CommandResponse};

use super::rts::{LastCompute, RtsResources, lock_resources};
use super::{
    ClientProgram, HandlerError, ProgramCommand, ProgramHandler, RtsHandler, compute_response, ok,
    require, target_names,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfpCommand {
    Ping,
    CreateForecast,
    ComputeForecast,
    CreateTrial,
    ComputeTrial,
    SelectTrial,
    ListForecasts,
    ListTrials,
    Exit,
}

impl ProgramCommand for MfpCommand {
    const ALL: &'static [Self] = &[
        MfpCommand::Ping,
        MfpCommand::CreateForecast,
        MfpCommand::ComputeForecast,
        MfpCommand::CreateTrial,
        MfpCommand::ComputeTrial,
        MfpCommand::SelectTrial,
        MfpCommand::ListForecasts,
        MfpCommand::ListTrials,
        MfpCommand::Exit,
    ];

    fn name(self) -> &'static str {
        match self {
            MfpCommand::Ping => "Ping",
            MfpCommand::CreateForecast => "CreateForecast",
            MfpCommand::ComputeForecast => "ComputeForecast",
            MfpCommand::CreateTrial => "CreateTrial",
            MfpCommand::ComputeTrial => "ComputeTrial",
            MfpCommand::SelectTrial => "SelectTrial",
            MfpCommand::ListForecasts => "ListForecasts",
            MfpCommand::ListTrials => "ListTrials",
            MfpCommand::Exit => "Exit",
        }
    }
}

#[derive(Debug)]
pub struct MfpHandler {
    rts: Weak<Mutex<RtsResources>>,
}

impl MfpHandler {
    pub fn new(rts: &RtsHandler) -> Self {
        Self {
            rts: rts.shared_resources(),
        }
    }

    fn with_rts<T>(
        &self,
        f: impl FnOnce(&mut RtsResources) -> T,
    ) -> Result<T, HandlerError> {
        let shared = self.rts.upgrade().ok_or(HandlerError::SharedResourcesReleased)?;
        let mut guard = lock_resources(&shared, ClientProgram::Mfp)?;
        Ok(f(&mut *guard))
    }

    fn compute(
        &self,
        engine: &mut Engine,
        request: &CommandRequest,
        kind: JobKind,
        param: &'static str,
    ) -> Result<CommandResponse, HandlerError> {
        let name = require(request, param)?;
        let status = engine.compute(kind, name)?;
        self.with_rts(|rts| {
            rts.last_compute = Some(LastCompute {
                kind,
                name: name.to_string(),
                status,
            })
        })?;
        Ok(compute_response(request, kind, name, status))
    }
}

impl ProgramHandler for MfpHandler {
    type Command = MfpCommand;

    const PROGRAM: ClientProgram = ClientProgram::Mfp;

    fn execute(
        &mut self,
        engine: &mut Engine,
        request: &CommandRequest,
        command: MfpCommand,
    ) -> Result<CommandResponse, HandlerError> {
        match command {
            MfpCommand::Ping => {
                let last = self.with_rts(|rts| rts.last_compute.clone())?;
                Ok(ok(request, "MFP ready").with_result(json!({
                    "program": ClientProgram::Mfp.as_str(),
                    "project": engine.project().map(|p| p.name.clone()),
                    "selectedTrial": engine.project().and_then(|p| p.selected_trial.clone()),
                    "lastCompute": last,
                })))
            }
            MfpCommand::CreateForecast => {
                let forecast = require(request, "forecast")?;
                engine.define(JobKind::Forecast, forecast)?;
                Ok(ok(request, format!("Forecast \"{forecast}\" created")))
            }
            MfpCommand::ComputeForecast => {
                self.compute(engine, request, JobKind::Forecast, "forecast")
            }
            MfpCommand::CreateTrial => {
                let trial = require(request, "trial")?;
                engine.define(JobKind::Trial, trial)?;
                Ok(ok(request, format!("Trial \"{trial}\" created")))
            }
            MfpCommand::ComputeTrial => self.compute(engine, request, JobKind::Trial, "trial"),
            MfpCommand::SelectTrial => {
                let trial = require(request, "trial")?;
                engine.select_trial(trial)?;
                Ok(ok(request, format!("Trial \"{trial}\" selected")))
            }
            MfpCommand::ListForecasts => {
                let forecasts = target_names(engine, JobKind::Forecast)?;
                Ok(ok(request, format!("{} forecast(s)", forecasts.len()))
                    .with_result(json!(forecasts)))
            }
            MfpCommand::ListTrials => {
                let trials = target_names(engine, JobKind::Trial)?;
                Ok(ok(request, format!("{} trial(s)", trials.len())).with_result(json!(trials)))
            }
            MfpCommand::Exit => {
                self.with_rts(|rts| rts.close_requested = true)?;
                info!(id = %request.id(), "MFP client requested session close");
                Ok(ok(request, "Session closing"))
            }
        }
    }

    fn close_requested(&self) -> bool {
        self.with_rts(|rts| rts.close_requested).unwrap_or(false)
    }
}
