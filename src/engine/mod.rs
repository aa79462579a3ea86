// src/engine/mod.rs

//! Engine state shared by the program handlers and the job bridge.
//!
//! The hydrologic computations themselves live behind [`EngineBackend`];
//! this module only keeps the session-visible state (open project, targets,
//! last statuses) and funnels every compute through [`Engine::compute`].
//!
//! An `Engine` is owned by the session's dispatch lock (see
//! [`crate::session`]); whoever holds that guard is its only mutator.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::{self, codes};

pub mod project;

pub use project::{ComputeRecord, Project, TimeWindow};

/// The three kinds of computation the engine performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobKind {
    Run,
    Trial,
    Forecast,
}

impl JobKind {
    pub fn label(self) -> &'static str {
        match self {
            JobKind::Run => "Run",
            JobKind::Trial => "Trial",
            JobKind::Forecast => "Forecast",
        }
    }

    /// Catalog entry used when a job of this kind fails.
    pub fn failure_code(self) -> u32 {
        match self {
            JobKind::Run => codes::RUN_COMPUTE_FAILED,
            JobKind::Trial => codes::TRIAL_COMPUTE_FAILED,
            JobKind::Forecast => codes::FORECAST_COMPUTE_FAILED,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "run" => Ok(JobKind::Run),
            "trial" => Ok(JobKind::Trial),
            "forecast" => Ok(JobKind::Forecast),
            other => Err(format!(
                "invalid job kind: {other} (expected \"run\", \"trial\" or \"forecast\")"
            )),
        }
    }
}

/// External computation engine.
///
/// Production code uses [`InMemoryBackend`]; tests plug in scripted
/// backends to control statuses, faults and timing.
pub trait EngineBackend: Send + Sync {
    /// Load a project. `Ok(None)` means "no such project".
    fn load_project(&self, name: &str, directory: Option<&Path>) -> anyhow::Result<Option<Project>> {
        Ok(Some(Project::new(name, directory.map(Path::to_path_buf))))
    }

    /// Compute one target and return the worker status (`0` = success).
    fn compute(&self, kind: JobKind, name: &str, project: &Project) -> anyhow::Result<i32>;
}

/// Backend that performs no numerical work.
///
/// Runs need a time window to succeed (status `1` otherwise); trials and
/// forecasts always succeed.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend;

impl EngineBackend for InMemoryBackend {
    fn compute(&self, kind: JobKind, name: &str, project: &Project) -> anyhow::Result<i32> {
        let status = match kind {
            JobKind::Run if project.time_window.is_none() => 1,
            _ => 0,
        };
        debug!(kind = %kind, target = %name, status, "in-memory compute finished");
        Ok(status)
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no project is open")]
    NoProject,

    #[error("project \"{0}\" could not be found")]
    ProjectNotFound(String),

    #[error("{kind} \"{name}\" does not exist")]
    UnknownTarget { kind: JobKind, name: String },

    #[error("{kind} \"{name}\" already exists")]
    DuplicateTarget { kind: JobKind, name: String },

    #[error("time window start \"{start}\" must precede end \"{end}\"")]
    InvalidTimeWindow { start: String, end: String },

    #[error("engine backend failed: {0:#}")]
    Backend(#[source] anyhow::Error),
}

impl EngineError {
    /// Backend faults are unexpected; everything else is a caller mistake.
    pub fn is_fault(&self) -> bool {
        matches!(self, EngineError::Backend(_))
    }

    /// Catalog text for caller mistakes, `command` being the operation that
    /// hit the error.
    pub fn catalog_message(&self, command: &str) -> String {
        match self {
            EngineError::NoProject => catalog::get_message(codes::NO_PROJECT_OPEN, &[command]),
            EngineError::ProjectNotFound(name) => {
                catalog::get_message(codes::PROJECT_NOT_FOUND, &[name])
            }
            EngineError::UnknownTarget { kind, name } => {
                catalog::get_message(codes::UNKNOWN_TARGET, &[kind.label(), name.as_str()])
            }
            EngineError::DuplicateTarget { kind, name } => {
                catalog::get_message(codes::DUPLICATE_TARGET, &[kind.label(), name.as_str()])
            }
            EngineError::InvalidTimeWindow { start, end } => {
                catalog::get_message(codes::INVALID_TIME_WINDOW, &[start, end])
            }
            EngineError::Backend(err) => format!("{err:#}"),
        }
    }
}

/// Session-visible engine state.
pub struct Engine {
    project: Option<Project>,
    backend: Arc<dyn EngineBackend>,
    revision: u64,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("project", &self.project.as_ref().map(|p| &p.name))
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(backend: Arc<dyn EngineBackend>) -> Self {
        Self {
            project: None,
            backend,
            revision: 0,
        }
    }

    /// Monotonic counter bumped by every state change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    fn project_mut(&mut self) -> Result<&mut Project, EngineError> {
        self.project.as_mut().ok_or(EngineError::NoProject)
    }

    pub fn open_project(&mut self, name: &str, directory: Option<PathBuf>) -> Result<&Project, EngineError> {
        let loaded = self
            .backend
            .load_project(name, directory.as_deref())
            .map_err(EngineError::Backend)?;
        let project = loaded.ok_or_else(|| EngineError::ProjectNotFound(name.to_string()))?;

        info!(project = %project.name, "project opened");
        self.revision += 1;
        Ok(&*self.project.insert(project))
    }

    /// Close the open project, returning its name.
    pub fn close_project(&mut self) -> Option<String> {
        let closed = self.project.take().map(|p| p.name);
        if closed.is_some() {
            self.revision += 1;
        }
        closed
    }

    pub fn set_time_window(&mut self, start: &str, end: &str) -> Result<(), EngineError> {
        if start.is_empty() || end.is_empty() || start >= end {
            return Err(EngineError::InvalidTimeWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        let project = self.project_mut()?;
        project.time_window = Some(TimeWindow {
            start: start.to_string(),
            end: end.to_string(),
        });
        self.revision += 1;
        Ok(())
    }

    pub fn define(&mut self, kind: JobKind, name: &str) -> Result<(), EngineError> {
        let targets = self.project_mut()?.targets_mut(kind);
        if targets.contains_key(name) {
            return Err(EngineError::DuplicateTarget {
                kind,
                name: name.to_string(),
            });
        }
        targets.insert(name.to_string(), ComputeRecord::default());
        self.revision += 1;
        Ok(())
    }

    pub fn record(&self, kind: JobKind, name: &str) -> Result<&ComputeRecord, EngineError> {
        let project = self.project.as_ref().ok_or(EngineError::NoProject)?;
        project
            .targets(kind)
            .get(name)
            .ok_or_else(|| EngineError::UnknownTarget {
                kind,
                name: name.to_string(),
            })
    }

    pub fn select_trial(&mut self, name: &str) -> Result<(), EngineError> {
        self.record(JobKind::Trial, name)?;
        self.project_mut()?.selected_trial = Some(name.to_string());
        self.revision += 1;
        Ok(())
    }

    /// Compute a defined target and record the resulting status.
    pub fn compute(&mut self, kind: JobKind, name: &str) -> Result<i32, EngineError> {
        self.record(kind, name)?;

        let backend = Arc::clone(&self.backend);
        let project = self.project.as_ref().ok_or(EngineError::NoProject)?;
        let status = backend
            .compute(kind, name, project)
            .map_err(EngineError::Backend)?;

        let record = self
            .project_mut()?
            .targets_mut(kind)
            .entry(name.to_string())
            .or_default();
        record.compute_count += 1;
        record.last_status = Some(status);
        self.revision += 1;

        info!(kind = %kind, target = %name, status, "compute finished");
        Ok(status)
    }
}
