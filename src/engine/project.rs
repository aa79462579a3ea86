// src/engine/project.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use super::JobKind;

/// Simulation time window. Bounds are ISO-8601 date-times
/// (`2024-01-01T00:00`), compared lexically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: String,
    pub end: String,
}

/// Bookkeeping for one computable target (run, trial or forecast).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComputeRecord {
    pub compute_count: u32,
    pub last_status: Option<i32>,
}

/// In-memory view of an open project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub name: String,
    pub directory: Option<PathBuf>,
    pub time_window: Option<TimeWindow>,
    pub runs: BTreeMap<String, ComputeRecord>,
    pub trials: BTreeMap<String, ComputeRecord>,
    pub forecasts: BTreeMap<String, ComputeRecord>,
    pub selected_trial: Option<String>,
}

impl Project {
    pub fn new(name: impl Into<String>, directory: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory,
            time_window: None,
            runs: BTreeMap::new(),
            trials: BTreeMap::new(),
            forecasts: BTreeMap::new(),
            selected_trial: None,
        }
    }

    pub fn targets(&self, kind: JobKind) -> &BTreeMap<String, ComputeRecord> {
        match kind {
            JobKind::Run => &self.runs,
            JobKind::Trial => &self.trials,
            JobKind::Forecast => &self.forecasts,
        }
    }

    pub fn targets_mut(&mut self, kind: JobKind) -> &mut BTreeMap<String, ComputeRecord> {
        match kind {
            JobKind::Run => &mut self.runs,
            JobKind::Trial => &mut self.trials,
            JobKind::Forecast => &mut self.forecasts,
        }
    }

    /// Convenience for builders: add targets without going through the
    /// engine.
    pub fn with_target(mut self, kind: JobKind, name: impl Into<String>) -> Self {
        self.targets_mut(kind)
            .insert(name.into(), ComputeRecord::default());
        self
    }
}
