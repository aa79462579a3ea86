use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hms_command_server::engine::{EngineBackend, JobKind, Project};

type Target = (JobKind, String);

#[derive(Debug, Default)]
struct Script {
    statuses: HashMap<Target, i32>,
    faults: HashMap<Target, String>,
    panics: HashSet<Target>,
    missing_projects: HashSet<String>,
    delay: Duration,
    calls: Vec<Target>,
}

/// A compute backend whose behaviour is scripted per target:
/// - records every compute call
/// - returns the configured status (default `0`)
/// - raises or panics on demand
/// - optionally sleeps inside `compute`, tracking how many computes overlap.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn with_status(self, kind: JobKind, name: &str, status: i32) -> Self {
        self.script().statuses.insert((kind, name.to_string()), status);
        self
    }

    pub fn with_fault(self, kind: JobKind, name: &str, message: &str) -> Self {
        self.script()
            .faults
            .insert((kind, name.to_string()), message.to_string());
        self
    }

    pub fn with_panic(self, kind: JobKind, name: &str) -> Self {
        self.script().panics.insert((kind, name.to_string()));
        self
    }

    pub fn with_missing_project(self, name: &str) -> Self {
        self.script().missing_projects.insert(name.to_string());
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.script().delay = delay;
        self
    }

    /// Compute calls seen so far, in order.
    pub fn calls(&self) -> Vec<(JobKind, String)> {
        self.script().calls.clone()
    }

    /// Highest number of computes that were ever running at once.
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EngineBackend for ScriptedBackend {
    fn load_project(&self, name: &str, directory: Option<&Path>) -> anyhow::Result<Option<Project>> {
        if self.script().missing_projects.contains(name) {
            return Ok(None);
        }
        Ok(Some(Project::new(name, directory.map(Path::to_path_buf))))
    }

    fn compute(&self, kind: JobKind, name: &str, _project: &Project) -> anyhow::Result<i32> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _active = ActiveGuard(&self.active);
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let target = (kind, name.to_string());
        let (delay, panics, fault, status) = {
            let mut script = self.script();
            script.calls.push(target.clone());
            (
                script.delay,
                script.panics.contains(&target),
                script.faults.get(&target).cloned(),
                script.statuses.get(&target).copied().unwrap_or(0),
            )
        };

        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if panics {
            panic!("scripted panic computing {kind} {name}");
        }
        if let Some(message) = fault {
            anyhow::bail!("{message}");
        }
        Ok(status)
    }
}
