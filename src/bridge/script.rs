// src/bridge/script.rs

//! One-shot command scripts.
//!
//! A script is a text file with one call per line:
//!
//! ```text
//! # comments start with '#'
//! OpenProject("Castro", "/data/castro")
//! SetTimeWindow("2024-01-01T00:00", "2024-01-03T00:00")
//! ComputeRun("Run 1")
//! Exit(0)
//! ```
//!
//! Arguments are double-quoted strings (with `\"` and `\\` escapes) or bare
//! tokens. [`run_script`] returns the process status: `-1` when the file is
//! missing, unreadable or a statement fails, the `Exit(n)` argument when the
//! script calls `Exit`, `0` otherwise.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{error, info};

use crate::catalog::{self, codes};
use crate::engine::JobKind;

use super::{BridgeError, JobBridge};

static CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)\s*;?$").expect("statement pattern is valid")
});

static ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:"((?:[^"\\]|\\.)*)"|([^,"]*?))\s*(?:,|$)"#)
        .expect("argument pattern is valid")
});

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("line {line}: cannot parse statement \"{text}\"")]
    Syntax { line: usize, text: String },

    #[error("line {line}: unknown function {name}()")]
    UnknownFunction { line: usize, name: String },

    #[error("line {line}: {name}() takes {expected} argument(s), got {got}")]
    Arity {
        line: usize,
        name: String,
        expected: &'static str,
        got: usize,
    },

    #[error("line {line}: Exit() status must be an integer, got \"{value}\"")]
    ExitStatus { line: usize, value: String },

    #[error("line {line}: {source}")]
    Bridge {
        line: usize,
        #[source]
        source: BridgeError,
    },
}

/// One parsed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub line: usize,
    pub name: String,
    pub args: Vec<String>,
}

/// Parse one script line. Blank lines and comments yield `None`.
pub fn parse_line(line: usize, text: &str) -> Result<Option<Statement>, ScriptError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let syntax = || ScriptError::Syntax {
        line,
        text: trimmed.to_string(),
    };
    let caps = CALL.captures(trimmed).ok_or_else(syntax)?;
    let name = caps[1].to_string();
    let args = parse_args(&caps[2]).ok_or_else(syntax)?;

    Ok(Some(Statement { line, name, args }))
}

fn parse_args(mut rest: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    if rest.trim().is_empty() {
        return Some(args);
    }

    loop {
        let caps = ARG.captures(rest)?;
        let whole = caps.get(0)?;
        let value = match (caps.get(1), caps.get(2)) {
            (Some(quoted), _) => unescape(quoted.as_str()),
            (None, Some(bare)) => bare.as_str().trim().to_string(),
            (None, None) => return None,
        };
        args.push(value);

        let consumed = whole.as_str();
        rest = &rest[whole.end()..];
        if !consumed.trim_end().ends_with(',') {
            return rest.trim().is_empty().then_some(args);
        }
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

enum Flow {
    Continue,
    Exit(i32),
}

/// Run the script at `path` against `bridge` and return its status.
///
/// Must run on a blocking thread (e.g. inside `spawn_blocking`).
pub fn run_script(bridge: &JobBridge, path: &Path) -> i32 {
    let script_name = path.display().to_string();

    if !path.is_file() {
        let message = catalog::get_message(codes::SCRIPT_NOT_FOUND, &[&script_name]);
        error!("{message}");
        return -1;
    }
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            let message = catalog::get_message(codes::SCRIPT_NOT_READABLE, &[&script_name]);
            error!(error = %err, "{message}");
            return -1;
        }
    };

    let started = catalog::get_message(codes::SCRIPT_STARTED, &[&script_name]);
    info!("{started}");
    let status = match execute_source(bridge, &source) {
        Ok(status) => status,
        Err(err) => {
            let message = catalog::get_message(codes::SCRIPT_FAILED, &[&script_name]);
            error!(error = %crate::errors::error_chain(&err), "{message}");
            if let Some(log) = bridge.session().session_log() {
                log.note_error(&format!("Script {script_name}"), &err);
            }
            -1
        }
    };

    let status_text = status.to_string();
    let exited = catalog::get_message(
        codes::SCRIPT_EXITED,
        &[script_name.as_str(), status_text.as_str()],
    );
    info!("{exited}");
    status
}

/// Execute script text statement by statement.
pub fn execute_source(bridge: &JobBridge, source: &str) -> Result<i32, ScriptError> {
    for (index, text) in source.lines().enumerate() {
        let Some(statement) = parse_line(index + 1, text)? else {
            continue;
        };
        if let Flow::Exit(status) = execute(bridge, &statement)? {
            return Ok(status);
        }
    }
    Ok(0)
}

fn execute(bridge: &JobBridge, statement: &Statement) -> Result<Flow, ScriptError> {
    let Statement { line, name, args } = statement;
    let line = *line;
    let bridged = |source: BridgeError| ScriptError::Bridge { line, source };
    let arity = |expected: &'static str| ScriptError::Arity {
        line,
        name: name.clone(),
        expected,
        got: args.len(),
    };

    match (name.as_str(), args.as_slice()) {
        ("OpenProject", [project]) => bridge.open_project(project, None).map_err(bridged)?,
        ("OpenProject", [project, directory]) => bridge
            .open_project(project, Some(PathBuf::from(directory)))
            .map_err(bridged)?,
        ("OpenProject", _) => return Err(arity("1 or 2")),

        ("SetTimeWindow", [start, end]) => bridge.set_time_window(start, end).map_err(bridged)?,
        ("SetTimeWindow", _) => return Err(arity("2")),

        ("CreateRun", [target]) => bridge.create(JobKind::Run, target).map_err(bridged)?,
        ("CreateTrial", [target]) => bridge.create(JobKind::Trial, target).map_err(bridged)?,
        ("CreateForecast", [target]) => {
            bridge.create(JobKind::Forecast, target).map_err(bridged)?
        }
        ("CreateRun" | "CreateTrial" | "CreateForecast", _) => return Err(arity("1")),

        ("ComputeRun", [run]) => {
            bridge.compute_run(run).map_err(bridged)?;
        }
        ("ComputeTrial", [trial]) => {
            bridge.compute_trial(trial).map_err(bridged)?;
        }
        ("ComputeForecast", [forecast]) => {
            bridge.compute_forecast(forecast).map_err(bridged)?;
        }
        ("Compute", [run]) => {
            bridge.compute_deprecated(run).map_err(bridged)?;
        }
        ("ComputeRun" | "ComputeTrial" | "ComputeForecast" | "Compute", _) => {
            return Err(arity("1"));
        }

        ("SelectTrial", [trial]) => bridge.select_trial(trial).map_err(bridged)?,
        ("SelectTrial", _) => return Err(arity("1")),

        ("Exit", []) => return Ok(Flow::Exit(0)),
        ("Exit", [value]) => {
            let status = value.trim().parse().map_err(|_| ScriptError::ExitStatus {
                line,
                value: value.clone(),
            })?;
            return Ok(Flow::Exit(status));
        }
        ("Exit", _) => return Err(arity("0 or 1")),

        _ => {
            return Err(ScriptError::UnknownFunction {
                line,
                name: name.clone(),
            });
        }
    }

    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_and_bare_arguments() {
        let stmt = parse_line(3, r#"SetTimeWindow("01Jan2024, 00:00", end-token)"#)
            .expect("parse")
            .expect("statement");
        assert_eq!(stmt.line, 3);
        assert_eq!(stmt.name, "SetTimeWindow");
        assert_eq!(stmt.args, vec!["01Jan2024, 00:00", "end-token"]);
    }

    #[test]
    fn escapes_inside_quotes_are_resolved() {
        let stmt = parse_line(1, r#"OpenProject("a \"b\" c")"#)
            .expect("parse")
            .expect("statement");
        assert_eq!(stmt.args, vec![r#"a "b" c"#]);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        assert_eq!(parse_line(1, "   ").expect("parse"), None);
        assert_eq!(parse_line(2, "# OpenProject(\"x\")").expect("parse"), None);
    }

    #[test]
    fn empty_argument_list() {
        let stmt = parse_line(1, "Exit()").expect("parse").expect("statement");
        assert!(stmt.args.is_empty());
    }

    #[test]
    fn garbage_is_a_syntax_error() {
        assert!(matches!(
            parse_line(7, "ComputeRun \"Run 1\""),
            Err(ScriptError::Syntax { line: 7, .. })
        ));
        assert!(matches!(
            parse_line(8, r#"ComputeRun("unterminated)"#),
            Err(ScriptError::Syntax { line: 8, .. })
        ));
    }
}
