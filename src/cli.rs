// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, ValueEnum};

/// Command-line arguments for `hms-server`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hms-server",
    version,
    about = "Remote command server and script runner for the hydrologic modeling engine.",
    long_about = None
)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["command_server", "script", "info"])
))]
pub struct CliArgs {
    /// Serve remote command requests until killed.
    #[arg(long)]
    pub command_server: bool,

    /// Registry port for `--command-server`.
    ///
    /// Overrides `[server] port` from the config file (default 1099).
    #[arg(long, value_name = "N", allow_negative_numbers = true, requires = "command_server")]
    pub port: Option<i64>,

    /// Run a command script once and exit with its status.
    #[arg(short, long, value_name = "PATH")]
    pub script: Option<PathBuf>,

    /// Path to the config file (TOML). Optional.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HMS_SERVER_LOG_LEVEL` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print version information and exit.
    #[arg(long)]
    pub info: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// What the process was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    CommandServer { port: Option<i64> },
    Script(PathBuf),
    Info,
}

impl CliArgs {
    pub fn mode(&self) -> Mode {
        if self.info {
            Mode::Info
        } else if let Some(path) = &self.script {
            Mode::Script(path.clone())
        } else {
            Mode::CommandServer { port: self.port }
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_server_with_port() {
        let args = CliArgs::try_parse_from(["hms-server", "--command-server", "--port", "4100"])
            .expect("valid args");
        assert_eq!(args.mode(), Mode::CommandServer { port: Some(4100) });
    }

    #[test]
    fn negative_port_reaches_bootstrap() {
        let args = CliArgs::try_parse_from(["hms-server", "--command-server", "--port", "-1"])
            .expect("valid args");
        assert_eq!(args.mode(), Mode::CommandServer { port: Some(-1) });
    }

    #[test]
    fn script_mode() {
        let args = CliArgs::try_parse_from(["hms-server", "-s", "run.script"]).expect("valid args");
        assert_eq!(args.mode(), Mode::Script(PathBuf::from("run.script")));
    }

    #[test]
    fn a_mode_is_required() {
        assert!(CliArgs::try_parse_from(["hms-server"]).is_err());
        assert!(CliArgs::try_parse_from(["hms-server", "--command-server", "-s", "x"]).is_err());
    }
}
