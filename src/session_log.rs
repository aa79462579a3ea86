// src/session_log.rs

//! Optional session log that mirrors server console output into a file.
//!
//! The log is a cheap, cloneable handle around a shared file slot:
//!
//! - [`logging::init_logging`](crate::logging::init_logging) tees the
//!   `tracing` output into it via [`MakeWriter`], so everything the server
//!   prints also lands in the file.
//! - The router writes request/response transcripts and fault chains with
//!   [`SessionLog::note`] / [`SessionLog::note_error`] (file only).
//! - [`SessionLog::close`] flushes and releases the file; afterwards all
//!   writers silently become no-ops and console output is no longer
//!   duplicated.

use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;

type Slot = Arc<Mutex<Option<LineWriter<File>>>>;

#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
    file: Slot,
}

impl SessionLog {
    /// Open (creating if absent) `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let log = Self {
            path,
            file: Arc::new(Mutex::new(Some(LineWriter::new(file)))),
        };
        log.note("Created server log");
        Ok(log)
    }

    /// Open the configured log, if any.
    ///
    /// Failures are reported on stderr (logging is not initialised yet at
    /// this point) and leave the session without a log.
    pub fn from_config(path: Option<&Path>) -> Option<Self> {
        let path = path?;
        match Self::open(path) {
            Ok(log) => Some(log),
            Err(err) => {
                eprintln!("failed to create session log {}: {err}", path.display());
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.slot().is_some()
    }

    /// Append one line to the file only.
    pub fn note(&self, line: &str) {
        if let Some(file) = self.slot().as_mut() {
            let _ = writeln!(file, "{line}");
        }
    }

    /// Append an error and its cause chain to the file only.
    pub fn note_error(&self, context: &str, err: &(dyn std::error::Error + 'static)) {
        self.note(&format!("{context}: {}", crate::errors::error_chain(err)));
    }

    /// Flush and release the file. Idempotent.
    pub fn close(&self) -> io::Result<()> {
        match self.slot().take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<LineWriter<File>>> {
        // A panic while writing a log line leaves the file usable.
        self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Writer handed out to `tracing-subscriber` for each event.
#[derive(Debug)]
pub struct SessionLogWriter {
    file: Slot,
}

impl Write for SessionLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut slot = self.file.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(file) = slot.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut slot = self.file.lock().unwrap_or_else(|p| p.into_inner());
        match slot.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SessionLog {
    type Writer = SessionLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SessionLogWriter {
            file: Arc::clone(&self.file),
        }
    }
}
