//! SQL engine abstraction.
//!
//! An engine runs one script against the node's database file and reports
//! how it ended. The executor turns that report into a committed result or a
//! fatal fault; engines never decide policy themselves.

use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use super::embedded::EmbeddedEngine;
use super::process::ProcessEngine;

/// How an engine run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// The engine rejected the statement itself (syntax, constraint, missing table).
    /// The failure is a deterministic function of the script and the database.
    StatementError(i32),
    /// Anything else: spawn failure, I/O fault, crash, corrupted database.
    Fault(String),
}

/// Everything an engine produced for one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl EngineOutput {
    pub fn fault(reason: impl Into<String>) -> Self {
        Self {
            status: ExitStatus::Fault(reason.into()),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }
}

pub trait SqlEngine: Send {
    /// Run a script to completion. Must not retain state between calls beyond the database file.
    fn run(&mut self, script: &str) -> EngineOutput;

    fn name(&self) -> &'static str;
}

/// Which engine backs the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    /// In-process SQLite via rusqlite.
    #[default]
    Embedded,
    /// The `sqlite3` command-line shell, one process per query.
    Process,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Embedded => "embedded",
            EngineKind::Process => "process",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedded" | "rusqlite" => Ok(EngineKind::Embedded),
            "process" | "sqlite3" => Ok(EngineKind::Process),
            other => Err(format!("unknown SQL engine '{}'", other)),
        }
    }
}

/// Open the engine of `kind` over the database file at `path`.
pub fn open_engine(kind: EngineKind, path: &Path) -> io::Result<Box<dyn SqlEngine>> {
    match kind {
        EngineKind::Embedded => {
            let engine = EmbeddedEngine::open(path).map_err(io::Error::other)?;
            Ok(Box::new(engine))
        }
        EngineKind::Process => Ok(Box::new(ProcessEngine::new(path))),
    }
}

/// Remove the database file if present.
///
/// Every start replays the full log from index 1, so a database left behind by
/// a previous run would apply each statement twice.
pub fn ensure_absent(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!("Removed stale database file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
