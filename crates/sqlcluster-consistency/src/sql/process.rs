// sqlite3 subprocess engine
// Each query spawns `sqlite3 <path>` and feeds the statement on stdin

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use super::engine::{EngineOutput, ExitStatus, SqlEngine};

const DEFAULT_BINARY: &str = "sqlite3";

pub struct ProcessEngine {
    binary: PathBuf,
    path: PathBuf,
}

impl ProcessEngine {
    pub fn new(path: &Path) -> Self {
        Self::with_binary(DEFAULT_BINARY, path)
    }

    pub fn with_binary(binary: impl Into<PathBuf>, path: &Path) -> Self {
        Self {
            binary: binary.into(),
            path: path.to_path_buf(),
        }
    }
}

impl SqlEngine for ProcessEngine {
    fn run(&mut self, script: &str) -> EngineOutput {
        let mut child = match Command::new(&self.binary)
            .arg(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return EngineOutput::fault(format!(
                    "failed to spawn {}: {}",
                    self.binary.display(),
                    e
                ));
            }
        };

        // The shell only runs a statement once it sees the terminator.
        let input = format!("{};", script);
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || {
                // A broken pipe here means the child exited early; its status tells the story.
                let _ = stdin.write_all(input.as_bytes());
            })
        });

        let output = match child.wait_with_output() {
            Ok(output) => output,
            Err(e) => return EngineOutput::fault(format!("failed to wait for engine: {}", e)),
        };
        if let Some(writer) = writer {
            let _ = writer.join();
        }

        let status = match output.status.code() {
            Some(0) => ExitStatus::Success,
            Some(code @ (1 | 2)) => ExitStatus::StatementError(code),
            Some(code) => ExitStatus::Fault(format!("engine exited with status {}", code)),
            None => ExitStatus::Fault("engine terminated by signal".to_string()),
        };
        EngineOutput {
            status,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }

    fn name(&self) -> &'static str {
        "process"
    }
}
