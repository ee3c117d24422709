//! Single-writer SQL executor.
//!
//! Every committed query on a node goes through [`SqlExecutor::execute`]. The
//! executor holds the engine and the sequence counter under one lock, so the
//! k-th call on any node observes sequence number k no matter how it raced
//! with other callers.

use parking_lot::Mutex;
use tracing::error;

use super::engine::{ExitStatus, SqlEngine};

/// Outcome of one committed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Count of queries executed on this node, including this one.
    pub sequence_number: u64,
    /// Engine output, or the engine's error text when the statement was rejected.
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(thiserror::Error, Debug)]
pub enum ExecutorError {
    /// The engine failed in a way that leaves the database of unknown integrity.
    #[error("SQL engine fault at sequence number {sequence_number}: {reason}")]
    Fatal { sequence_number: u64, reason: String },
}

struct ExecutorState {
    engine: Box<dyn SqlEngine>,
    sequence_number: u64,
}

pub struct SqlExecutor {
    state: Mutex<ExecutorState>,
}

impl SqlExecutor {
    pub fn new(engine: Box<dyn SqlEngine>) -> Self {
        Self {
            state: Mutex::new(ExecutorState {
                engine,
                sequence_number: 0,
            }),
        }
    }

    /// Run `query` and advance the sequence number.
    ///
    /// A rejected statement is still a committed result: its error text becomes
    /// the output so every replica reports the same thing.
    pub fn execute(&self, query: &str) -> Result<ExecutionResult, ExecutorError> {
        let mut state = self.state.lock();
        let output = state.engine.run(query);
        state.sequence_number += 1;
        let sequence_number = state.sequence_number;

        match output.status {
            ExitStatus::Success => Ok(ExecutionResult {
                sequence_number,
                stdout: output.stdout,
                stderr: Vec::new(),
            }),
            ExitStatus::StatementError(_) => Ok(ExecutionResult {
                sequence_number,
                stdout: output.stderr,
                stderr: Vec::new(),
            }),
            ExitStatus::Fault(reason) => {
                error!(
                    sequence_number,
                    engine = state.engine.name(),
                    "SQL engine fault: {}",
                    reason
                );
                Err(ExecutorError::Fatal {
                    sequence_number,
                    reason,
                })
            }
        }
    }

    pub fn sequence_number(&self) -> u64 {
        self.state.lock().sequence_number
    }

    pub fn engine_name(&self) -> &'static str {
        self.state.lock().engine.name()
    }
}
