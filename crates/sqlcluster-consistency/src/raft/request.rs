// Replicated commands and their results
// A command is only ever interpreted by the state machine, after it is committed

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sql::{ExecutionResult, ExecutorError, SqlExecutor};

/// Tag identifying a SQL query command in the log.
pub const QUERY_COMMAND_NAME: &str = "sql.query";

/// All operations that go through Raft consensus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum ClusterRequest {
    /// Execute a SQL script against every replica's database.
    #[serde(rename = "sql.query")]
    Query { query: String },
}

impl ClusterRequest {
    pub fn query(query: impl Into<String>) -> Self {
        ClusterRequest::Query {
            query: query.into(),
        }
    }

    pub fn op_type(&self) -> &'static str {
        match self {
            ClusterRequest::Query { .. } => QUERY_COMMAND_NAME,
        }
    }

    /// Apply a committed command on this node.
    ///
    /// Only called by the state machine, once per log entry, in log order.
    pub fn apply(&self, executor: &SqlExecutor) -> Result<ClusterResponse, ExecutorError> {
        match self {
            ClusterRequest::Query { query } => {
                let result = executor.execute(query)?;
                Ok(ClusterResponse::new(format_payload(&result)))
            }
        }
    }
}

impl fmt::Display for ClusterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterRequest::Query { query } => write!(f, "{}({} bytes)", self.op_type(), query.len()),
        }
    }
}

/// Result of applying one committed entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterResponse {
    pub payload: Vec<u8>,
}

impl ClusterResponse {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    /// Response for entries that carry no command (blank and membership entries).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Client-visible body for an executed query.
pub fn format_payload(result: &ExecutionResult) -> Vec<u8> {
    let mut payload = format!("SequenceNumber: {}\n", result.sequence_number).into_bytes();
    payload.extend_from_slice(&result.stdout);
    payload
}
