//! Error types for sqlcluster
//!
//! `ClusterError` covers every failure the dispatch, membership and execution
//! paths can surface. Callers decide retry policy with [`ClusterError::is_transient`].

use crate::model::NodeRole;

/// Result type for cluster operations.
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Errors that can occur in cluster operations.
#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    /// Protocol or configuration fault, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Peer unreachable or the connection failed mid-request.
    #[error("network error: {0}")]
    Network(String),

    /// A peer answered with a non-success status.
    #[error("remote node returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// This node stopped being leader while handling the request.
    #[error("not the leader, this is a {role}")]
    NotLeader {
        role: NodeRole,
        /// Address of the leader if consensus knows it.
        leader: Option<String>,
    },

    /// Forwarding ran out of candidates to try.
    #[error("Only the primary can service queries, but this is a {role}")]
    NoLeader { role: NodeRole },

    #[error("timed out: {0}")]
    Timeout(String),

    /// The operation cannot run right now but may succeed if retried.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Local state is of unknown integrity; the node must stop serving.
    #[error("fatal local fault: {0}")]
    Fatal(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Malformed request payload.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request contradicts existing cluster state (e.g. a duplicate member name).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClusterError {
    /// Whether the failure may clear up on its own and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ClusterError::Network(_) | ClusterError::Timeout(_) | ClusterError::Unavailable(_) => {
                true
            }
            ClusterError::Remote { status, .. } => *status == 503,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(e: serde_json::Error) -> Self {
        ClusterError::Serialization(e.to_string())
    }
}
