//! sqlcluster consistency - the replicated command path
//!
//! This crate provides:
//! - The deterministic SQL executor and its engines
//! - The replicated command type and its apply rule
//! - The openraft integration: log store, state machine, HTTP network, node
//! - The `Consensus` trait that dispatch and membership are written against

#![allow(clippy::result_large_err)]

pub mod consensus;
pub mod raft;
pub mod sql;

pub use consensus::Consensus;
pub use raft::config::RaftConfig;
pub use raft::node::RaftNode;
pub use raft::request::{ClusterRequest, ClusterResponse, QUERY_COMMAND_NAME};
pub use raft::types::{Member, NodeId, TypeConfig, calculate_node_id};
pub use sql::{EngineKind, ExecutionResult, ExecutorError, SqlExecutor};
