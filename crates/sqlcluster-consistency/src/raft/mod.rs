// Raft consensus for the replicated SQL log
// Built on openraft with a RocksDB log, an in-memory applied state and an HTTP transport

pub mod config;
pub mod log_store;
pub mod network;
pub mod node;
pub mod request;
pub mod state_machine;
pub mod types;

pub use config::RaftConfig;
pub use log_store::RocksLogStore;
pub use network::{NetworkFactory, RAFT_APPEND_PATH, RAFT_SNAPSHOT_PATH, RAFT_VOTE_PATH};
pub use node::RaftNode;
pub use request::{ClusterRequest, ClusterResponse};
pub use state_machine::SqlStateMachine;
pub use types::*;
