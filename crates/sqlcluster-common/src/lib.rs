//! sqlcluster common - shared types used across the cluster crates
//!
//! This crate provides:
//! - `ClusterError`, the error taxonomy for dispatch, membership and execution
//! - The membership and role model exchanged between nodes
//! - Durable node identity (the `name` file)

pub mod error;
pub mod identity;
pub mod model;

// Re-exports for convenience
pub use error::{ClusterError, ClusterResult};
pub use identity::NodeIdentity;
pub use model::{JoinRequest, JoinResponse, MembershipEntry, NodeRole};
