// Raft type configuration for openraft
// The cluster identifies members by name; the numeric raft id is derived from it

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlcluster_common::MembershipEntry;

use super::request::{ClusterRequest, ClusterResponse};

pub type NodeId = u64;

/// Node payload carried in every membership config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub addr: String,
}

impl Member {
    pub fn new(name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
        }
    }

    pub fn id(&self) -> NodeId {
        calculate_node_id(&self.name)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.addr)
    }
}

impl From<&Member> for MembershipEntry {
    fn from(member: &Member) -> Self {
        MembershipEntry::new(member.name.clone(), member.addr.clone())
    }
}

impl From<&MembershipEntry> for Member {
    fn from(entry: &MembershipEntry) -> Self {
        Member::new(entry.name.clone(), entry.address.clone())
    }
}

openraft::declare_raft_types!(
    pub TypeConfig:
        D = ClusterRequest,
        R = ClusterResponse,
        Node = Member,
        NodeId = NodeId,
);

pub type Raft = openraft::Raft<TypeConfig>;

pub type Entry = openraft::Entry<TypeConfig>;

pub type LogId = openraft::LogId<NodeId>;

pub type Vote = openraft::Vote<NodeId>;

pub type StoredMembership = openraft::StoredMembership<NodeId, Member>;

pub type SnapshotMeta = openraft::SnapshotMeta<NodeId, Member>;

pub type RaftMetrics = openraft::RaftMetrics<NodeId, Member>;

pub type ServerState = openraft::ServerState;

/// Raft node id for a member name.
///
/// Must be identical on every node and across restarts, so it uses a fixed
/// digest rather than the std hasher.
pub fn calculate_node_id(name: &str) -> NodeId {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}
