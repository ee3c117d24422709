// Cluster membership and role model
// These types cross the wire between nodes, so field names are part of the protocol

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of the local node as reported by consensus.
///
/// Never cached: every dispatch decision re-reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Leader,
    Follower,
    Candidate,
}

impl NodeRole {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::Leader => "leader",
            NodeRole::Follower => "follower",
            NodeRole::Candidate => "candidate",
        }
    }

    pub fn is_leader(self) -> bool {
        self == NodeRole::Leader
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member of the cluster: unique name plus the address its HTTP endpoint listens on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MembershipEntry {
    pub name: String,
    pub address: String,
}

impl MembershipEntry {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for MembershipEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.address)
    }
}

/// Admission request sent by a joining node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub name: String,
    pub address: String,
}

impl JoinRequest {
    /// Reject payloads that decode but cannot name a member.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("member name must not be empty".to_string());
        }
        if self.address.trim().is_empty() {
            return Err("member address must not be empty".to_string());
        }
        Ok(())
    }

    pub fn entry(&self) -> MembershipEntry {
        MembershipEntry::new(self.name.clone(), self.address.clone())
    }
}

impl From<&MembershipEntry> for JoinRequest {
    fn from(entry: &MembershipEntry) -> Self {
        Self {
            name: entry.name.clone(),
            address: entry.address.clone(),
        }
    }
}

/// Answer to a successful admission: the admitting node's name and every member address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    #[serde(rename = "self")]
    pub self_name: String,
    pub members: Vec<String>,
}
