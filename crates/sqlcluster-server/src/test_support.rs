// In-memory consensus for handler and service tests

use std::sync::Arc;

use parking_lot::Mutex;
use sqlcluster_common::{ClusterError, ClusterResult, MembershipEntry, NodeRole};
use sqlcluster_consistency::sql::EmbeddedEngine;
use sqlcluster_consistency::{ClusterRequest, ClusterResponse, Consensus, SqlExecutor};
use tempfile::TempDir;

struct FakeState {
    role: NodeRole,
    leader: Option<MembershipEntry>,
    members: Vec<MembershipEntry>,
    log_empty: bool,
}

/// Applies commands straight to a local executor, with no replication.
pub struct FakeConsensus {
    local: MembershipEntry,
    state: Mutex<FakeState>,
    executor: SqlExecutor,
    _dir: TempDir,
}

impl FakeConsensus {
    pub fn new(name: &str, address: &str) -> Arc<Self> {
        let dir = tempfile::tempdir().unwrap();
        let engine = EmbeddedEngine::open(&dir.path().join("storage.sql")).unwrap();
        Arc::new(Self {
            local: MembershipEntry::new(name, address),
            state: Mutex::new(FakeState {
                role: NodeRole::Follower,
                leader: None,
                members: Vec::new(),
                log_empty: true,
            }),
            executor: SqlExecutor::new(Box::new(engine)),
            _dir: dir,
        })
    }

    /// A bootstrapped single member cluster.
    pub fn leader(name: &str, address: &str) -> Arc<Self> {
        let fake = Self::new(name, address);
        fake.make_leader();
        fake
    }

    pub fn make_leader(&self) {
        let mut state = self.state.lock();
        state.role = NodeRole::Leader;
        state.leader = Some(self.local.clone());
        state.log_empty = false;
        if !state.members.contains(&self.local) {
            state.members.push(self.local.clone());
            state.members.sort();
        }
    }

    pub fn set_follower(&self, leader: Option<MembershipEntry>, members: Vec<MembershipEntry>) {
        let mut state = self.state.lock();
        state.role = NodeRole::Follower;
        state.leader = leader;
        state.members = members;
        state.members.sort();
    }

    pub fn set_log_empty(&self, empty: bool) {
        self.state.lock().log_empty = empty;
    }

    pub fn executed(&self) -> u64 {
        self.executor.sequence_number()
    }
}

#[async_trait::async_trait]
impl Consensus for FakeConsensus {
    fn local(&self) -> MembershipEntry {
        self.local.clone()
    }

    fn role(&self) -> NodeRole {
        self.state.lock().role
    }

    fn leader(&self) -> Option<MembershipEntry> {
        self.state.lock().leader.clone()
    }

    fn members(&self) -> Vec<MembershipEntry> {
        self.state.lock().members.clone()
    }

    fn is_log_empty(&self) -> bool {
        self.state.lock().log_empty
    }

    async fn submit(&self, request: ClusterRequest) -> ClusterResult<ClusterResponse> {
        let (role, leader) = {
            let state = self.state.lock();
            (state.role, state.leader.clone())
        };
        if !role.is_leader() {
            return Err(ClusterError::NotLeader {
                role,
                leader: leader.map(|l| l.address),
            });
        }
        request
            .apply(&self.executor)
            .map_err(|e| ClusterError::Fatal(e.to_string()))
    }

    async fn bootstrap(&self) -> ClusterResult<()> {
        self.make_leader();
        Ok(())
    }

    async fn add_member(&self, entry: MembershipEntry) -> ClusterResult<()> {
        let mut state = self.state.lock();
        if !state.role.is_leader() {
            return Err(ClusterError::NotLeader {
                role: state.role,
                leader: state.leader.as_ref().map(|l| l.address.clone()),
            });
        }
        if let Some(existing) = state.members.iter().find(|m| m.name == entry.name) {
            if existing.address == entry.address {
                return Ok(());
            }
            return Err(ClusterError::Conflict(format!(
                "{} is already a member at {}",
                existing.name, existing.address
            )));
        }
        state.members.push(entry);
        state.members.sort();
        Ok(())
    }
}
