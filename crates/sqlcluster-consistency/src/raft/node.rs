// RaftNode wrapper for managing Raft lifecycle
// Implements the Consensus seam on top of an openraft instance

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use openraft::ChangeMembers;
use openraft::error::{ChangeMembershipError, ClientWriteError, InitializeError, RaftError};
use sqlcluster_common::{ClusterError, ClusterResult, MembershipEntry, NodeRole};
use tracing::{debug, info, warn};

use super::config::RaftConfig;
use super::log_store::RocksLogStore;
use super::network::NetworkFactory;
use super::request::{ClusterRequest, ClusterResponse};
use super::state_machine::SqlStateMachine;
use super::types::{Member, NodeId, Raft, RaftMetrics, ServerState};
use crate::consensus::Consensus;
use crate::sql::SqlExecutor;

type WriteError = RaftError<NodeId, ClientWriteError<NodeId, Member>>;

pub struct RaftNode {
    node_id: NodeId,
    member: Member,
    raft: Raft,
    /// Whether the log held no entries when the node started.
    log_was_empty: bool,
}

impl RaftNode {
    pub async fn new(
        member: Member,
        config: &RaftConfig,
        executor: Arc<SqlExecutor>,
    ) -> ClusterResult<Self> {
        let node_id = member.id();
        info!(
            "Creating Raft node: id={}, member={}, data_dir={}",
            node_id,
            member,
            config.data_dir.display()
        );

        config.ensure_dirs()?;
        let raft_config = config
            .to_openraft_config()
            .map_err(|e| ClusterError::Config(e.to_string()))?;

        let log_store = RocksLogStore::open(config.log_dir())
            .await
            .map_err(|e| ClusterError::Storage(e.to_string()))?;
        let log_was_empty = log_store.last_log_id().await.is_none();

        let state_machine = SqlStateMachine::new(executor);
        let network = NetworkFactory::new(config.rpc_timeout())
            .map_err(|e| ClusterError::Config(format!("raft HTTP client: {}", e)))?;

        let raft = Raft::new(
            node_id,
            Arc::new(raft_config),
            network,
            log_store,
            state_machine,
        )
        .await
        .map_err(|e| ClusterError::Fatal(e.to_string()))?;

        info!(
            "Raft node created: id={}, log empty={}",
            node_id, log_was_empty
        );

        Ok(Self {
            node_id,
            member,
            raft,
            log_was_empty,
        })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn raft(&self) -> &Raft {
        &self.raft
    }

    pub fn metrics(&self) -> RaftMetrics {
        self.raft.metrics().borrow().clone()
    }

    /// Resolves once the raft core has stopped on a fatal error, such as a failed apply.
    pub async fn wait_for_fatal(&self) -> ClusterError {
        let mut rx = self.raft.metrics();
        loop {
            let running = rx.borrow().running_state.clone();
            if let Err(fatal) = running {
                return ClusterError::Fatal(fatal.to_string());
            }
            if rx.changed().await.is_err() {
                return ClusterError::Fatal("raft core stopped".to_string());
            }
        }
    }

    /// Poll until some leader is known or `timeout` passes.
    pub async fn wait_for_leader(&self, timeout: Duration) -> Option<NodeId> {
        let start = tokio::time::Instant::now();
        loop {
            if let Some(leader) = self.metrics().current_leader {
                return Some(leader);
            }
            if start.elapsed() > timeout {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn shutdown(&self) -> ClusterResult<()> {
        info!("Shutting down Raft node {}", self.node_id);
        self.raft
            .shutdown()
            .await
            .map_err(|e| ClusterError::Fatal(format!("raft shutdown: {}", e)))
    }

    fn write_error(&self, err: WriteError) -> ClusterError {
        match err {
            RaftError::APIError(ClientWriteError::ForwardToLeader(forward)) => {
                ClusterError::NotLeader {
                    role: self.role(),
                    leader: forward.leader_node.map(|node| node.addr),
                }
            }
            RaftError::APIError(ClientWriteError::ChangeMembershipError(
                ChangeMembershipError::InProgress(e),
            )) => ClusterError::Unavailable(e.to_string()),
            RaftError::APIError(ClientWriteError::ChangeMembershipError(e)) => {
                ClusterError::InvalidRequest(e.to_string())
            }
            RaftError::Fatal(fatal) => ClusterError::Fatal(fatal.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl Consensus for RaftNode {
    fn local(&self) -> MembershipEntry {
        MembershipEntry::from(&self.member)
    }

    fn role(&self) -> NodeRole {
        match self.raft.metrics().borrow().state {
            ServerState::Leader => NodeRole::Leader,
            ServerState::Candidate => NodeRole::Candidate,
            ServerState::Follower | ServerState::Learner | ServerState::Shutdown => {
                NodeRole::Follower
            }
        }
    }

    fn leader(&self) -> Option<MembershipEntry> {
        let metrics = self.metrics();
        let leader = metrics.current_leader?;
        metrics
            .membership_config
            .membership()
            .get_node(&leader)
            .map(MembershipEntry::from)
    }

    fn members(&self) -> Vec<MembershipEntry> {
        let metrics = self.metrics();
        let mut members: Vec<MembershipEntry> = metrics
            .membership_config
            .membership()
            .nodes()
            .map(|(_, node)| MembershipEntry::from(node))
            .collect();
        members.sort();
        members
    }

    fn is_log_empty(&self) -> bool {
        self.log_was_empty && self.metrics().last_log_index.is_none()
    }

    async fn submit(&self, request: ClusterRequest) -> ClusterResult<ClusterResponse> {
        debug!("Submitting {}", request);
        self.raft
            .client_write(request)
            .await
            .map(|resp| resp.data)
            .map_err(|e| self.write_error(e))
    }

    async fn bootstrap(&self) -> ClusterResult<()> {
        let mut nodes = BTreeMap::new();
        nodes.insert(self.node_id, self.member.clone());

        match self.raft.initialize(nodes).await {
            Ok(()) => {
                info!("Bootstrapped single-member cluster with {}", self.member);
                Ok(())
            }
            Err(RaftError::APIError(InitializeError::NotAllowed(e))) => {
                warn!("Cluster already initialized: {}", e);
                Ok(())
            }
            Err(RaftError::APIError(e)) => Err(ClusterError::Config(e.to_string())),
            Err(RaftError::Fatal(fatal)) => Err(ClusterError::Fatal(fatal.to_string())),
        }
    }

    async fn add_member(&self, entry: MembershipEntry) -> ClusterResult<()> {
        let member = Member::from(&entry);
        let id = member.id();

        let metrics = self.metrics();
        let membership = metrics.membership_config.membership();
        match membership.get_node(&id) {
            Some(existing) if existing.addr != member.addr => {
                return Err(ClusterError::Conflict(format!(
                    "member {} is already registered at {}",
                    entry.name, existing.addr
                )));
            }
            Some(_) if membership.voter_ids().any(|voter| voter == id) => {
                debug!("Member {} already admitted", entry);
                return Ok(());
            }
            Some(_) => {
                debug!("Member {} is a learner, promoting", entry);
            }
            None => {
                info!("Adding {} as learner", entry);
                self.raft
                    .add_learner(id, member, true)
                    .await
                    .map_err(|e| self.write_error(e))?;
            }
        }

        self.raft
            .change_membership(ChangeMembers::AddVoterIds(BTreeSet::from([id])), false)
            .await
            .map_err(|e| self.write_error(e))?;
        info!("Admitted {} as voter", entry);
        Ok(())
    }
}
