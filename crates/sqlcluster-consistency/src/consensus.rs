// Consensus seam
// Dispatch and membership only see this trait, never openraft directly

use sqlcluster_common::{ClusterResult, MembershipEntry, NodeRole};

use crate::raft::request::{ClusterRequest, ClusterResponse};

#[async_trait::async_trait]
pub trait Consensus: Send + Sync {
    /// This node's own membership entry.
    fn local(&self) -> MembershipEntry;

    /// Current role, read fresh on every call.
    fn role(&self) -> NodeRole;

    /// The leader as far as this node knows.
    fn leader(&self) -> Option<MembershipEntry>;

    /// Every member of the current membership config, ordered by name.
    fn members(&self) -> Vec<MembershipEntry>;

    /// Whether this node has never stored a log entry.
    fn is_log_empty(&self) -> bool;

    /// Replicate a command and wait until it is applied locally.
    ///
    /// Fails with `NotLeader` on a node that cannot accept writes.
    async fn submit(&self, request: ClusterRequest) -> ClusterResult<ClusterResponse>;

    /// Start a single-member cluster containing only this node.
    async fn bootstrap(&self) -> ClusterResult<()>;

    /// Admit a member as a voter. Leader only.
    ///
    /// Admitting a name that is already a member with the same address succeeds
    /// without a change; the same name with another address is a `Conflict`.
    async fn add_member(&self, entry: MembershipEntry) -> ClusterResult<()>;
}
