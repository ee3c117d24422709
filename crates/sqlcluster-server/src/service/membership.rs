// Membership manager
// Decides at startup whether this node joins, bootstraps or recovers, and admits joiners on the leader

use std::sync::Arc;
use std::time::Duration;

use sqlcluster_common::{ClusterError, ClusterResult, JoinRequest, JoinResponse, MembershipEntry};
use sqlcluster_consistency::Consensus;
use tracing::{info, warn};

use crate::api::route::JOIN_PATH;
use crate::service::client::PeerClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipSettings {
    pub retry_interval: Duration,
    /// Zero retries forever.
    pub max_attempts: u32,
    pub join_timeout: Duration,
}

impl Default for MembershipSettings {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(1),
            max_attempts: 0,
            join_timeout: Duration::from_secs(30),
        }
    }
}

/// How the node came to be part of a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Joined(JoinResponse),
    Bootstrapped,
    Recovered,
}

pub struct MembershipManager {
    consensus: Arc<dyn Consensus>,
    client: PeerClient,
    settings: MembershipSettings,
}

impl MembershipManager {
    pub fn new(
        consensus: Arc<dyn Consensus>,
        client: PeerClient,
        settings: MembershipSettings,
    ) -> Self {
        Self {
            consensus,
            client,
            settings,
        }
    }

    pub async fn start(&self, primary: Option<&str>) -> ClusterResult<StartOutcome> {
        let log_empty = self.consensus.is_log_empty();
        match (primary, log_empty) {
            (Some(_), false) => Err(ClusterError::Config(
                "Cannot join with an existing log".to_string(),
            )),
            (Some(primary), true) => self.join(primary).await.map(StartOutcome::Joined),
            (None, true) => {
                info!("Bootstrapping a new cluster as {}", self.consensus.local());
                self.consensus.bootstrap().await?;
                Ok(StartOutcome::Bootstrapped)
            }
            (None, false) => {
                info!("Recovered from log");
                Ok(StartOutcome::Recovered)
            }
        }
    }

    /// Ask `primary` to admit this node, retrying while the cluster is unavailable.
    pub async fn join(&self, primary: &str) -> ClusterResult<JoinResponse> {
        let request = JoinRequest::from(&self.consensus.local());
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            crate::metrics::record_join_attempt();
            info!("Joining cluster through {} (attempt {})", primary, attempts);

            match self
                .client
                .post_json::<_, JoinResponse>(primary, JOIN_PATH, &request, self.settings.join_timeout)
                .await
            {
                Ok(response) => {
                    info!(
                        "Joined cluster through {}: members {:?}",
                        response.self_name, response.members
                    );
                    return Ok(response);
                }
                Err(e) if e.is_transient() => {
                    if self.settings.max_attempts > 0 && attempts >= self.settings.max_attempts {
                        return Err(e);
                    }
                    warn!(
                        "Join through {} failed: {}; retrying in {:?}",
                        primary, e, self.settings.retry_interval
                    );
                    tokio::time::sleep(self.settings.retry_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Admit a joiner. Must run on the leader.
    pub async fn admit(&self, request: JoinRequest) -> ClusterResult<JoinResponse> {
        request.validate().map_err(ClusterError::InvalidRequest)?;
        let entry = request.entry();
        info!("Admitting {}", entry);
        self.consensus.add_member(entry).await?;
        Ok(self.join_response())
    }

    pub fn join_response(&self) -> JoinResponse {
        JoinResponse {
            self_name: self.consensus.local().name,
            members: self.members().into_iter().map(|m| m.address).collect(),
        }
    }

    pub fn members(&self) -> Vec<MembershipEntry> {
        let members = self.consensus.members();
        crate::metrics::set_cluster_members(members.len());
        members
    }
}
