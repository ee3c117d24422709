//! Node assembly: identity, SQL engine, consensus and the services on top.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use sqlcluster_common::{ClusterError, ClusterResult, NodeIdentity};
use sqlcluster_consistency::sql::{ensure_absent, open_engine};
use sqlcluster_consistency::{Consensus, Member, RaftNode, SqlExecutor};
use tracing::info;

use crate::model::common::AppState;
use crate::model::config::Configuration;
use crate::service::client::PeerClient;
use crate::service::dispatch::Dispatcher;
use crate::service::membership::{MembershipManager, StartOutcome};

pub struct NodeContext {
    pub identity: NodeIdentity,
    pub executor: Arc<SqlExecutor>,
    pub raft: Arc<RaftNode>,
    pub state: Arc<AppState>,
}

pub async fn build_node(configuration: &Configuration) -> anyhow::Result<NodeContext> {
    let data_dir = configuration.data_dir();
    let identity = NodeIdentity::load_or_create(&data_dir)
        .with_context(|| format!("loading node name from {}", data_dir.display()))?;
    info!(
        "Node name {} (from {})",
        identity.name(),
        identity.path().display()
    );

    // The log is replayed from the start, so the database must start empty.
    let sql_path = configuration.sql_path();
    ensure_absent(&sql_path)
        .with_context(|| format!("removing {}", sql_path.display()))?;

    let kind = configuration.sql_engine()?;
    let engine = open_engine(kind, &sql_path)
        .with_context(|| format!("opening {} engine on {}", kind, sql_path.display()))?;
    let executor = Arc::new(SqlExecutor::new(engine));

    let member = Member::new(identity.name(), configuration.advertise_address());
    let raft = Arc::new(
        RaftNode::new(member.clone(), &configuration.raft_config(), executor.clone()).await?,
    );
    info!(
        "Started node {} as raft id {} with {} engine",
        member,
        raft.node_id(),
        executor.engine_name()
    );

    let consensus: Arc<dyn Consensus> = raft.clone();
    let client = PeerClient::new()?;
    let dispatcher = Dispatcher::new(
        consensus.clone(),
        client.clone(),
        configuration.dispatch_settings(),
    );
    let membership = MembershipManager::new(
        consensus.clone(),
        client,
        configuration.membership_settings(),
    );

    Ok(NodeContext {
        identity,
        executor,
        raft,
        state: Arc::new(AppState {
            consensus,
            dispatcher,
            membership,
        }),
    })
}

/// Result of bringing a node into its cluster.
#[derive(Debug)]
pub enum Startup {
    Ready(StartOutcome),
    Failed(ClusterError),
    Interrupted,
}

/// Drive membership start until it finishes, the raft core dies or a shutdown is requested.
///
/// A joiner replays the leader's log while its join is pending, so a fault
/// during that replay must end startup instead of leaving the join retrying.
pub async fn await_startup<S, F, I>(start: S, fatal: F, interrupt: I) -> Startup
where
    S: Future<Output = ClusterResult<StartOutcome>>,
    F: Future<Output = ClusterError>,
    I: Future<Output = ()>,
{
    tokio::select! {
        result = start => match result {
            Ok(outcome) => Startup::Ready(outcome),
            Err(e) => Startup::Failed(e),
        },
        fatal = fatal => Startup::Failed(fatal),
        _ = interrupt => Startup::Interrupted,
    }
}

#[cfg(test)]
mod tests {
    use std::future::pending;
    use std::time::Duration;

    use super::*;
    use crate::service::membership::MembershipSettings;
    use crate::test_support::FakeConsensus;

    #[tokio::test]
    async fn test_fatal_error_ends_a_pending_join() {
        let fake = FakeConsensus::new("b", "127.0.0.1:2");
        fake.set_log_empty(true);
        let membership = MembershipManager::new(
            fake,
            PeerClient::new().unwrap(),
            MembershipSettings {
                retry_interval: Duration::from_millis(20),
                max_attempts: 0,
                join_timeout: Duration::from_millis(200),
            },
        );

        let fatal = async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            ClusterError::Fatal("SQL engine fault at sequence number 2".to_string())
        };
        let startup = tokio::time::timeout(
            Duration::from_secs(5),
            await_startup(membership.start(Some("127.0.0.1:1")), fatal, pending()),
        )
        .await
        .unwrap();

        assert!(matches!(startup, Startup::Failed(ClusterError::Fatal(_))), "{startup:?}");
    }

    #[tokio::test]
    async fn test_finished_start_is_ready() {
        let startup = await_startup(
            async { Ok(StartOutcome::Bootstrapped) },
            pending::<ClusterError>(),
            pending(),
        )
        .await;
        assert!(matches!(startup, Startup::Ready(StartOutcome::Bootstrapped)));
    }

    #[tokio::test]
    async fn test_failed_start_is_reported() {
        let startup = await_startup(
            async { Err(ClusterError::Config("existing log".to_string())) },
            pending::<ClusterError>(),
            pending(),
        )
        .await;
        assert!(matches!(startup, Startup::Failed(ClusterError::Config(_))));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_start() {
        let startup = await_startup(
            pending::<ClusterResult<StartOutcome>>(),
            pending::<ClusterError>(),
            async {},
        )
        .await;
        assert!(matches!(startup, Startup::Interrupted));
    }
}
