//! Integration tests for sqlcluster nodes
//!
//! Boots real raft nodes on temporary data directories and drives them over HTTP.

use std::net::TcpListener;
use std::time::Duration;

use actix_web::dev::ServerHandle;
use sqlcluster_common::{ClusterError, JoinRequest, JoinResponse, MembershipEntry, NodeRole};
use sqlcluster_consistency::Consensus;
use sqlcluster_server::model::config::{Cli, Configuration};
use sqlcluster_server::service::membership::StartOutcome;
use sqlcluster_server::startup::http::cluster_server;
use sqlcluster_server::startup::node::{NodeContext, build_node};
use tempfile::TempDir;

struct TestNode {
    addr: String,
    node: NodeContext,
    server: ServerHandle,
    dir: TempDir,
}

impl TestNode {
    async fn start() -> Self {
        Self::start_in(tempfile::tempdir().unwrap(), "127.0.0.1:0").await
    }

    /// Start on `dir`, which may hold a previous run's name and raft log.
    async fn start_in(dir: TempDir, listen: &str) -> Self {
        let listener = TcpListener::bind(listen).unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let configuration = Configuration::from_cli(Cli {
            directory: Some(dir.path().to_string_lossy().into_owned()),
            listen: Some(addr.clone()),
            ..Default::default()
        })
        .unwrap();

        // A stopped node's log store can take a moment to release its lock.
        let mut retries = 50;
        let node = loop {
            match build_node(&configuration).await {
                Ok(node) => break node,
                Err(e) if retries > 0 => {
                    retries -= 1;
                    eprintln!("build_node failed, retrying: {e:#}");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Err(e) => panic!("build_node failed: {e:#}"),
            }
        };
        let server = cluster_server(node.state.clone(), node.raft.clone(), listener).unwrap();
        let handle = server.handle();
        actix_rt::spawn(server);

        Self {
            addr,
            node,
            server: handle,
            dir,
        }
    }

    /// Stop serving; hands back the data directory and address for a restart.
    async fn stop(self) -> (TempDir, String) {
        self.server.stop(true).await;
        self.node.raft.shutdown().await.unwrap();
        drop(self.node);
        (self.dir, self.addr)
    }

    fn name(&self) -> &str {
        self.node.identity.name()
    }

    fn last_applied(&self) -> Option<u64> {
        self.node.raft.metrics().last_applied.map(|id| id.index)
    }

    fn sequence_number(&self) -> u64 {
        self.node.executor.sequence_number()
    }
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn post(client: &reqwest::Client, addr: &str, path: &str, body: &str) -> (u16, String) {
    let resp = client
        .post(format!("http://{}{}", addr, path))
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.text().await.unwrap())
}

async fn members(client: &reqwest::Client, addr: &str) -> Vec<MembershipEntry> {
    client
        .get(format!("http://{}/members", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

// ============================================================================
// Single node
// ============================================================================

#[actix_rt::test]
async fn test_bootstrap_and_replicated_queries() {
    let first = TestNode::start().await;
    let state = first.node.state.clone();
    let addr = first.addr.clone();

    let outcome = state.membership.start(None).await.unwrap();
    assert_eq!(outcome, StartOutcome::Bootstrapped);
    assert!(
        first
            .node
            .raft
            .wait_for_leader(Duration::from_secs(10))
            .await
            .is_some()
    );
    assert!(state.is_leader());

    let client = reqwest::Client::new();

    let (status, body) = post(&client, &addr, "/sql", "CREATE TABLE t (v INTEGER)").await;
    assert_eq!(status, 200);
    assert_eq!(body, "SequenceNumber: 1\n");

    let (_, body) = post(&client, &addr, "/sql", "INSERT INTO t VALUES (1)").await;
    assert_eq!(body, "SequenceNumber: 2\n");

    let (_, body) = post(&client, &addr, "/sql", "SELECT v FROM t").await;
    assert_eq!(body, "SequenceNumber: 3\n1\n");

    // Joining with an existing log is refused and leaves state untouched.
    let err = state.membership.start(Some(&addr)).await.unwrap_err();
    assert!(matches!(err, ClusterError::Config(_)), "{err}");

    let (_, body) = post(&client, &addr, "/sql/leader", "SELECT count(*) FROM t").await;
    assert_eq!(body, "SequenceNumber: 4\n1\n");

    for _ in 0..3 {
        let resp = client
            .get(format!("http://{}/healthcheck", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert!(resp.text().await.unwrap().is_empty());
    }

    assert_eq!(
        members(&client, &addr).await,
        vec![MembershipEntry::new(first.name(), addr.clone())]
    );

    // Re-admitting an existing member is a no-op; reusing its name elsewhere is not.
    let rejoin = JoinRequest {
        name: first.name().to_string(),
        address: addr.clone(),
    };
    let (status, body) = post(
        &client,
        &addr,
        "/join",
        &serde_json::to_string(&rejoin).unwrap(),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    let response: JoinResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.self_name, first.name());
    assert_eq!(response.members, vec![addr.clone()]);

    let clash = JoinRequest {
        name: first.name().to_string(),
        address: "127.0.0.1:1".to_string(),
    };
    let (status, _) = post(
        &client,
        &addr,
        "/join",
        &serde_json::to_string(&clash).unwrap(),
    )
    .await;
    assert_eq!(status, 409);

    first.stop().await;
}

// ============================================================================
// Two nodes
// ============================================================================

#[actix_rt::test]
async fn test_joined_node_replays_log_and_forwards() {
    let client = reqwest::Client::new();

    let first = TestNode::start().await;
    first.node.state.membership.start(None).await.unwrap();
    first
        .node
        .raft
        .wait_for_leader(Duration::from_secs(10))
        .await
        .unwrap();

    let (_, body) = post(&client, &first.addr, "/sql", "CREATE TABLE t (x)").await;
    assert_eq!(body, "SequenceNumber: 1\n");
    let (_, body) = post(&client, &first.addr, "/sql", "INSERT INTO t VALUES (1)").await;
    assert_eq!(body, "SequenceNumber: 2\n");

    let second = TestNode::start().await;
    let outcome = second
        .node
        .state
        .membership
        .start(Some(&first.addr))
        .await
        .unwrap();
    match outcome {
        StartOutcome::Joined(response) => {
            assert_eq!(response.self_name, first.name());
            assert_eq!(response.members.len(), 2);
            assert!(response.members.contains(&second.addr));
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let mut expected = vec![
        MembershipEntry::new(first.name(), first.addr.clone()),
        MembershipEntry::new(second.name(), second.addr.clone()),
    ];
    expected.sort();
    assert_eq!(members(&client, &first.addr).await, expected);

    // The joiner has replayed the log into its own database by the time it is a voter.
    wait_until("replay", || second.last_applied() >= first.last_applied()).await;
    assert_eq!(second.node.state.consensus.role(), NodeRole::Follower);
    assert_eq!(second.sequence_number(), 2);

    // A query sent to the follower is answered by the leader, then applied locally too.
    let (status, body) = post(&client, &second.addr, "/sql", "SELECT x FROM t").await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body, "SequenceNumber: 3\n1\n");
    assert_eq!(first.sequence_number(), 3);
    wait_until("follower apply", || second.sequence_number() == 3).await;

    let (status, _) = post(&client, &second.addr, "/sql/leader", "SELECT 1").await;
    assert_eq!(status, 503);
    assert_eq!(second.sequence_number(), 3);

    // Read the follower's own table directly, outside consensus, as the last step.
    let local = second.node.executor.execute("SELECT x FROM t").unwrap();
    assert_eq!(local.stdout, b"1\n");
    assert_eq!(local.sequence_number, 4);

    second.stop().await;
    first.stop().await;
}

// ============================================================================
// Restart
// ============================================================================

#[actix_rt::test]
async fn test_restart_rebuilds_database_from_log() {
    let client = reqwest::Client::new();

    let node = TestNode::start().await;
    let outcome = node.node.state.membership.start(None).await.unwrap();
    assert_eq!(outcome, StartOutcome::Bootstrapped);
    node.node
        .raft
        .wait_for_leader(Duration::from_secs(10))
        .await
        .unwrap();

    let (_, body) = post(&client, &node.addr, "/sql", "CREATE TABLE t (x)").await;
    assert_eq!(body, "SequenceNumber: 1\n");
    let (_, body) = post(&client, &node.addr, "/sql", "INSERT INTO t VALUES (1)").await;
    assert_eq!(body, "SequenceNumber: 2\n");

    let name = node.name().to_string();
    let (dir, addr) = node.stop().await;
    assert!(dir.path().join("storage.sql").exists());

    // Same directory and address: the stale database is discarded and rebuilt from the log.
    let node = TestNode::start_in(dir, &addr).await;
    assert_eq!(node.name(), name);
    let outcome = node.node.state.membership.start(None).await.unwrap();
    assert_eq!(outcome, StartOutcome::Recovered);
    node.node
        .raft
        .wait_for_leader(Duration::from_secs(10))
        .await
        .unwrap();
    wait_until("leadership", || node.node.state.is_leader()).await;

    let (status, body) = post(&client, &node.addr, "/sql", "SELECT x FROM t").await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body, "SequenceNumber: 3\n1\n");
    assert_eq!(node.sequence_number(), 3);

    node.stop().await;
}
