//! Dispatch router.
//!
//! Every query enters here. The leader submits it to consensus and answers
//! with the applied result; any other node relays the raw body to a leader
//! candidate through `/sql/leader`, which never forwards again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use sqlcluster_common::{ClusterError, ClusterResult};
use sqlcluster_consistency::{ClusterRequest, Consensus};
use tracing::{debug, warn};

use crate::api::route::{LEADER_JOIN_PATH, LEADER_SQL_PATH};
use crate::service::client::PeerClient;

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// How far a forward must outlast the leader's own submit timeout.
const FORWARD_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Upper bound on peers tried for one forwarded request.
    pub forward_attempts: usize,
    /// Always longer than `submit_timeout`, so the leader answers before the relay gives up.
    pub forward_timeout: Duration,
    /// Bound on waiting for a submitted command to be applied.
    pub submit_timeout: Duration,
    /// Per-attempt timeout for forwarded joins, which wait for the learner to catch up.
    pub join_timeout: Duration,
}

impl DispatchSettings {
    /// Raise `forward_timeout` above `submit_timeout` when configured too short.
    pub fn normalized(mut self) -> Self {
        if self.forward_timeout <= self.submit_timeout {
            let raised = self.submit_timeout + FORWARD_TIMEOUT_MARGIN;
            warn!(
                "Forward timeout {:?} does not exceed submit timeout {:?}, using {:?}",
                self.forward_timeout, self.submit_timeout, raised
            );
            self.forward_timeout = raised;
        }
        self
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            forward_attempts: 5,
            forward_timeout: Duration::from_secs(15),
            submit_timeout: Duration::from_secs(10),
            join_timeout: Duration::from_secs(30),
        }
    }
}

pub struct Dispatcher {
    consensus: Arc<dyn Consensus>,
    client: PeerClient,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(consensus: Arc<dyn Consensus>, client: PeerClient, settings: DispatchSettings) -> Self {
        Self {
            consensus,
            client,
            settings: settings.normalized(),
        }
    }

    /// Answer a client query from whichever node received it.
    pub async fn dispatch(&self, body: Vec<u8>) -> ClusterResult<Vec<u8>> {
        if self.consensus.role().is_leader() {
            return self.submit_local(&body).await;
        }
        self.forward(
            LEADER_SQL_PATH,
            body,
            TEXT_CONTENT_TYPE,
            self.settings.forward_timeout,
        )
        .await
    }

    /// Submit a query to consensus and wait for its local result.
    pub async fn submit_local(&self, body: &[u8]) -> ClusterResult<Vec<u8>> {
        let query = std::str::from_utf8(body)
            .map_err(|e| ClusterError::InvalidRequest(format!("query is not UTF-8: {}", e)))?;

        let start = Instant::now();
        let result = tokio::time::timeout(
            self.settings.submit_timeout,
            self.consensus.submit(ClusterRequest::query(query)),
        )
        .await
        .unwrap_or_else(|_| {
            Err(ClusterError::Timeout(format!(
                "query not applied within {:?}",
                self.settings.submit_timeout
            )))
        });
        crate::metrics::record_query(start.elapsed().as_secs_f64(), result.is_ok());

        result.map(|response| response.into_payload())
    }

    /// Join requests that reach a non-leader, relayed to `/join/leader`.
    pub async fn forward_join(&self, body: Vec<u8>) -> ClusterResult<Vec<u8>> {
        self.forward(
            LEADER_JOIN_PATH,
            body,
            JSON_CONTENT_TYPE,
            self.settings.join_timeout,
        )
        .await
        .map_err(|e| match e {
            ClusterError::NoLeader { role } => {
                ClusterError::Unavailable(format!("no leader reachable from this {}", role))
            }
            other => other,
        })
    }

    /// Relay `body` to leader candidates until one answers.
    ///
    /// Only a refused connection or a 503 moves on: the request never reached
    /// a leader. Anything else was delivered, so it is relayed as the final
    /// answer even when it is a failure, because the command may still commit.
    pub async fn forward(
        &self,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
        timeout: Duration,
    ) -> ClusterResult<Vec<u8>> {
        let candidates = self.candidates();

        for addr in candidates {
            debug!("Forwarding {} to {}", path, addr);
            match self
                .client
                .post_raw(&addr, path, body.clone(), content_type, timeout)
                .await
            {
                Ok(reply) => {
                    crate::metrics::record_forward(path, true);
                    return Ok(reply);
                }
                Err(e @ (ClusterError::Network(_) | ClusterError::Remote { status: 503, .. })) => {
                    crate::metrics::record_forward(path, false);
                    warn!("Forwarding {} to {} failed: {}", path, addr, e);
                }
                Err(e) => {
                    let answered = matches!(e, ClusterError::Remote { status, .. } if status < 500);
                    crate::metrics::record_forward(path, answered);
                    if !answered {
                        warn!("Forwarded {} to {} but got no usable answer: {}", path, addr, e);
                    }
                    return Err(e);
                }
            }
        }

        Err(ClusterError::NoLeader {
            role: self.consensus.role(),
        })
    }

    /// The known leader first, then the other peers in random order.
    /// Each address appears once and this node never does.
    fn candidates(&self) -> Vec<String> {
        let local = self.consensus.local();
        let mut candidates: Vec<String> = self
            .consensus
            .leader()
            .filter(|l| l.name != local.name)
            .map(|l| l.address)
            .into_iter()
            .collect();

        let mut peers: Vec<String> = self
            .consensus
            .members()
            .into_iter()
            .filter(|m| m.name != local.name && m.address != local.address)
            .map(|m| m.address)
            .collect();
        peers.shuffle(&mut rand::rng());

        for addr in peers {
            if !candidates.contains(&addr) {
                candidates.push(addr);
            }
        }
        candidates.truncate(self.settings.forward_attempts);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use actix_web::{App, HttpResponse, HttpServer, web};
    use sqlcluster_common::{MembershipEntry, NodeRole};

    use super::*;
    use crate::test_support::FakeConsensus;

    fn dispatcher(consensus: Arc<FakeConsensus>, attempts: usize) -> Dispatcher {
        Dispatcher::new(
            consensus,
            PeerClient::new().unwrap(),
            DispatchSettings {
                forward_attempts: attempts,
                forward_timeout: Duration::from_millis(1500),
                submit_timeout: Duration::from_millis(500),
                ..Default::default()
            },
        )
    }

    /// Serve `reply` with `status` on `/sql/leader` from an ephemeral port,
    /// after `delay`, counting the requests received.
    async fn counting_peer(
        status: u16,
        reply: &'static str,
        delay: Duration,
    ) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let served = calls.clone();
        let server = HttpServer::new(move || {
            let served = served.clone();
            App::new().route(
                LEADER_SQL_PATH,
                web::post().to(move |body: web::Bytes| {
                    let served = served.clone();
                    async move {
                        served.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(delay).await;
                        let code = actix_web::http::StatusCode::from_u16(status).unwrap();
                        HttpResponse::build(code).body(format!("{}{}", reply, body.len()))
                    }
                }),
            )
        })
        .workers(1)
        .bind("127.0.0.1:0")
        .unwrap();
        let addr = server.addrs()[0].to_string();
        actix_rt::spawn(server.run());
        (addr, calls)
    }

    async fn fake_peer(status: u16, reply: &'static str) -> String {
        counting_peer(status, reply, Duration::ZERO).await.0
    }

    #[actix_rt::test]
    async fn test_leader_submits_locally() {
        let fake = FakeConsensus::leader("a", "127.0.0.1:1");
        let dispatcher = dispatcher(fake.clone(), 3);

        let reply = dispatcher
            .dispatch(b"CREATE TABLE t (v INTEGER)".to_vec())
            .await
            .unwrap();
        assert_eq!(reply, b"SequenceNumber: 1\n");

        let reply = dispatcher.dispatch(b"SELECT 7".to_vec()).await.unwrap();
        assert_eq!(reply, b"SequenceNumber: 2\n7\n");
        assert_eq!(fake.executed(), 2);
    }

    #[actix_rt::test]
    async fn test_non_utf8_query_rejected() {
        let fake = FakeConsensus::leader("a", "127.0.0.1:1");
        let err = dispatcher(fake.clone(), 3)
            .dispatch(vec![0xff, 0xfe])
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::InvalidRequest(_)));
        assert_eq!(fake.executed(), 0);
    }

    #[actix_rt::test]
    async fn test_follower_forwards_to_leader() {
        let leader_addr = fake_peer(200, "applied:").await;
        let fake = FakeConsensus::new("b", "127.0.0.1:1");
        let leader = MembershipEntry::new("a", leader_addr.clone());
        fake.set_follower(Some(leader.clone()), vec![leader, fake.local()]);

        let reply = dispatcher(fake.clone(), 3)
            .dispatch(b"SELECT 1".to_vec())
            .await
            .unwrap();
        assert_eq!(reply, b"applied:8");
        assert_eq!(fake.executed(), 0);
    }

    #[actix_rt::test]
    async fn test_client_error_is_passed_through() {
        let leader_addr = fake_peer(409, "conflict").await;
        let fake = FakeConsensus::new("b", "127.0.0.1:1");
        let leader = MembershipEntry::new("a", leader_addr);
        fake.set_follower(Some(leader.clone()), vec![leader]);

        let err = dispatcher(fake, 3)
            .dispatch(b"SELECT 1".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Remote { status: 409, .. }), "{err}");
    }

    #[actix_rt::test]
    async fn test_unavailable_peer_moves_on() {
        let stale = fake_peer(503, "not leader").await;
        let fake = FakeConsensus::new("b", "127.0.0.1:1");
        let peer = MembershipEntry::new("a", stale);
        fake.set_follower(Some(peer.clone()), vec![peer]);

        let err = dispatcher(fake, 3)
            .dispatch(b"SELECT 1".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::NoLeader {
                role: NodeRole::Follower
            }
        ));
    }

    #[actix_rt::test]
    async fn test_no_peers_gives_no_leader() {
        let fake = FakeConsensus::new("b", "127.0.0.1:1");
        let err = dispatcher(fake, 5)
            .dispatch(b"SELECT 1".to_vec())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Only the primary can service queries, but this is a follower"
        );
    }

    #[actix_rt::test]
    async fn test_unreachable_peers_give_no_leader() {
        let fake = FakeConsensus::new("b", "127.0.0.1:4");
        let dead = MembershipEntry::new("a", "127.0.0.1:1");
        fake.set_follower(Some(dead.clone()), vec![dead]);

        let err = dispatcher(fake, 2)
            .dispatch(b"SELECT 1".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::NoLeader { .. }));
    }

    #[actix_rt::test]
    async fn test_forwarded_join_exhaustion_is_unavailable() {
        let fake = FakeConsensus::new("b", "127.0.0.1:1");
        let err = dispatcher(fake, 2)
            .forward_join(b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Unavailable(_)));
    }

    #[actix_rt::test]
    async fn test_slow_leader_is_not_resubmitted() {
        let (leader_addr, leader_calls) =
            counting_peer(200, "late:", Duration::from_secs(4)).await;
        let (other_addr, other_calls) = counting_peer(200, "other:", Duration::ZERO).await;
        let fake = FakeConsensus::new("b", "127.0.0.1:1");
        let leader = MembershipEntry::new("a", leader_addr);
        let other = MembershipEntry::new("c", other_addr);
        fake.set_follower(Some(leader.clone()), vec![leader, other, fake.local()]);

        let err = dispatcher(fake, 5)
            .dispatch(b"INSERT INTO t VALUES (1)".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Timeout(_)), "{err}");
        assert_eq!(crate::error::status_for(&err).as_u16(), 504);
        assert_eq!(leader_calls.load(Ordering::SeqCst), 1);
        assert_eq!(other_calls.load(Ordering::SeqCst), 0);
    }

    #[actix_rt::test]
    async fn test_leader_server_error_is_relayed_once() {
        let (leader_addr, leader_calls) = counting_peer(500, "boom:", Duration::ZERO).await;
        let (other_addr, other_calls) = counting_peer(200, "other:", Duration::ZERO).await;
        let fake = FakeConsensus::new("b", "127.0.0.1:1");
        let leader = MembershipEntry::new("a", leader_addr);
        let other = MembershipEntry::new("c", other_addr);
        fake.set_follower(Some(leader.clone()), vec![leader, other]);

        let err = dispatcher(fake, 5)
            .dispatch(b"SELECT 1".to_vec())
            .await
            .unwrap_err();
        assert!(
            matches!(&err, ClusterError::Remote { status: 500, message } if message == "boom:8"),
            "{err}"
        );
        assert_eq!(leader_calls.load(Ordering::SeqCst), 1);
        assert_eq!(other_calls.load(Ordering::SeqCst), 0);
    }

    #[actix_rt::test]
    async fn test_refused_leader_falls_through_to_peer() {
        let (other_addr, other_calls) = counting_peer(200, "other:", Duration::ZERO).await;
        let fake = FakeConsensus::new("b", "127.0.0.1:4");
        let dead = MembershipEntry::new("a", "127.0.0.1:1");
        let other = MembershipEntry::new("c", other_addr);
        fake.set_follower(Some(dead.clone()), vec![dead, other]);

        let reply = dispatcher(fake, 5)
            .dispatch(b"SELECT 1".to_vec())
            .await
            .unwrap();
        assert_eq!(reply, b"other:8");
        assert_eq!(other_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_forward_timeout_exceeds_submit_timeout() {
        let settings = DispatchSettings {
            forward_timeout: Duration::from_secs(5),
            submit_timeout: Duration::from_secs(10),
            ..Default::default()
        }
        .normalized();
        assert!(settings.forward_timeout > settings.submit_timeout);

        let defaults = DispatchSettings::default();
        assert_eq!(defaults.clone().normalized(), defaults);
    }

    #[test]
    fn test_candidates_start_with_leader_and_skip_self() {
        let fake = FakeConsensus::new("b", "127.0.0.1:2");
        let leader = MembershipEntry::new("a", "127.0.0.1:1");
        let other = MembershipEntry::new("c", "127.0.0.1:3");
        let renamed = MembershipEntry::new("d", "127.0.0.1:3");
        fake.set_follower(
            Some(leader.clone()),
            vec![leader.clone(), fake.local(), other, renamed, leader],
        );

        let candidates = dispatcher(fake.clone(), 4).candidates();
        assert_eq!(candidates, vec!["127.0.0.1:1", "127.0.0.1:3"]);

        let candidates = dispatcher(fake, 1).candidates();
        assert_eq!(candidates, vec!["127.0.0.1:1"]);
    }
}
