//! HTTP transport implementing openraft's `RaftNetwork`.
//!
//! Every RPC is a JSON POST to the peer's own HTTP endpoint. The peer answers
//! with the serialized `Result` of the matching `Raft` call, so a remote raft
//! error travels back intact and surfaces as `RPCError::RemoteError`.

use std::time::Duration;

use openraft::error::{
    InstallSnapshotError, NetworkError, RPCError, RaftError, RemoteError, Unreachable,
};
use openraft::network::{RPCOption, RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::types::{Member, NodeId, TypeConfig};

pub const RAFT_APPEND_PATH: &str = "/raft/append";
pub const RAFT_VOTE_PATH: &str = "/raft/vote";
pub const RAFT_SNAPSHOT_PATH: &str = "/raft/snapshot";

type RpcResult<T, E = openraft::error::Infallible> =
    Result<T, RPCError<NodeId, Member, RaftError<NodeId, E>>>;

/// Factory for per-peer connections. All connections share one HTTP client pool.
#[derive(Clone)]
pub struct NetworkFactory {
    client: reqwest::Client,
}

impl NetworkFactory {
    pub fn new(rpc_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(rpc_timeout)
            .connect_timeout(rpc_timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl RaftNetworkFactory<TypeConfig> for NetworkFactory {
    type Network = NetworkConnection;

    async fn new_client(&mut self, target: NodeId, node: &Member) -> Self::Network {
        NetworkConnection {
            target,
            node: node.clone(),
            client: self.client.clone(),
        }
    }
}

pub struct NetworkConnection {
    target: NodeId,
    node: Member,
    client: reqwest::Client,
}

impl NetworkConnection {
    async fn send<Req, Resp, E>(&self, path: &str, req: &Req) -> RpcResult<Resp, E>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        E: std::error::Error + DeserializeOwned,
    {
        let url = format!("http://{}{}", self.node.addr, path);

        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    RPCError::Unreachable(Unreachable::new(&e))
                } else {
                    RPCError::Network(NetworkError::new(&e))
                }
            })?;

        let result: Result<Resp, RaftError<NodeId, E>> = response
            .error_for_status()
            .map_err(|e| RPCError::Network(NetworkError::new(&e)))?
            .json()
            .await
            .map_err(|e| RPCError::Network(NetworkError::new(&e)))?;

        result.map_err(|e| {
            RPCError::RemoteError(RemoteError::new_with_node(self.target, self.node.clone(), e))
        })
    }
}

impl RaftNetwork<TypeConfig> for NetworkConnection {
    async fn append_entries(
        &mut self,
        req: AppendEntriesRequest<TypeConfig>,
        _option: RPCOption,
    ) -> RpcResult<AppendEntriesResponse<NodeId>> {
        self.send(RAFT_APPEND_PATH, &req).await
    }

    async fn install_snapshot(
        &mut self,
        req: InstallSnapshotRequest<TypeConfig>,
        _option: RPCOption,
    ) -> RpcResult<InstallSnapshotResponse<NodeId>, InstallSnapshotError> {
        self.send(RAFT_SNAPSHOT_PATH, &req).await
    }

    async fn vote(
        &mut self,
        req: VoteRequest<NodeId>,
        _option: RPCOption,
    ) -> RpcResult<VoteResponse<NodeId>> {
        self.send(RAFT_VOTE_PATH, &req).await
    }
}
