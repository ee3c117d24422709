// Raft RPC endpoints
// Each handler answers 200 with the serialized Result of the raft call, errors included

use actix_web::{HttpResponse, web};
use openraft::raft::{AppendEntriesRequest, InstallSnapshotRequest, VoteRequest};
use sqlcluster_consistency::{NodeId, RaftNode, TypeConfig};

pub async fn append(
    node: web::Data<RaftNode>,
    req: web::Json<AppendEntriesRequest<TypeConfig>>,
) -> HttpResponse {
    let result = node.raft().append_entries(req.into_inner()).await;
    HttpResponse::Ok().json(result)
}

pub async fn vote(node: web::Data<RaftNode>, req: web::Json<VoteRequest<NodeId>>) -> HttpResponse {
    let result = node.raft().vote(req.into_inner()).await;
    HttpResponse::Ok().json(result)
}

pub async fn snapshot(
    node: web::Data<RaftNode>,
    req: web::Json<InstallSnapshotRequest<TypeConfig>>,
) -> HttpResponse {
    let result = node.raft().install_snapshot(req.into_inner()).await;
    HttpResponse::Ok().json(result)
}
