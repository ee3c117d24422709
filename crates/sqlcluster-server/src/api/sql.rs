// Query endpoints
// The body is the raw query text and the reply is the raw result bytes

use actix_web::{HttpResponse, web};
use sqlcluster_common::ClusterError;

use super::text;
use crate::error::AppError;
use crate::model::common::AppState;

/// POST /sql
/// Submit on the leader, otherwise forward to one.
pub async fn query(data: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, AppError> {
    let reply = data.dispatcher.dispatch(body.to_vec()).await?;
    Ok(text(reply))
}

/// POST /sql/leader
/// Forwarding target. A non-leader answers 503 so the sender tries another peer.
pub async fn leader_query(
    data: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    if !data.is_leader() {
        return Err(ClusterError::NotLeader {
            role: data.consensus.role(),
            leader: data.consensus.leader().map(|l| l.address),
        }
        .into());
    }
    let reply = data.dispatcher.submit_local(&body).await?;
    Ok(text(reply))
}
