// Join endpoints
// Joiners may contact any member; non-leaders relay the request to the leader

use actix_web::{HttpResponse, web};
use sqlcluster_common::{ClusterError, JoinRequest};

use crate::error::AppError;
use crate::model::common::AppState;
use crate::service::dispatch::JSON_CONTENT_TYPE;

fn decode(body: &[u8]) -> Result<JoinRequest, ClusterError> {
    serde_json::from_slice(body)
        .map_err(|e| ClusterError::InvalidRequest(format!("malformed join request: {}", e)))
}

/// POST /join
pub async fn join(data: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, AppError> {
    let request = decode(&body)?;

    if data.is_leader() {
        let response = data.membership.admit(request).await?;
        return Ok(HttpResponse::Ok().json(response));
    }

    let reply = data.dispatcher.forward_join(body.to_vec()).await?;
    Ok(HttpResponse::Ok()
        .content_type(JSON_CONTENT_TYPE)
        .body(reply))
}

/// POST /join/leader
/// Forwarding target for joins. A non-leader answers 503 so the joiner retries.
pub async fn leader_join(
    data: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let request = decode(&body)?;
    if !data.is_leader() {
        return Err(ClusterError::NotLeader {
            role: data.consensus.role(),
            leader: data.consensus.leader().map(|l| l.address),
        }
        .into());
    }
    let response = data.membership.admit(request).await?;
    Ok(HttpResponse::Ok().json(response))
}
