use actix_web::{HttpResponse, web};

use crate::model::common::AppState;

/// GET /members
/// Committed membership as seen by this node.
pub async fn members(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(data.membership.members())
}
