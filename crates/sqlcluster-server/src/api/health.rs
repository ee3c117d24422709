use actix_web::HttpResponse;

/// GET /healthcheck
/// Liveness only: answers 200 with an empty body whatever the node's role.
pub async fn healthcheck() -> HttpResponse {
    HttpResponse::Ok().finish()
}
