pub mod health;
pub mod join;
pub mod members;
pub mod raft;
pub mod route;
pub mod sql;

use actix_web::HttpResponse;

use crate::service::dispatch::TEXT_CONTENT_TYPE;

fn text(body: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok().content_type(TEXT_CONTENT_TYPE).body(body)
}
