// HTTP route configuration
// Client and membership endpoints, plus the raft RPC endpoints peers call

use actix_web::web;
use sqlcluster_consistency::raft::{RAFT_APPEND_PATH, RAFT_SNAPSHOT_PATH, RAFT_VOTE_PATH};

use super::{health, join, members, raft, sql};

pub const SQL_PATH: &str = "/sql";
/// Forwarding target; never forwards again.
pub const LEADER_SQL_PATH: &str = "/sql/leader";
pub const JOIN_PATH: &str = "/join";
pub const LEADER_JOIN_PATH: &str = "/join/leader";
pub const HEALTHCHECK_PATH: &str = "/healthcheck";
pub const MEMBERS_PATH: &str = "/members";

pub fn cluster_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(SQL_PATH, web::post().to(sql::query))
        .route(LEADER_SQL_PATH, web::post().to(sql::leader_query))
        .route(JOIN_PATH, web::post().to(join::join))
        .route(LEADER_JOIN_PATH, web::post().to(join::leader_join))
        .route(HEALTHCHECK_PATH, web::get().to(health::healthcheck))
        .route(MEMBERS_PATH, web::get().to(members::members));
}

pub fn raft_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(RAFT_APPEND_PATH, web::post().to(raft::append))
        .route(RAFT_VOTE_PATH, web::post().to(raft::vote))
        .route(RAFT_SNAPSHOT_PATH, web::post().to(raft::snapshot));
}
