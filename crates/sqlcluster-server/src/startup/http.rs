//! HTTP server setup.

use std::net::TcpListener;
use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware::Logger, web};
use sqlcluster_consistency::RaftNode;

use crate::api::route::{cluster_routes, raft_routes};
use crate::model::common::AppState;

/// Largest accepted request body, raft batches included.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Creates the node's HTTP server on an already bound listener.
///
/// Clients, joiners and raft peers all talk to this one endpoint.
pub fn cluster_server(
    app_state: Arc<AppState>,
    raft: Arc<RaftNode>,
    listener: TcpListener,
) -> Result<Server, std::io::Error> {
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::from(app_state.clone()))
            .app_data(web::Data::from(raft.clone()))
            .app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
            .app_data(web::JsonConfig::default().limit(MAX_BODY_BYTES))
            .configure(cluster_routes)
            .configure(raft_routes)
    })
    .listen(listener)?
    .run())
}
