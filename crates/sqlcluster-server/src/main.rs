//! Main entry point for the sqlcluster server.
//!
//! Starts the HTTP endpoint first so raft peers and joiners can reach this
//! node, then joins, bootstraps or recovers, and serves until a signal or a
//! fatal raft error.

use std::net::TcpListener;

use anyhow::Context;
use sqlcluster_server::{
    model::config::Configuration,
    startup::{self, ShutdownSignal, node::Startup},
};
use tracing::{error, info};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;

    let _logging_guard = startup::logging::init_logging(&configuration.logging_config())?;
    sqlcluster_server::metrics::init_metrics();

    let node = startup::node::build_node(&configuration).await?;

    let listen = configuration.listen_address();
    let listener =
        TcpListener::bind(&listen).with_context(|| format!("binding HTTP listener {}", listen))?;
    info!("Listening on {}", listen);

    let server = startup::http::cluster_server(node.state.clone(), node.raft.clone(), listener)?;
    let server_handle = server.handle();
    let mut server_task = actix_rt::spawn(server);

    let shutdown = ShutdownSignal::new();
    let mut shutdown_rx = shutdown.subscribe();
    startup::shutdown::listen_for_signals(shutdown.clone());

    let primary = configuration.join_target();
    let start = startup::node::await_startup(
        node.state.membership.start(primary.as_deref()),
        node.raft.wait_for_fatal(),
        async {
            let _ = shutdown_rx.recv().await;
        },
    )
    .await;

    let mut failure: Option<anyhow::Error> = None;
    match start {
        Startup::Ready(outcome) => {
            info!("Membership ready: {:?}", outcome);

            tokio::select! {
                result = &mut server_task => {
                    match result {
                        Ok(Ok(())) => info!("HTTP server stopped"),
                        Ok(Err(e)) => failure = Some(anyhow::Error::new(e).context("HTTP server")),
                        Err(e) => failure = Some(anyhow::Error::new(e).context("HTTP server task")),
                    }
                }
                fatal = node.raft.wait_for_fatal() => {
                    error!("Stopping after fatal error: {}", fatal);
                    failure = Some(fatal.into());
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutting down gracefully");
                }
            }
        }
        Startup::Failed(e) => {
            error!("Failed to start cluster membership: {}", e);
            failure = Some(e.into());
        }
        Startup::Interrupted => info!("Shutdown requested during startup"),
    }

    server_handle.stop(true).await;
    if let Err(e) = node.raft.shutdown().await {
        error!("{}", e);
    }

    info!("sqlcluster shutdown complete");
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
