use crate::csi::proto::{
    controller_server::ControllerServer, identity_server::IdentityServer, node_server::NodeServer,
};
use crate::csi::{ControllerService, IdentityService, NodeService};
use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use tonic::transport::Server;

/// CSI gRPC server
///
/// Identity, controller and node services share one Unix socket.
pub struct CsiServer {
    identity: IdentityService,
    controller: ControllerService,
    node: NodeService,
}

/// Filesystem path of a `unix://` endpoint.
pub fn socket_path(endpoint: &str) -> Result<PathBuf> {
    let path = endpoint.strip_prefix("unix://").context("Address must start with unix://")?;
    if path.is_empty() {
        anyhow::bail!("Empty socket path in endpoint {}", endpoint);
    }
    Ok(PathBuf::from(path))
}

fn prepare_socket(path: &Path) -> Result<()> {
    // Remove existing socket if it exists
    if path.exists() {
        std::fs::remove_file(path).context("Failed to remove existing socket")?;
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    Ok(())
}

impl CsiServer {
    pub fn new(identity: IdentityService, controller: ControllerService, node: NodeService) -> Self {
        Self { identity, controller, node }
    }

    /// Serve until `shutdown` resolves, then remove the socket file.
    pub async fn serve(self, endpoint: &str, shutdown: impl Future<Output = ()>) -> Result<()> {
        let path = socket_path(endpoint)?;
        prepare_socket(&path)?;

        let uds = tokio::net::UnixListener::bind(&path).context("Failed to bind Unix socket")?;
        let uds_stream = tokio_stream::wrappers::UnixListenerStream::new(uds);

        tracing::info!("CSI plugin listening on {}", endpoint);

        let served = Server::builder()
            .add_service(IdentityServer::new(self.identity))
            .add_service(ControllerServer::new(self.controller))
            .add_service(NodeServer::new(self.node))
            .serve_with_incoming_shutdown(uds_stream, shutdown)
            .await
            .context("gRPC server error");

        tracing::info!("Exiting, removing socket file {}", path.display());
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!("Failed to remove socket file {}: {}", path.display(), e);
        }

        served
    }
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
