//! gRPC server host: serving and graceful shutdown.

use std::future::Future;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic_health::server::health_reporter;
use tracing::{info, warn};

use crate::error::Result;
use crate::proto::auth_service_server::AuthServiceServer;

/// gRPC service implementation.
pub mod service;

pub use service::AuthServiceImpl;

/// Serves the auth and health services on `listener` until `shutdown` resolves.
///
/// Once `shutdown` completes the health status flips to not-serving, the
/// listener stops accepting, in-flight calls run to completion, and then this
/// returns.
pub async fn serve<F>(listener: TcpListener, service: AuthServiceImpl, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<AuthServiceServer<AuthServiceImpl>>()
        .await;

    let drain = async move {
        shutdown.await;
        health_reporter
            .set_not_serving::<AuthServiceServer<AuthServiceImpl>>()
            .await;
        info!("stopped accepting connections, draining in-flight calls");
    };

    Server::builder()
        .add_service(health_service)
        .add_service(AuthServiceServer::new(service))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), drain)
        .await?;

    info!("all in-flight calls finished");
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
///
/// Signal delivery goes through a one-slot channel so a burst of signals
/// collapses into one shutdown request.
pub async fn shutdown_signal() {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&'static str>(1);

    let ctrl_c_tx = tx.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                let _ = ctrl_c_tx.try_send("SIGINT");
            }
            Err(e) => warn!(error = %e, "failed to listen for SIGINT"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                if term.recv().await.is_some() {
                    let _ = tx.try_send("SIGTERM");
                }
            }
            Err(e) => warn!(error = %e, "failed to listen for SIGTERM"),
        }
    });

    #[cfg(not(unix))]
    drop(tx);

    match rx.recv().await {
        Some(name) => info!(signal = name, "received shutdown signal"),
        None => std::future::pending::<()>().await,
    }
}
