use std::{future::Future, net::SocketAddr, pin::pin, sync::Arc};

use tokio::{net::TcpListener, task::JoinSet};
use tokio_util::sync::CancellationToken;

use super::{connection_server::serve_connection, Configuration, Service};

/// An `RpcServer` listens on a socket and serves your [`Service`] on every connection.
///
/// Each connection gets a task, and each call on a connection gets a task of its own.
/// Calls on one connection run concurrently; messages within a call are handled in order.
///
/// Shutdown is graceful: once requested, the listener stops accepting, connections refuse
/// new calls with `Unavailable`, and in-flight calls may finish within the configured
/// drain timeout. Connections still busy after that are aborted.
pub struct RpcServer<S>
where
    S: Service,
{
    listener: TcpListener,
    service: Arc<S>,
    configuration: Configuration,
    shutdown: CancellationToken,
}

impl<S> RpcServer<S>
where
    S: Service,
{
    /// Bind a new listener for the service.
    pub async fn bind(
        address: SocketAddr,
        service: S,
        configuration: Configuration,
    ) -> crate::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self::new(listener, service, configuration))
    }

    /// Serve the service on a listener you bound yourself.
    pub fn new(listener: TcpListener, service: S, configuration: Configuration) -> Self {
        Self {
            listener,
            service: Arc::new(service),
            configuration,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn local_addr(&self) -> crate::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Cancel this token to begin a graceful shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve until `signal` completes, then shut down gracefully.
    pub async fn serve_with_shutdown(self, signal: impl Future<Output = ()>) -> crate::Result<()> {
        let shutdown = self.shutdown.clone();
        let mut serve = pin!(self.serve());
        tokio::select! {
            result = &mut serve => return result,
            _ = signal => {
                log::info!("shutdown requested");
                shutdown.cancel();
            }
        }
        serve.await
    }

    /// Serve until the shutdown token is cancelled, then shut down gracefully.
    pub async fn serve(self) -> crate::Result<()> {
        let Self {
            listener,
            service,
            configuration,
            shutdown,
        } = self;
        log::info!("serving {} on {}", S::NAME, listener.local_addr()?);

        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, address)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            log::warn!("could not set nodelay: {e:?}");
                        }
                        log::debug!("new connection {address}");
                        connections.spawn(serve_connection(
                            service.clone(),
                            stream,
                            address,
                            configuration.clone(),
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => {
                        log::warn!("failed to accept a connection: {e:?}");
                    }
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    log_connection_end(finished);
                }
            }
        }

        drop(listener);
        log::info!(
            "stopped accepting connections, draining {} connections",
            connections.len()
        );
        let drained = tokio::time::timeout(configuration.get_drain_timeout(), async {
            while let Some(finished) = connections.join_next().await {
                log_connection_end(finished);
            }
        })
        .await;
        if drained.is_err() {
            log::warn!(
                "drain timed out, aborting {} connections",
                connections.len()
            );
            connections.shutdown().await;
        }
        log::info!("server stopped");
        Ok(())
    }
}

fn log_connection_end(finished: Result<crate::Result<()>, tokio::task::JoinError>) {
    match finished {
        Ok(Ok(())) => log::debug!("connection finished"),
        Ok(Err(e)) => log::debug!("connection failed: {e:?}"),
        Err(e) => log::error!("connection task failed: {e:?}"),
    }
}
