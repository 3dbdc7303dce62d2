//! HTTP server module
//!
//! Binds the listening socket, accepts connections and hands each one to a
//! hyper http1 connection task running [`handler::handle_request`].
//!
//! # Port binding
//!
//! The listen port comes from configuration ([`DEFAULT_PORT`] when unset).
//! If it cannot be bound, [`FALLBACK_PORT`] is tried exactly once. There is
//! no further fallback and no retry loop.

use crate::config::{ServerConfig, FALLBACK_PORT};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub mod context;
pub mod handler;

pub use crate::config::DEFAULT_PORT;
pub use context::AppContext;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Startup error: {0}")]
    StartupError(String),
}

/// Ports tried in order: the configured one, then the fixed fallback.
pub fn port_candidates(configured: u16) -> [u16; 2] {
    [configured, FALLBACK_PORT]
}

/// Bind `host` on the configured port, falling back to [`FALLBACK_PORT`] once.
pub async fn bind_with_fallback(host: &str, configured: u16) -> Result<TcpListener, ServerError> {
    bind_first_available(host, &port_candidates(configured)).await
}

/// Try each port in `ports` once, in order, and return the first listener.
pub async fn bind_first_available(host: &str, ports: &[u16]) -> Result<TcpListener, ServerError> {
    let mut failures = Vec::with_capacity(ports.len());

    for (attempt, &port) in ports.iter().enumerate() {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                if attempt > 0 {
                    warn!(
                        port,
                        previous = %failures.join("; "),
                        "Bound fallback port"
                    );
                }
                return Ok(listener);
            }
            Err(e) => {
                warn!(
                    host = %host,
                    port,
                    kind = ?e.kind(),
                    error = %e,
                    "Failed to bind port"
                );
                failures.push(format!("{}:{} ({})", host, port, e));
            }
        }
    }

    Err(ServerError::BindError(failures.join("; ")))
}

/// HTTP Server
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    context: Arc<AppContext>,
}

impl Server {
    /// Bind according to `config`, with the single-port fallback.
    pub async fn bind(config: &ServerConfig, context: AppContext) -> Result<Self, ServerError> {
        let listener = bind_with_fallback(&config.host, config.listen_port()).await?;
        Self::from_listener(listener, context)
    }

    /// Serve on an already bound listener
    pub fn from_listener(listener: TcpListener, context: AppContext) -> Result<Self, ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            context: Arc::new(context),
        })
    }

    /// The address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run until Ctrl-C, then drain in-flight connections.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        };
        self.run_until(shutdown).await
    }

    /// Run until `shutdown` resolves, then drain in-flight connections.
    ///
    /// Each connection is served on its own task; a failing connection is
    /// logged and does not affect the others.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!("Accepting uploads on http://{}", self.local_addr);

        let graceful = GracefulShutdown::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, peer_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };

                    let context = Arc::clone(&self.context);
                    let service = service_fn(move |req| {
                        let context = Arc::clone(&context);
                        async move { handler::handle_request(req, context).await }
                    });

                    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                    let conn = graceful.watch(conn);

                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            error!("Error serving connection from {}: {}", peer_addr, e);
                        }
                    });
                }

                () = &mut shutdown => {
                    info!("Shutting down server");
                    break;
                }
            }
        }

        graceful.shutdown().await;
        info!("All connections drained");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_candidates_are_exactly_two() {
        assert_eq!(port_candidates(8080), [8080, 8081]);
        // The fallback is fixed even when it equals the configured port
        assert_eq!(port_candidates(8081), [8081, 8081]);
    }

    #[tokio::test]
    async fn test_bind_first_available_uses_first_free_port() {
        let listener = bind_first_available("127.0.0.1", &[0, 0]).await.unwrap();
        assert!(listener.local_addr().unwrap().port() > 0);
    }

    #[tokio::test]
    async fn test_bind_skips_occupied_port() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken = occupied.local_addr().unwrap().port();

        let listener = bind_first_available("127.0.0.1", &[taken, 0]).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), taken);
    }

    #[tokio::test]
    async fn test_bind_fails_after_all_candidates() {
        let a = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let b = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ports = [a.local_addr().unwrap().port(), b.local_addr().unwrap().port()];

        let err = bind_first_available("127.0.0.1", &ports).await.unwrap_err();
        match err {
            ServerError::BindError(msg) => {
                assert!(msg.contains(&ports[0].to_string()));
                assert!(msg.contains(&ports[1].to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
