use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tracing::{error, info, warn};

use crate::relay::{RelayContext, RelaySession};

/// Accepts local WebSocket clients and runs one relay session per client.
///
/// Clients are not authenticated; the listener is meant for local use.
pub struct ConnectionServer {
    listener: TcpListener,
    context: Arc<RelayContext>,
    next_session_id: AtomicU64,
}

impl ConnectionServer {
    pub async fn bind(address: &str, context: RelayContext) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("binding relay listener {}", address))?;
        Ok(Self {
            listener,
            context: Arc::new(context),
            next_session_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept until the process stops
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept until `shutdown` resolves. Sessions already running are left
    /// to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Running websocket server {}...", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("relay listener shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_session(stream, peer),
                    // a failed accept must not take the listener down
                    Err(e) => warn!("accept failed: {}", e),
                }
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let context = self.context.clone();
        info!(session_id = id, peer = %peer, "New connection...");

        tokio::spawn(async move {
            if let Err(e) = stream.set_nodelay(true) {
                warn!(session_id = id, "cannot set TCP_NODELAY: {}", e);
            }
            let client = match accept_async(stream).await {
                Ok(client) => client,
                Err(e) => {
                    warn!(session_id = id, peer = %peer, "websocket handshake with client failed: {}", e);
                    return;
                }
            };

            let session = RelaySession::new(id, Some(peer), context);
            if let Err(e) = session.establish(client).await {
                error!(session_id = id, "Error creating proxy: {}", e);
            }
        });
    }
}
