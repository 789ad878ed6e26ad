use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::observability::events::RelayObserver;
use crate::provider::TokenProvider;
use crate::relay::forward::{forward, ForwardEnd};
use crate::relay::upstream::{connect_upstream, UpstreamStream};
use crate::relay::Direction;
use crate::utils::constants::INTERNAL_ERROR_REASON;

/// Everything a session needs, shared by all sessions of a listener
pub struct RelayContext {
    pub provider: Arc<TokenProvider>,
    pub upstream_url: String,
    pub observer: Arc<dyn RelayObserver>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    ClientClosed,
    UpstreamClosed,
    Failed(String),
}

impl SessionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SessionOutcome::ClientClosed => "client_closed",
            SessionOutcome::UpstreamClosed => "upstream_closed",
            SessionOutcome::Failed(_) => "failed",
        }
    }

    /// Which peer went away, given the loop that stopped first
    fn from_end(direction: Direction, end: &ForwardEnd) -> Self {
        let source_side = match direction {
            Direction::ClientToUpstream => SessionOutcome::ClientClosed,
            Direction::UpstreamToClient => SessionOutcome::UpstreamClosed,
        };
        match end {
            ForwardEnd::SourceClosed | ForwardEnd::SourceFailed(_) => source_side,
            ForwardEnd::DestinationGone(_) => match source_side {
                SessionOutcome::ClientClosed => SessionOutcome::UpstreamClosed,
                _ => SessionOutcome::ClientClosed,
            },
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// One client connection relayed to one upstream connection.
pub struct RelaySession {
    id: u64,
    peer: Option<SocketAddr>,
    context: Arc<RelayContext>,
}

impl RelaySession {
    pub fn new(id: u64, peer: Option<SocketAddr>, context: Arc<RelayContext>) -> Self {
        Self { id, peer, context }
    }

    /// Authenticate, connect upstream and relay until either side closes.
    ///
    /// Token or handshake failures close the client with 1011 and are
    /// returned; no forwarding starts in that case. When relaying ends both
    /// connections are closed before this returns.
    pub async fn establish<S>(self, mut client: WebSocketStream<S>) -> Result<SessionOutcome, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let observer = self.context.observer.clone();
        observer.session_started(self.id, self.peer);

        let upstream = match self.open_upstream().await {
            Ok(upstream) => upstream,
            Err(e) => {
                close_with_server_error(self.id, &mut client).await;
                observer.session_ended(self.id, &SessionOutcome::Failed(e.to_string()));
                return Err(e);
            }
        };

        let outcome = self.relay(client, upstream).await;
        observer.session_ended(self.id, &outcome);
        Ok(outcome)
    }

    async fn open_upstream(&self) -> Result<UpstreamStream, SessionError> {
        let token = self.context.provider.get_token_for_session().await?;
        connect_upstream(&self.context.upstream_url, &token).await
    }

    async fn relay<S>(&self, client: WebSocketStream<S>, upstream: UpstreamStream) -> SessionOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut client_tx, mut client_rx) = client.split();
        let (mut upstream_tx, mut upstream_rx) = upstream.split();
        let observer = self.context.observer.as_ref();

        // first loop to finish ends the session; the other one is dropped
        let outcome = tokio::select! {
            end = forward(self.id, Direction::ClientToUpstream, &mut client_rx, &mut upstream_tx, observer) => {
                SessionOutcome::from_end(Direction::ClientToUpstream, &end)
            }
            end = forward(self.id, Direction::UpstreamToClient, &mut upstream_rx, &mut client_tx, observer) => {
                SessionOutcome::from_end(Direction::UpstreamToClient, &end)
            }
        };

        if let Err(e) = upstream_tx.close().await {
            debug!(session_id = self.id, "upstream already closed: {}", e);
        }
        if let Err(e) = client_tx.close().await {
            debug!(session_id = self.id, "client already closed: {}", e);
        }
        outcome
    }
}

async fn close_with_server_error<S>(session_id: u64, client: &mut WebSocketStream<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = CloseFrame {
        code: CloseCode::Error,
        reason: Utf8Bytes::from_static(INTERNAL_ERROR_REASON),
    };
    if let Err(e) = client.close(Some(frame)).await {
        warn!(session_id, "failed to close client connection: {}", e);
    }
}
