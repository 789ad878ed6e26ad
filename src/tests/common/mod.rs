// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use reqwest::Client;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::{HeaderName, AUTHORIZATION, CONTENT_TYPE};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, MaybeTlsStream, WebSocketStream};

use crate::config::credentials::ServiceAccountCredential;
use crate::error::AuthError;
use crate::observability::events::RelayObserver;
use crate::provider::TokenProvider;
use crate::relay::{Direction, RelayContext, SessionOutcome};
use crate::resilience::retry::RetrySettings;
use crate::server::ConnectionServer;
use crate::sources::service_account::ServiceAccountSource;
use crate::sources::TokenSource;

pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/service_account_key.pem");

pub type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

pub fn test_credential(token_uri: &str) -> ServiceAccountCredential {
    ServiceAccountCredential {
        credential_type: Some("service_account".to_owned()),
        project_id: Some("relay-test".to_owned()),
        private_key_id: Some("test-key-id".to_owned()),
        private_key: TEST_PRIVATE_KEY.to_owned(),
        client_email: "relay@relay-test.iam.gserviceaccount.com".to_owned(),
        token_uri: token_uri.to_owned(),
    }
}

pub fn service_account_source(token_uri: &str) -> TokenSource {
    let source = ServiceAccountSource::new(test_credential(token_uri), build_reqwest_client())
        .expect("test key is a valid RSA key");
    TokenSource::ServiceAccount(source)
}

/// Provider without retry delays
pub fn test_provider(sources: Vec<TokenSource>, observer: Arc<dyn RelayObserver>) -> TokenProvider {
    TokenProvider::new(sources, observer).with_retry(RetrySettings::none())
}

/// Observer that keeps every event for later assertions
#[derive(Debug, Default)]
pub struct RecordingObserver {
    refreshed: Mutex<Vec<String>>,
    refresh_failures: AtomicUsize,
    started: Mutex<Vec<u64>>,
    ended: Mutex<Vec<(u64, SessionOutcome)>>,
    forwarded: Mutex<Vec<(u64, Direction)>>,
    dropped: Mutex<Vec<(u64, Direction)>>,
}

impl RecordingObserver {
    pub fn refreshed(&self) -> Vec<String> {
        self.refreshed.lock().unwrap().clone()
    }

    pub fn refresh_failures(&self) -> usize {
        self.refresh_failures.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> Vec<u64> {
        self.started.lock().unwrap().clone()
    }

    pub fn ended(&self) -> Vec<(u64, SessionOutcome)> {
        self.ended.lock().unwrap().clone()
    }

    pub fn forwarded(&self) -> Vec<(u64, Direction)> {
        self.forwarded.lock().unwrap().clone()
    }

    pub fn forwarded_count(&self) -> usize {
        self.forwarded.lock().unwrap().len()
    }

    pub fn dropped(&self) -> Vec<(u64, Direction)> {
        self.dropped.lock().unwrap().clone()
    }
}

impl RelayObserver for RecordingObserver {
    fn token_refreshed(&self, source: &str, _exp_unix_ts: Option<u64>, _elapsed: Duration) {
        self.refreshed.lock().unwrap().push(source.to_owned());
    }

    fn token_refresh_failed(&self, _error: &AuthError, _elapsed: Duration) {
        self.refresh_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn session_started(&self, session_id: u64, _peer: Option<SocketAddr>) {
        self.started.lock().unwrap().push(session_id);
    }

    fn session_ended(&self, session_id: u64, outcome: &SessionOutcome) {
        self.ended.lock().unwrap().push((session_id, outcome.clone()));
    }

    fn message_forwarded(&self, session_id: u64, direction: Direction) {
        self.forwarded.lock().unwrap().push((session_id, direction));
    }

    fn message_dropped(&self, session_id: u64, direction: Direction, _reason: &str) {
        self.dropped.lock().unwrap().push((session_id, direction));
    }
}

/// Poll `condition` until it holds or five seconds pass
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}

// ---------------------------------------------------------------------------
// Mock upstream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    Handshake {
        authorization: Option<String>,
        content_type: Option<String>,
    },
    Received(String),
    Closed,
}

/// How the mock upstream treats each connection.
///
/// Accepted connections first send `greeting`, then either close or answer
/// `{"type":"ping"}` with `{"type":"pong"}` and echo every other frame.
#[derive(Debug, Clone, Default)]
pub struct UpstreamBehavior {
    reject: Option<StatusCode>,
    greeting: Vec<String>,
    close_after_greeting: bool,
}

impl UpstreamBehavior {
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn reject(status: StatusCode) -> Self {
        Self {
            reject: Some(status),
            ..Self::default()
        }
    }

    pub fn greeting(mut self, frames: &[&str]) -> Self {
        self.greeting = frames.iter().map(|f| (*f).to_owned()).collect();
        self
    }

    pub fn close_after_greeting(mut self) -> Self {
        self.close_after_greeting = true;
        self
    }
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    pub events: mpsc::UnboundedReceiver<UpstreamEvent>,
    connections: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("ws://{}/ws/bidi", self.addr)
    }

    /// TCP connections accepted so far, handshake or not
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next event, or None after five quiet seconds
    pub async fn next_event(&mut self) -> Option<UpstreamEvent> {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .ok()
            .flatten()
    }

    /// Skip events until `expected` shows up
    pub async fn wait_for(&mut self, expected: &UpstreamEvent) -> bool {
        while let Some(event) = self.next_event().await {
            if &event == expected {
                return true;
            }
        }
        false
    }
}

pub async fn spawn_upstream(behavior: UpstreamBehavior) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let (events_tx, events) = mpsc::unbounded_channel();
    let connections = Arc::new(AtomicUsize::new(0));

    let counter = connections.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_upstream(stream, behavior.clone(), events_tx.clone()));
        }
    });

    MockUpstream {
        addr,
        events,
        connections,
    }
}

async fn serve_upstream(stream: TcpStream, behavior: UpstreamBehavior, events: mpsc::UnboundedSender<UpstreamEvent>) {
    let reject = behavior.reject;
    let handshake_events = events.clone();
    let callback = move |request: &Request, response: Response| {
        let header = |name: HeaderName| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let _ = handshake_events.send(UpstreamEvent::Handshake {
            authorization: header(AUTHORIZATION),
            content_type: header(CONTENT_TYPE),
        });
        match reject {
            Some(status) => {
                let mut rejection = ErrorResponse::new(Some("rejected by mock upstream".to_owned()));
                *rejection.status_mut() = status;
                Err(rejection)
            }
            None => Ok(response),
        }
    };

    let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
        return;
    };

    for frame in &behavior.greeting {
        if ws.send(Message::text(frame.as_str())).await.is_err() {
            return;
        }
    }

    if behavior.close_after_greeting {
        let _ = ws.close(None).await;
        while let Some(Ok(_)) = ws.next().await {}
    } else {
        while let Some(Ok(message)) = ws.next().await {
            let text = match message {
                Message::Text(text) => text.as_str().to_owned(),
                Message::Close(_) => break,
                _ => continue,
            };
            let _ = events.send(UpstreamEvent::Received(text.clone()));
            let reply = if text == r#"{"type":"ping"}"# {
                r#"{"type":"pong"}"#.to_owned()
            } else {
                text
            };
            if ws.send(Message::text(reply)).await.is_err() {
                break;
            }
        }
    }

    let _ = events.send(UpstreamEvent::Closed);
}

// ---------------------------------------------------------------------------
// Relay under test
// ---------------------------------------------------------------------------

pub struct RunningRelay {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl RunningRelay {
    pub async fn connect(&self) -> ClientStream {
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{}/", self.addr))
            .await
            .expect("client handshake with relay");
        client
    }

    pub async fn stop(mut self) -> anyhow::Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.handle.await.expect("relay task panicked")
    }
}

pub async fn spawn_relay(context: RelayContext) -> RunningRelay {
    let server = ConnectionServer::bind("127.0.0.1:0", context)
        .await
        .expect("bind failed");
    let addr = server.local_addr().unwrap();
    let (shutdown, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async move {
        let _ = stopped.await;
    }));
    RunningRelay {
        addr,
        shutdown: Some(shutdown),
        handle,
    }
}

/// Next text frame from the relay, skipping control frames
pub async fn next_text(client: &mut ClientStream) -> Option<String> {
    let read = async {
        while let Some(Ok(message)) = client.next().await {
            match message {
                Message::Text(text) => return Some(text.as_str().to_owned()),
                Message::Close(_) => return None,
                _ => continue,
            }
        }
        None
    };
    tokio::time::timeout(Duration::from_secs(5), read).await.ok().flatten()
}

/// Close code the relay ended the connection with, if it sent one
pub async fn close_code(client: &mut ClientStream) -> Option<CloseCode> {
    let read = async {
        while let Some(Ok(message)) = client.next().await {
            if let Message::Close(frame) = message {
                return frame.map(|f| f.code);
            }
        }
        None
    };
    tokio::time::timeout(Duration::from_secs(5), read).await.ok().flatten()
}

/// True once the relay has closed the client connection
pub async fn is_closed(client: &mut ClientStream) -> bool {
    let read = async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return true,
                Some(Ok(_)) => continue,
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read).await.unwrap_or(false)
}
