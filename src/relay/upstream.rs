use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::SessionError;

pub type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handshake request carrying the bearer token
pub fn build_request(url: &str, token: &str) -> Result<Request, SessionError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| SessionError::InvalidUpstream(e.to_string()))?;

    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| SessionError::InvalidUpstream(format!("bearer token is not a valid header value: {}", e)))?;
    bearer.set_sensitive(true);

    let headers = request.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(AUTHORIZATION, bearer);
    Ok(request)
}

/// Open the upstream connection.
///
/// A non-success handshake status becomes `UpstreamRejected`; anything that
/// prevents the handshake from completing becomes `UpstreamUnavailable`.
pub async fn connect_upstream(url: &str, token: &str) -> Result<UpstreamStream, SessionError> {
    let request = build_request(url, token)?;

    match connect_async(request).await {
        Ok((stream, response)) => {
            debug!(status = %response.status(), "upstream handshake completed");
            Ok(stream)
        }
        Err(WsError::Http(response)) => Err(SessionError::UpstreamRejected {
            status: response.status(),
        }),
        Err(e) => Err(SessionError::UpstreamUnavailable(e.to_string())),
    }
}
