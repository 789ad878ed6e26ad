//! One-direction forwarding loop.
//!
//! Receives one message, forwards at most one message, then receives the
//! next; nothing is buffered. The loop only borrows the two connection
//! halves; the session owns them.

use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::value::RawValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use crate::observability::events::RelayObserver;
use crate::relay::Direction;

/// Why a forwarding loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardEnd {
    /// source sent a close frame or the stream ended
    SourceClosed,
    /// source transport failed (reset, protocol error)
    SourceFailed(String),
    /// destination refused a send
    DestinationGone(String),
}

/// Pump messages from `source` to `destination` until either side is gone.
///
/// Text and binary frames must hold a JSON document; anything else is
/// dropped and reported to the observer. Valid documents are forwarded as
/// text frames with their exact JSON text. On exit the destination is
/// closed (closing twice is harmless).
pub async fn forward<S, D>(
    session_id: u64,
    direction: Direction,
    source: &mut S,
    destination: &mut D,
    observer: &dyn RelayObserver,
) -> ForwardEnd
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
    D: Sink<Message, Error = WsError> + Unpin,
{
    let end = loop {
        let message = match source.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => break ForwardEnd::SourceFailed(e.to_string()),
            None => break ForwardEnd::SourceClosed,
        };

        let payload = match extract_json(&message) {
            Payload::Json(json) => json,
            Payload::Malformed(reason) => {
                observer.message_dropped(session_id, direction, &reason);
                continue;
            }
            Payload::Control => continue,
            Payload::Close => break ForwardEnd::SourceClosed,
        };

        if let Err(e) = destination.send(Message::text(payload)).await {
            break ForwardEnd::DestinationGone(e.to_string());
        }
        observer.message_forwarded(session_id, direction);
    };

    if let Err(e) = destination.close().await {
        debug!(session_id, direction = %direction, "destination already closed: {}", e);
    }
    debug!(session_id, direction = %direction, end = ?end, "forwarding loop finished");
    end
}

enum Payload {
    Json(String),
    Malformed(String),
    Control,
    Close,
}

fn extract_json(message: &Message) -> Payload {
    let text = match message {
        Message::Text(text) => text.as_str(),
        Message::Binary(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => return Payload::Malformed(format!("binary frame is not UTF-8: {}", e)),
        },
        Message::Close(_) => return Payload::Close,
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => return Payload::Control,
    };

    match serde_json::from_str::<&RawValue>(text) {
        Ok(raw) => Payload::Json(raw.get().to_owned()),
        Err(e) => Payload::Malformed(e.to_string()),
    }
}
