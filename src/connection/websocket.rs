//! Live update channel over WebSocket.

use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

use super::source::{SourceError, UpdateSource, UpdateStream};
use super::state::SourceKind;
use crate::fleet::UpdateEnvelope;

pub struct WebSocketSource {
    url: String,
}

impl WebSocketSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Convert https:// to wss:// or http:// to ws://; bare hosts default to wss://.
pub fn to_ws_url(url: &str) -> Result<String, SourceError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(SourceError::InvalidUrl(url.to_string()));
    }
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(url.to_string())
    } else if let Some(rest) = url.strip_prefix("https://") {
        Ok(format!("wss://{}", rest))
    } else if let Some(rest) = url.strip_prefix("http://") {
        Ok(format!("ws://{}", rest))
    } else if url.contains("://") {
        Err(SourceError::InvalidUrl(url.to_string()))
    } else {
        Ok(format!("wss://{}", url))
    }
}

/// Map one frame to an envelope. Undecodable frames are dropped; close and
/// transport errors end the stream.
fn decode_frame(
    frame: Result<Message, tungstenite::Error>,
) -> Option<Result<UpdateEnvelope, SourceError>> {
    let parsed = match frame {
        Ok(Message::Text(text)) => serde_json::from_str::<UpdateEnvelope>(&text),
        Ok(Message::Binary(bytes)) => serde_json::from_slice::<UpdateEnvelope>(&bytes),
        Ok(Message::Close(_)) => return Some(Err(SourceError::Closed)),
        Ok(_) => return None,
        Err(e) => return Some(Err(SourceError::Transport(e.to_string()))),
    };

    match parsed {
        Ok(envelope) => Some(Ok(envelope)),
        Err(e) => {
            warn!(error = %e, "dropping undecodable update frame");
            None
        }
    }
}

#[async_trait::async_trait]
impl UpdateSource for WebSocketSource {
    fn kind(&self) -> SourceKind {
        SourceKind::WebSocket
    }

    async fn open(&self) -> Result<UpdateStream, SourceError> {
        let url = to_ws_url(&self.url)?;
        debug!(url = %url, "opening live channel");

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| SourceError::Connect(e.to_string()))?;
        let (_, read) = ws_stream.split();

        let stream = read.filter_map(|frame| async move { decode_frame(frame) });
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_urls_are_upgraded() {
        assert_eq!(to_ws_url("https://fleet.example.com/ws").unwrap(), "wss://fleet.example.com/ws");
        assert_eq!(to_ws_url("http://localhost:8787/ws").unwrap(), "ws://localhost:8787/ws");
        assert_eq!(to_ws_url("ws://localhost/ws").unwrap(), "ws://localhost/ws");
        assert_eq!(to_ws_url("fleet.example.com").unwrap(), "wss://fleet.example.com");
    }

    #[test]
    fn unsupported_schemes_are_rejected() {
        assert!(matches!(to_ws_url("ftp://x"), Err(SourceError::InvalidUrl(_))));
        assert!(matches!(to_ws_url("  "), Err(SourceError::InvalidUrl(_))));
    }

    #[test]
    fn text_frames_decode_to_envelopes() {
        let frame = Ok(Message::Text(
            r#"{"type":"proxy_update","timestamp":5,"payload":{"proxies":[]}}"#.to_string(),
        ));
        let envelope = decode_frame(frame).unwrap().unwrap();
        assert_eq!(envelope.timestamp, 5);
        assert_eq!(envelope.payload.proxies, Some(vec![]));
    }

    #[test]
    fn garbage_frames_are_skipped_and_close_ends_stream() {
        assert!(decode_frame(Ok(Message::Text("nope".to_string()))).is_none());
        assert!(decode_frame(Ok(Message::Ping(vec![1]))).is_none());
        assert_eq!(
            decode_frame(Ok(Message::Close(None))),
            Some(Err(SourceError::Closed))
        );
    }

    #[tokio::test]
    async fn open_rejects_invalid_url_without_connecting() {
        let source = WebSocketSource::new("gopher://fleet");
        let err = source.open().await.err().unwrap();
        assert!(matches!(err, SourceError::InvalidUrl(_)));
    }
}
