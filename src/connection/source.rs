//! The "update source" seam: anything that can open a stream of update envelopes.

use futures::stream::BoxStream;

use super::backoff::IsRetryable;
use super::state::SourceKind;
use crate::fleet::UpdateEnvelope;

/// Stream of envelopes from an open source. An `Err` item ends the connection.
pub type UpdateStream = BoxStream<'static, Result<UpdateEnvelope, SourceError>>;

/// Errors that can occur while opening or reading an update source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    InvalidUrl(String),
    Connect(String),
    Timeout,
    Transport(String),
    Closed,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::InvalidUrl(url) => write!(f, "invalid channel url: {}", url),
            SourceError::Connect(msg) => write!(f, "connect failed: {}", msg),
            SourceError::Timeout => write!(f, "channel open timed out"),
            SourceError::Transport(msg) => write!(f, "transport error: {}", msg),
            SourceError::Closed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for SourceError {}

impl IsRetryable for SourceError {
    fn is_retryable(&self) -> bool {
        !matches!(self, SourceError::InvalidUrl(_))
    }
}

/// Opens update streams. The live channel and the synthetic generator both
/// implement this, so the manager swaps them without special cases.
#[async_trait::async_trait]
pub trait UpdateSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn open(&self) -> Result<UpdateStream, SourceError>;
}

/// Receives every envelope the manager delivers, in delivery order.
#[async_trait::async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle_update(&self, envelope: &UpdateEnvelope);
}
