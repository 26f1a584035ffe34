//! Live-update connection lifecycle: sources, reconnect policy and the manager
//! state machine.

mod backoff;
mod config;
mod manager;
mod source;
mod state;
mod synthetic;
mod websocket;

pub use backoff::{BackoffStrategy, IsRetryable, ReconnectPolicy};
pub use config::{ConnectionConfig, DEFAULT_URL};
pub use manager::ConnectionManager;
pub use source::{SourceError, UpdateHandler, UpdateSource, UpdateStream};
pub use state::{ConnectionInfo, ConnectionState, SourceKind};
pub use synthetic::{SyntheticSource, DEFAULT_PROXY_COUNT};
pub use websocket::{to_ws_url, WebSocketSource};
