use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fleet::UpdateEnvelope;

/// Lifecycle of the live-update channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
    UsingFallback,
}

impl ConnectionState {
    /// Status label shown on the dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Reconnecting => "Reconnecting",
            ConnectionState::Failed => "Failed",
            ConnectionState::UsingFallback => "UsingFallback",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which kind of update source is (or would be) feeding the manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "websocket")]
    WebSocket,
    #[serde(rename = "mock")]
    Synthetic,
}

/// Status surface for dashboards: `{type, status, lastConnected, ...}`
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub status: ConnectionState,
    pub last_connected: Option<u64>,
    pub reconnect_attempts: u32,
    pub is_connected: bool,
    pub is_using_mock_data: bool,
    pub is_online: bool,
    pub update_count: u64,
    pub last_update: Option<UpdateEnvelope>,
}
