//! Connection lifecycle and snapshot provenance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a transport client.
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Reconnecting -> Connected
///       ^              |                          |
///       +--------------+                          +-> Failed
/// ```
///
/// `Failed` is terminal until the caller invokes `connect()` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }

    /// States in which `read()` will touch the socket.
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which transport produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum SnapshotSource {
    #[default]
    Tcp,
    SharedMemory,
}
