/// Lifecycle of one streaming connection.
///
/// `Disconnected -> Connecting -> Streaming -> Stopping -> Closed`.
/// `Closed` is terminal for a connection; reconnecting starts a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Streaming,
    Stopping,
    Closed,
}

impl ConnectionState {
    /// Whether commands may be written to the device in this state.
    pub const fn accepts_commands(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Streaming)
    }

    /// Whether a connection in this state still owns a socket or a receive loop.
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Streaming | ConnectionState::Stopping
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Stopping => "stopping",
            ConnectionState::Closed => "closed",
        };
        f.write_str(label)
    }
}
