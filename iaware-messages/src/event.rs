use crate::ConnectionState;

/// Events sent from the client and session to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The connection moved to a new lifecycle state.
    StateChanged(ConnectionState),
    /// The connection finished. Sent once per connection.
    StreamEnded(StreamEnd),
    /// A UI request could not be carried out.
    RequestFailed(String),
}

/// Why a connection reached `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The owner called `terminate()`.
    Terminated,
    /// The device closed the socket.
    Eof,
    /// A socket error ended the receive loop.
    Failed(String),
}

impl std::fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamEnd::Terminated => f.write_str("terminated"),
            StreamEnd::Eof => f.write_str("device closed the connection"),
            StreamEnd::Failed(reason) => write!(f, "socket error: {reason}"),
        }
    }
}
