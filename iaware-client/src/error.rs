use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the streaming client and its codec.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connecting failed, timed out, was refused, or the address did not resolve.
    #[error("connection failed: {0}")]
    Connection(#[source] io::Error),

    /// `connect()` was called while a connection is still active.
    #[error("already connected")]
    AlreadyConnected,

    /// A command could not be written, or the connection is in the wrong state.
    #[error("send failed: {0}")]
    Send(String),

    /// Length prefix, header kind or payload are inconsistent.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The socket is closed. Terminal for the connection.
    #[error("socket closed")]
    SocketClosed,

    /// A ring write supplied the wrong number of channels or unequal sample counts.
    #[error("channel mismatch: {0}")]
    ChannelMismatch(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
