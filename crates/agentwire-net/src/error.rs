use std::net::SocketAddrV4;

use agentwire_buffer::BufferError;

/// Errors that can occur on the TCP endpoint.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Failed to bind the listening socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddrV4,
        source: std::io::Error,
    },

    /// Failed to connect to the peer (non-recoverable cause).
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddrV4,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// A socket call failed non-recoverably.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A buffer view operation failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// A message operation was attempted with no connection.
    #[error("no active connection")]
    NotConnected,

    /// The supplied buffer cannot hold the message.
    #[error("message buffer too small ({required} bytes required, {available} available)")]
    BufferTooSmall { required: usize, available: usize },

    /// The preamble declares a length shorter than itself.
    #[error("declared frame length {length} is shorter than the preamble")]
    InvalidFrameLength { length: usize },
}

pub type Result<T> = std::result::Result<T, NetError>;
