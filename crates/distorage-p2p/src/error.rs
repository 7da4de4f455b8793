use std::io;

use thiserror::Error;

/// Failure to decode one message from a peer connection.
///
/// Only a disconnect ends the connection; every other variant is treated as
/// a transient read problem and the decode is retried.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("peer disconnected")]
    Disconnected,

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("read error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// Whether the connection is gone: clean EOF, or the socket was closed or
    /// reset underneath the reader.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Disconnected => true,
            Self::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("peer rejected: {0}")]
    PeerRejected(String),

    #[error("delivery channel already consumed")]
    AlreadyConsumed,

    #[error("transport is closed")]
    Closed,

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;
