use std::net::SocketAddr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Read size of the raw decoder when none is configured.
pub const DEFAULT_RAW_BUFFER_SIZE: usize = 1028;

/// What travels on the wire: an opaque payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub payload: Bytes,
}

impl Message {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// A decoded message tagged with the address of the connection it came in on.
///
/// Only the transport builds envelopes, after a decode succeeds; decoders
/// produce bare [`Message`]s and never see the sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    from: SocketAddr,
    payload: Bytes,
}

impl Envelope {
    pub(crate) fn new(from: SocketAddr, message: Message) -> Self {
        Self {
            from,
            payload: message.payload,
        }
    }

    /// Remote address of the sending connection.
    pub fn from(&self) -> SocketAddr {
        self.from
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bytes from {}", self.payload.len(), self.from)
    }
}
