use serde::{Deserialize, Serialize};

use crate::decoder::DecoderKind;
use crate::handshake::HandshakeKind;
use crate::message::{DEFAULT_RAW_BUFFER_SIZE, MAX_MESSAGE_SIZE};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

/// Transport settings as they appear in a node configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// `host:port` to listen on.
    pub listen_addr: String,
    pub decoder: DecoderKind,
    pub handshake: HandshakeKind,
    /// Read size of the raw decoder.
    pub raw_buffer_size: usize,
    /// Largest structured frame accepted.
    pub max_message_size: usize,
    /// Capacity of the delivery channel. 1 makes every publish wait for the
    /// consumer.
    pub channel_capacity: usize,
    /// Cap on concurrently handled connections; unset is unbounded.
    pub max_connections: Option<usize>,
    /// Deadline for the handshake; unset waits forever.
    pub handshake_timeout_ms: Option<u64>,
    /// Consecutive failed decodes after which a connection is dropped.
    /// 0, the default, retries forever; only a disconnect ends a connection.
    pub max_consecutive_decode_errors: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            decoder: DecoderKind::default(),
            handshake: HandshakeKind::default(),
            raw_buffer_size: DEFAULT_RAW_BUFFER_SIZE,
            max_message_size: MAX_MESSAGE_SIZE,
            channel_capacity: 1,
            max_connections: None,
            handshake_timeout_ms: None,
            max_consecutive_decode_errors: 0,
        }
    }
}
