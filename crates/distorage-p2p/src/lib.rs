//! Peer transport for distorage nodes.
//!
//! A [`TcpTransport`] listens on one address, accepts connections in a
//! background task and gives every connection its own task. Each connection
//! runs a pluggable [`Handshake`], an optional [`PeerObserver`], and then a
//! [`Decoder`] loop whose messages are stamped with the sender address and
//! pushed onto one delivery channel as [`Envelope`]s.
//!
//! # Wire formats
//!
//! - **raw** ([`RawDecoder`]): one socket read is one message. Nothing
//!   delimits messages, so large or fragmented payloads split arbitrarily.
//! - **structured** ([`StructuredDecoder`]): `[u32 BE length][bincode]`
//!   frames produced by [`MessageCodec`].

pub mod codec;
pub mod config;
pub mod decoder;
pub mod error;
pub mod handshake;
pub mod message;
pub mod peer;
pub mod transport;

pub use codec::MessageCodec;
pub use config::{TransportConfig, DEFAULT_LISTEN_ADDR};
pub use decoder::{Decoder, DecoderKind, RawDecoder, StructuredDecoder};
pub use error::{DecodeError, TransportError, TransportResult};
pub use handshake::{
    Handshake, HandshakeKind, HelloHandshake, NopHandshake, PeerObserver, HELLO_MAGIC,
};
pub use message::{
    Envelope, Message, DEFAULT_RAW_BUFFER_SIZE, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
pub use peer::{Direction, Peer, TcpPeer};
pub use transport::{Acceptor, TcpTransport, TcpTransportOpts, Transport};
