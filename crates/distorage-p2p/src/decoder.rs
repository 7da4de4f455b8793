use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::codec::{frame_len, MessageCodec, FRAME_HEADER_LEN};
use crate::error::DecodeError;
use crate::message::{Message, DEFAULT_RAW_BUFFER_SIZE, MAX_MESSAGE_SIZE};

/// Reads one message off a connection.
#[async_trait]
pub trait Decoder: Send + Sync {
    async fn decode(&self, reader: &mut (dyn AsyncRead + Unpin + Send))
        -> Result<Message, DecodeError>;
}

/// One bounded read per message.
///
/// Whatever a single read returns is the whole payload. Nothing delimits
/// messages: a payload longer than the buffer comes out as several
/// messages, and a short payload split across TCP segments can too.
#[derive(Clone, Debug)]
pub struct RawDecoder {
    buf_size: usize,
}

impl RawDecoder {
    pub fn new(buf_size: usize) -> Self {
        Self {
            buf_size: buf_size.max(1),
        }
    }

    pub fn buf_size(&self) -> usize {
        self.buf_size
    }
}

impl Default for RawDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_RAW_BUFFER_SIZE)
    }
}

#[async_trait]
impl Decoder for RawDecoder {
    async fn decode(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<Message, DecodeError> {
        let mut buf = BytesMut::zeroed(self.buf_size);
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(DecodeError::Disconnected);
        }
        buf.truncate(n);
        Ok(Message::new(buf.freeze()))
    }
}

/// Length-prefixed bincode frames (see [`MessageCodec`]).
///
/// An oversized frame is drained from the stream before the error is
/// returned, so the next decode starts on a frame boundary.
#[derive(Clone, Debug)]
pub struct StructuredDecoder {
    max_size: usize,
}

impl StructuredDecoder {
    pub fn new() -> Self {
        Self::with_max_size(MAX_MESSAGE_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self { max_size }
    }
}

impl Default for StructuredDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Decoder for StructuredDecoder {
    async fn decode(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<Message, DecodeError> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(DecodeError::Disconnected)
            }
            Err(e) => return Err(e.into()),
        }

        let len = frame_len(&header);
        if len > self.max_size {
            let mut body = (&mut *reader).take(len as u64);
            tokio::io::copy(&mut body, &mut tokio::io::sink()).await?;
            return Err(DecodeError::FrameTooLarge {
                size: len,
                max: self.max_size,
            });
        }

        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        MessageCodec::decode_payload(&body)
    }
}

/// Decoder selection for configuration files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    #[default]
    Raw,
    Structured,
}

impl DecoderKind {
    pub fn build(self, raw_buffer_size: usize, max_message_size: usize) -> Arc<dyn Decoder> {
        match self {
            Self::Raw => Arc::new(RawDecoder::new(raw_buffer_size)),
            Self::Structured => Arc::new(StructuredDecoder::with_max_size(max_message_size)),
        }
    }
}

impl std::str::FromStr for DecoderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "structured" => Ok(Self::Structured),
            other => Err(format!("unknown decoder: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};

    #[tokio::test]
    async fn raw_reads_what_arrived() {
        let (mut client, mut server) = duplex(64);
        client.write_all(b"hello").await.unwrap();
        let msg = RawDecoder::default().decode(&mut server).await.unwrap();
        assert_eq!(msg.payload.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn raw_splits_payloads_larger_than_buffer() {
        let (mut client, mut server) = duplex(64);
        client.write_all(b"abcdefgh").await.unwrap();
        let decoder = RawDecoder::new(4);
        let first = decoder.decode(&mut server).await.unwrap();
        let second = decoder.decode(&mut server).await.unwrap();
        assert_eq!(first.payload.as_ref(), b"abcd");
        assert_eq!(second.payload.as_ref(), b"efgh");
    }

    #[tokio::test]
    async fn raw_eof_is_disconnect() {
        let (client, mut server) = duplex(64);
        drop(client);
        let err = RawDecoder::default().decode(&mut server).await.unwrap_err();
        assert!(matches!(err, DecodeError::Disconnected));
    }

    #[tokio::test]
    async fn structured_decodes_consecutive_frames() {
        let (mut client, mut server) = duplex(256);
        for payload in [&b"first"[..], &b"second"[..]] {
            let frame = MessageCodec::encode(&Message::new(payload)).unwrap();
            client.write_all(&frame).await.unwrap();
        }
        let decoder = StructuredDecoder::new();
        assert_eq!(decoder.decode(&mut server).await.unwrap().payload.as_ref(), b"first");
        assert_eq!(decoder.decode(&mut server).await.unwrap().payload.as_ref(), b"second");
    }

    #[tokio::test]
    async fn structured_skips_oversized_frame() {
        let (mut client, mut server) = duplex(1024);
        let big = MessageCodec::encode(&Message::new(vec![7u8; 100])).unwrap();
        let small = MessageCodec::encode(&Message::new(&b"ok"[..])).unwrap();
        client.write_all(&big).await.unwrap();
        client.write_all(&small).await.unwrap();

        let decoder = StructuredDecoder::with_max_size(16);
        let err = decoder.decode(&mut server).await.unwrap_err();
        assert!(matches!(err, DecodeError::FrameTooLarge { size: 108, max: 16 }));
        assert_eq!(decoder.decode(&mut server).await.unwrap().payload.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn structured_garbage_is_transient() {
        let (mut client, mut server) = duplex(256);
        client.write_all(&3u32.to_be_bytes()).await.unwrap();
        client.write_all(&[1, 2, 3]).await.unwrap();
        let good = MessageCodec::encode(&Message::new(&b"after"[..])).unwrap();
        client.write_all(&good).await.unwrap();

        let decoder = StructuredDecoder::new();
        let err = decoder.decode(&mut server).await.unwrap_err();
        assert!(matches!(err, DecodeError::Deserialization(_)));
        assert!(!err.is_disconnect());
        assert_eq!(decoder.decode(&mut server).await.unwrap().payload.as_ref(), b"after");
    }

    #[tokio::test]
    async fn structured_eof_mid_frame_is_disconnect() {
        let (mut client, mut server) = duplex(256);
        client.write_all(&10u32.to_be_bytes()).await.unwrap();
        client.write_all(&[0u8; 3]).await.unwrap();
        drop(client);
        let err = StructuredDecoder::new().decode(&mut server).await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[test]
    fn kind_parses() {
        assert_eq!("raw".parse::<DecoderKind>().unwrap(), DecoderKind::Raw);
        assert_eq!(
            "Structured".parse::<DecoderKind>().unwrap(),
            DecoderKind::Structured
        );
        assert!("gob".parse::<DecoderKind>().is_err());
    }
}
