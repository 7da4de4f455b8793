use crate::error::{DecodeError, TransportError, TransportResult};
use crate::message::{Message, MAX_MESSAGE_SIZE};

/// Size of the big-endian length prefix in front of every structured frame.
pub const FRAME_HEADER_LEN: usize = 4;

/// Codec for the structured wire format: `[4 bytes len][bincode(Message)]`.
///
/// The raw format has no codec; a raw frame is whatever bytes one read
/// returned.
pub struct MessageCodec;

impl MessageCodec {
    /// Encode a message with its length prefix.
    pub fn encode(msg: &Message) -> TransportResult<Vec<u8>> {
        let body = Self::encode_payload(msg)?;
        if body.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::MessageTooLarge {
                size: body.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
        buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Decode one framed message from the front of `data`.
    /// Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> Result<(Message, usize), DecodeError> {
        let Some(header) = data.get(..FRAME_HEADER_LEN) else {
            return Err(DecodeError::Deserialization("truncated frame header".into()));
        };
        let len = frame_len(header);
        if len > MAX_MESSAGE_SIZE {
            return Err(DecodeError::FrameTooLarge {
                size: len,
                max: MAX_MESSAGE_SIZE,
            });
        }
        let total = FRAME_HEADER_LEN + len;
        let Some(body) = data.get(FRAME_HEADER_LEN..total) else {
            return Err(DecodeError::Deserialization(format!(
                "incomplete frame: have {}, need {}",
                data.len(),
                total
            )));
        };
        Ok((Self::decode_payload(body)?, total))
    }

    /// Encode payload only (no framing).
    pub fn encode_payload(msg: &Message) -> TransportResult<Vec<u8>> {
        bincode::serialize(msg).map_err(|e| TransportError::Serialization(e.to_string()))
    }

    /// Decode payload only (no framing).
    pub fn decode_payload(data: &[u8]) -> Result<Message, DecodeError> {
        bincode::deserialize(data).map_err(|e| DecodeError::Deserialization(e.to_string()))
    }
}

pub(crate) fn frame_len(header: &[u8]) -> usize {
    let mut len = [0u8; FRAME_HEADER_LEN];
    len.copy_from_slice(&header[..FRAME_HEADER_LEN]);
    u32::from_be_bytes(len) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout() {
        let msg = Message::new(&b"abc"[..]);
        let frame = MessageCodec::encode(&msg).unwrap();
        // bincode: u64 length + 3 bytes
        assert_eq!(&frame[..4], &11u32.to_be_bytes());
        assert_eq!(frame.len(), 4 + 11);

        let (decoded, consumed) = MessageCodec::decode(&frame).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn decode_back_to_back_frames() {
        let mut buf = MessageCodec::encode(&Message::new(&b"one"[..])).unwrap();
        buf.extend(MessageCodec::encode(&Message::new(&b"two"[..])).unwrap());

        let (first, used) = MessageCodec::decode(&buf).unwrap();
        let (second, rest) = MessageCodec::decode(&buf[used..]).unwrap();
        assert_eq!(first.payload.as_ref(), b"one");
        assert_eq!(second.payload.as_ref(), b"two");
        assert_eq!(used + rest, buf.len());
    }

    #[test]
    fn decode_truncated() {
        assert!(matches!(
            MessageCodec::decode(&[0, 0]).unwrap_err(),
            DecodeError::Deserialization(_)
        ));
        let frame = MessageCodec::encode(&Message::new(&b"abc"[..])).unwrap();
        assert!(matches!(
            MessageCodec::decode(&frame[..frame.len() - 1]).unwrap_err(),
            DecodeError::Deserialization(_)
        ));
    }

    #[test]
    fn decode_oversized_header() {
        let err = MessageCodec::decode(&u32::MAX.to_be_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::FrameTooLarge { .. }));
    }
}
