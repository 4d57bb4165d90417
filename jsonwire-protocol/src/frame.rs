//! Length-prefixed frame format.
//!
//! ```text
//! +-------------+--------------------------------+
//! | length      | payload                        |
//! | 4 bytes BE  | length bytes of UTF-8 JSON     |
//! +-------------+--------------------------------+
//! ```
//!
//! The length counts payload bytes only and must be at least 2, the size of
//! the smallest JSON object (`{}`).

use crate::error::ProtocolError;
use crate::message::Message;
use crate::{MAX_PAYLOAD_SIZE, MIN_PAYLOAD_SIZE};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// A single frame: the raw JSON payload without its length prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame with the given payload.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Creates a frame carrying a serialized message.
    pub fn from_message(message: &Message) -> Result<Self, ProtocolError> {
        Ok(Self::new(Bytes::from(message.to_vec()?)))
    }

    /// Validates a length prefix.
    pub fn check_length(len: u32) -> Result<(), ProtocolError> {
        if len < MIN_PAYLOAD_SIZE {
            return Err(ProtocolError::InvalidLength(len));
        }
        if len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(())
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let len = u32::try_from(self.payload.len()).map_err(|_| ProtocolError::FrameTooLarge {
            size: u32::MAX,
            max: MAX_PAYLOAD_SIZE,
        })?;
        Self::check_length(len)?;

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + self.payload.len());
        buf.put_u32(len);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    /// An invalid length prefix is consumed; the bytes after it are not.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if let Err(e) = Self::check_length(len) {
            buf.advance(LENGTH_PREFIX_SIZE);
            return Err(e);
        }

        let total_len = LENGTH_PREFIX_SIZE + len as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX_SIZE);
        let payload = buf.split_to(len as usize).freeze();
        Ok(Some(Self { payload }))
    }

    /// Parses the payload as a message.
    pub fn to_message(&self) -> Result<Message, ProtocolError> {
        Message::from_slice(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let frame = Frame::new(Bytes::from(r#"{"operation":0}"#));
        let encoded = frame.encode().unwrap();

        assert_eq!(&encoded[..4], &[0, 0, 0, 15]);
        assert_eq!(&encoded[4..], br#"{"operation":0}"#);
    }

    #[test]
    fn test_frame_roundtrip() {
        let payload = Bytes::from(r#"{"operation":1,"a":3,"b":4}"#);
        let mut buf = Frame::new(payload.clone()).encode().unwrap();

        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.payload, payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_minimal_payload() {
        let mut buf = Frame::new(Bytes::from("{}")).encode().unwrap();
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(decoded.to_message().unwrap().is_empty());
    }

    #[test]
    fn test_short_length_consumes_only_prefix() {
        for len in [0u32, 1] {
            let mut buf = BytesMut::new();
            buf.put_u32(len);
            buf.put_slice(b"{}");

            let result = Frame::decode(&mut buf);
            assert!(matches!(result, Err(ProtocolError::InvalidLength(l)) if l == len));
            assert_eq!(&buf[..], b"{}");
        }
    }

    #[test]
    fn test_encode_rejects_short_payload() {
        let result = Frame::new(Bytes::from("1")).encode();
        assert!(matches!(result, Err(ProtocolError::InvalidLength(1))));
    }

    #[test]
    fn test_incomplete_frame() {
        let mut buf = BytesMut::from(&[0u8, 0, 0][..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());

        let mut buf = BytesMut::from(&b"\x00\x00\x00\x0a{\"a\":"[..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
        // Nothing consumed while waiting for the rest
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn test_frame_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32(MAX_PAYLOAD_SIZE + 1);
        let result = Frame::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));

        let huge_payload = vec![b' '; (MAX_PAYLOAD_SIZE + 1) as usize];
        let result = Frame::new(Bytes::from(huge_payload)).encode();
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let frame1 = Frame::new(Bytes::from(r#"{"id":"1"}"#));
        let frame2 = Frame::new(Bytes::from(r#"{"id":"2"}"#));

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&frame1.encode().unwrap());
        buf.extend_from_slice(&frame2.encode().unwrap());

        assert_eq!(Frame::decode(&mut buf).unwrap().unwrap(), frame1);
        assert_eq!(Frame::decode(&mut buf).unwrap().unwrap(), frame2);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_from_message() {
        let frame = Frame::from_message(&Message::shutdown()).unwrap();
        assert_eq!(frame.payload.as_ref(), br#"{"operation":0}"#);
        assert_eq!(frame.to_message().unwrap(), Message::shutdown());
    }
}
