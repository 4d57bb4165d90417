//! Encoding and decoding of messages, in memory and over byte streams.

use crate::error::ProtocolError;
use crate::frame::{Frame, LENGTH_PREFIX_SIZE};
use crate::message::Message;
use bytes::BytesMut;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Encodes messages into frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a message into a complete frame.
    pub fn encode(message: &Message) -> Result<BytesMut, ProtocolError> {
        Frame::from_message(message)?.encode()
    }
}

/// Incremental decoder for callers that buffer bytes themselves.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer)
    }

    /// Attempts to decode the next message from the buffer.
    pub fn decode_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        match self.decode_frame()? {
            Some(frame) => frame.to_message().map(Some),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads exactly one frame from `reader` and parses it.
///
/// End of stream inside the prefix or the payload is reported as
/// `ConnectionClosed`. A prefix below the minimum is rejected before any
/// payload byte is read. An oversized payload is skipped without buffering
/// it, so the next read starts at the following frame.
pub async fn read_message<R>(reader: &mut R) -> Result<Message, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
    read_exact_or_closed(reader, &mut len_buf).await?;

    let len = u32::from_be_bytes(len_buf);
    if let Err(e) = Frame::check_length(len) {
        if matches!(e, ProtocolError::FrameTooLarge { .. }) {
            skip_payload(reader, len).await?;
        }
        return Err(e);
    }

    let mut payload = vec![0u8; len as usize];
    read_exact_or_closed(reader, &mut payload).await?;

    Message::from_slice(&payload)
}

/// Writes one framed message to `writer` and flushes it.
///
/// The writer is left open.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let encoded = Encoder::encode(message)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

async fn skip_payload<R>(reader: &mut R, len: u32) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut payload = (&mut *reader).take(u64::from(len));
    let skipped = tokio::io::copy(&mut payload, &mut tokio::io::sink()).await?;
    if skipped < u64::from(len) {
        return Err(ProtocolError::ConnectionClosed);
    }
    Ok(())
}

async fn read_exact_or_closed<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(ProtocolError::ConnectionClosed),
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Map, Value};
    use std::io::Cursor;

    #[tokio::test]
    async fn test_write_and_read_message() {
        let message = Message::request(1).with("a", 5).with("b", 10.5);

        let mut buffer = Vec::new();
        write_message(&mut buffer, &message).await.unwrap();

        let payload = br#"{"operation":1,"a":5,"b":10.5}"#;
        assert_eq!(&buffer[..4], &(payload.len() as u32).to_be_bytes());
        assert_eq!(&buffer[4..], payload);

        let mut cursor = Cursor::new(buffer);
        let decoded = read_message(&mut cursor).await.unwrap();
        assert_eq!(decoded, message);
    }

    #[tokio::test]
    async fn test_read_sequential_messages() {
        let mut buffer = Vec::new();
        for i in 0..3 {
            write_message(&mut buffer, &Message::new().with("seq", i))
                .await
                .unwrap();
        }

        let mut cursor = Cursor::new(buffer);
        for i in 0..3 {
            let msg = read_message(&mut cursor).await.unwrap();
            assert_eq!(msg.get("seq"), Some(&json!(i)));
        }
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_short_length_consumes_only_prefix() {
        let mut data = 1u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"{}");

        let mut cursor = Cursor::new(data);
        let result = read_message(&mut cursor).await;
        assert!(matches!(result, Err(ProtocolError::InvalidLength(1))));
        assert_eq!(cursor.position(), 4);
    }

    #[tokio::test]
    async fn test_read_oversized_frame_is_skipped() {
        let len = crate::MAX_PAYLOAD_SIZE + 1;
        let mut data = len.to_be_bytes().to_vec();
        data.resize(LENGTH_PREFIX_SIZE + len as usize, b' ');
        write_message(&mut data, &Message::request(1).with("a", 3))
            .await
            .unwrap();

        let mut cursor = Cursor::new(data);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::FrameTooLarge { .. })
        ));
        assert_eq!(cursor.position(), (LENGTH_PREFIX_SIZE + len as usize) as u64);

        // The stream is still aligned on the next frame
        let next = read_message(&mut cursor).await.unwrap();
        assert_eq!(next.operation(), Ok(1));
    }

    #[tokio::test]
    async fn test_read_oversized_frame_truncated() {
        let mut data = (crate::MAX_PAYLOAD_SIZE + 1).to_be_bytes().to_vec();
        data.extend_from_slice(&[b' '; 72]);

        let mut cursor = Cursor::new(data);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_float_values_survive_the_wire() {
        let values = [
            1.0715660391465826e-75,
            11.629703349613008,
            0.1 + 0.2,
            f64::MIN_POSITIVE,
            f64::MAX,
            -2.5e-308,
        ];

        let mut buffer = Vec::new();
        for value in values {
            write_message(&mut buffer, &Message::new().with("b", value))
                .await
                .unwrap();
        }

        let mut cursor = Cursor::new(buffer);
        for value in values {
            let decoded = read_message(&mut cursor).await.unwrap();
            assert_eq!(decoded.get("b").and_then(|b| b.as_f64()), Some(value));
        }
    }

    #[tokio::test]
    async fn test_read_truncated_payload_is_disconnect() {
        let mut data = 20u32.to_be_bytes().to_vec();
        data.extend_from_slice(br#"{"operation""#);

        let mut cursor = Cursor::new(data);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::ConnectionClosed)
        ));

        let mut cursor = Cursor::new(vec![0u8, 0]);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_malformed_json() {
        let payload = br#"{"operation":"#;
        let mut data = (payload.len() as u32).to_be_bytes().to_vec();
        data.extend_from_slice(payload);

        let mut cursor = Cursor::new(data);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::Json(_))
        ));
        // The whole frame was consumed, so the stream is still aligned
        assert_eq!(cursor.position() as usize, 4 + payload.len());
    }

    #[tokio::test]
    async fn test_read_array_payload() {
        let mut data = 2u32.to_be_bytes().to_vec();
        data.extend_from_slice(b"[]");

        let mut cursor = Cursor::new(data);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::NotAnObject)
        ));
    }

    #[test]
    fn test_partial_frame_decoding() {
        let encoded = Encoder::encode(&Message::request(1).with("a", 3)).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded[..6]);
        assert!(decoder.decode_message().unwrap().is_none());

        decoder.extend(&encoded[6..]);
        let decoded = decoder.decode_message().unwrap().unwrap();
        assert_eq!(decoded.operation(), Ok(1));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_clear() {
        let mut decoder = Decoder::default();
        decoder.extend(b"some data");
        assert_eq!(decoder.buffered(), 9);
        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<f64>()
                .prop_filter("finite", |f| f.is_finite())
                .prop_map(Value::from),
            ".*".prop_map(Value::from),
        ]
    }

    fn value() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::vec(("[a-z_]{1,8}", inner), 0..6)
                    .prop_map(|fields| Value::Object(fields.into_iter().collect())),
            ]
        })
    }

    fn message() -> impl Strategy<Value = Message> {
        prop::collection::vec(("[a-z_]{1,12}", value()), 0..8).prop_map(|fields| {
            let mut map = Map::new();
            for (key, value) in fields {
                map.insert(key, value);
            }
            Message::from(map)
        })
    }

    proptest! {
        #[test]
        fn prop_encode_decode_is_identity(msg in message()) {
            let encoded = Encoder::encode(&msg).unwrap();
            let mut decoder = Decoder::new();
            decoder.extend(&encoded);
            let decoded = decoder.decode_message().unwrap().unwrap();
            prop_assert_eq!(decoded, msg);
            prop_assert_eq!(decoder.buffered(), 0);
        }
    }
}
