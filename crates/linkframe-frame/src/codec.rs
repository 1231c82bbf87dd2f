use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::encoding::TextEncoding;
use crate::error::{FrameError, Result};

/// Frame header: a single unsigned length byte.
pub const HEADER_SIZE: usize = 1;

/// Largest payload a single-byte length prefix can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// One length-prefixed unit of the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The raw payload, exactly as many bytes as the length prefix said.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Decode the payload as text.
    pub fn text(&self, encoding: TextEncoding) -> Result<String> {
        encoding.decode(&self.payload)
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬─────────────────────┐
/// │ Len (1B) │ Payload (Len bytes) │
/// └──────────┴─────────────────────┘
/// ```
///
/// No magic, checksum or escaping; frames follow each other directly.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::OversizedCommand {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `None` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. Every length byte is
/// valid, so decoding itself cannot fail.
pub fn decode_frame(src: &mut BytesMut) -> Option<Frame> {
    let payload_len = *src.first()? as usize;
    if src.len() < HEADER_SIZE + payload_len {
        return None;
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    Some(Frame { payload })
}

/// What to do with a command whose encoding is longer than the limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OversizePolicy {
    /// Refuse to send it; nothing reaches the wire.
    #[default]
    Reject,
    /// Send the longest prefix that fits, cut between characters.
    Truncate,
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum outbound payload in bytes. Values above 255 are clamped.
    /// Lower it when the peer's receive buffer is smaller than a full frame.
    pub max_payload_size: usize,
    /// Text encoding for both directions.
    pub encoding: TextEncoding,
    /// Handling of commands that encode past `max_payload_size`.
    pub oversize_policy: OversizePolicy,
}

impl FrameConfig {
    /// The limit actually enforced on outbound payloads.
    pub fn effective_max_payload(&self) -> usize {
        self.max_payload_size.min(MAX_PAYLOAD)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            encoding: TextEncoding::default(),
            oversize_policy: OversizePolicy::default(),
        }
    }
}

/// Encode an outbound command into a frame payload, applying the size limit.
///
/// The length is measured on the encoded bytes, never on characters.
pub fn encode_command(command: &str, config: &FrameConfig) -> Result<Bytes> {
    let max = config.effective_max_payload();
    let size = config.encoding.measure(command);
    if size <= max {
        return Ok(Bytes::from(config.encoding.encode(command)));
    }

    match config.oversize_policy {
        OversizePolicy::Reject => Err(FrameError::OversizedCommand { size, max }),
        OversizePolicy::Truncate => {
            let prefix = config.encoding.truncated_prefix(command, max);
            let payload = config.encoding.encode(prefix);
            warn!(size, sent = payload.len(), max, "truncating oversized command");
            Ok(Bytes::from(payload))
        }
    }
}

/// `tokio_util` codec for the length-prefixed format.
///
/// Decodes into [`Frame`]s; encodes frames, enforcing the configured payload
/// limit.
#[derive(Debug, Clone, Default)]
pub struct LinkCodec {
    config: FrameConfig,
}

impl LinkCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for LinkCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let frame = decode_frame(src);
        if frame.is_none() {
            if let Some(&len) = src.first() {
                src.reserve(HEADER_SIZE + len as usize - src.len());
            }
        }
        Ok(frame)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        match src.first() {
            None => Ok(None),
            Some(&len) => Err(FrameError::Truncated {
                expected: len as usize,
                received: src.len() - HEADER_SIZE,
            }),
        }
    }
}

impl Encoder<Frame> for LinkCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let max = self.config.effective_max_payload();
        if frame.len() > max {
            return Err(FrameError::OversizedCommand {
                size: frame.len(),
                max,
            });
        }
        encode_frame(&frame.payload, dst)
    }
}

impl Encoder<&str> for LinkCodec {
    type Error = FrameError;

    fn encode(&mut self, command: &str, dst: &mut BytesMut) -> Result<()> {
        let payload = encode_command(command, &self.config)?;
        encode_frame(&payload, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"LED ON";

        encode_frame(payload, &mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE + payload.len());
        assert_eq!(buf[0], 6);

        let frame = decode_frame(&mut buf).unwrap();
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_roundtrip_every_length() {
        for len in 0..=MAX_PAYLOAD {
            let text = "x".repeat(len);
            let mut buf = BytesMut::new();
            encode_frame(text.as_bytes(), &mut buf).unwrap();
            let frame = decode_frame(&mut buf).unwrap();
            assert_eq!(frame.text(TextEncoding::Utf8).unwrap(), text);
        }
    }

    #[test]
    fn test_decode_empty_buffer() {
        let mut buf = BytesMut::new();
        assert!(decode_frame(&mut buf).is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        assert!(decode_frame(&mut buf).is_none());
        // Nothing consumed while incomplete.
        assert_eq!(buf.len(), HEADER_SIZE + 2);
    }

    #[test]
    fn test_encode_rejects_over_255() {
        let mut buf = BytesMut::new();
        let err = encode_frame(&[b'a'; 256], &mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::OversizedCommand {
                size: 256,
                max: 255
            }
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(b"A", &mut buf).unwrap();
        encode_frame(b"BC", &mut buf).unwrap();
        encode_frame(b"DEF", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"\x01A\x02BC\x03DEF");

        assert_eq!(decode_frame(&mut buf).unwrap().payload.as_ref(), b"A");
        assert_eq!(decode_frame(&mut buf).unwrap().payload.as_ref(), b"BC");
        assert_eq!(decode_frame(&mut buf).unwrap().payload.as_ref(), b"DEF");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::from(&[0x00][..]);
        let frame = decode_frame(&mut buf).unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.text(TextEncoding::Utf8).unwrap(), "");
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::new(Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), HEADER_SIZE + 4);
    }

    #[test]
    fn test_encode_command_measures_bytes() {
        let config = FrameConfig::default();
        // 128 two-byte characters: 128 chars, 256 bytes.
        let command = "é".repeat(128);
        let err = encode_command(&command, &config).unwrap_err();
        assert!(matches!(
            err,
            FrameError::OversizedCommand {
                size: 256,
                max: 255
            }
        ));

        let fits = "é".repeat(127);
        assert_eq!(encode_command(&fits, &config).unwrap().len(), 254);
    }

    #[test]
    fn test_encode_command_truncate_policy() {
        let config = FrameConfig {
            oversize_policy: OversizePolicy::Truncate,
            ..FrameConfig::default()
        };
        let command = "é".repeat(128);
        let payload = encode_command(&command, &config).unwrap();
        assert_eq!(payload.len(), 254);
        assert_eq!(
            TextEncoding::Utf8.decode(&payload).unwrap(),
            "é".repeat(127)
        );

        // Deterministic: same input, same output.
        assert_eq!(encode_command(&command, &config).unwrap(), payload);
    }

    #[test]
    fn test_configured_limit_below_255() {
        let config = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        assert!(encode_command("1234", &config).is_ok());
        assert!(matches!(
            encode_command("12345", &config),
            Err(FrameError::OversizedCommand { size: 5, max: 4 })
        ));
    }

    #[test]
    fn test_configured_limit_is_clamped() {
        let config = FrameConfig {
            max_payload_size: 4096,
            ..FrameConfig::default()
        };
        assert_eq!(config.effective_max_payload(), MAX_PAYLOAD);
    }

    #[test]
    fn test_codec_decode_eof_truncated() {
        let mut codec = LinkCodec::new();
        let mut buf = BytesMut::from(&[0x05, b'a', b'b'][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: 5,
                received: 2
            }
        ));
    }

    #[test]
    fn test_codec_decode_eof_clean() {
        let mut codec = LinkCodec::new();
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_codec_encode_text_with_encoding() {
        let mut codec = LinkCodec::with_config(FrameConfig {
            encoding: TextEncoding::Utf16Be,
            ..FrameConfig::default()
        });
        let mut buf = BytesMut::new();
        codec.encode("OK", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[4, 0, b'O', 0, b'K']);
    }

    #[tokio::test]
    async fn test_codec_over_framed_duplex() {
        use futures_util::{SinkExt, StreamExt};
        use tokio_util::codec::Framed;

        let (left, right) = tokio::io::duplex(1024);
        let mut tx = Framed::new(left, LinkCodec::new());
        let mut rx = Framed::new(right, LinkCodec::new());

        tx.send("A").await.unwrap();
        tx.send(Frame::new(Bytes::from_static(b"BC"))).await.unwrap();
        drop(tx);

        let first = rx.next().await.unwrap().unwrap();
        let second = rx.next().await.unwrap().unwrap();
        assert_eq!(first.payload.as_ref(), b"A");
        assert_eq!(second.payload.as_ref(), b"BC");
        assert!(rx.next().await.is_none());
    }
}
