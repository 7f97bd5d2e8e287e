//! Registry-driven message codec plus the outer stream framing.
//!
//! [`MessageCodec`] maps typed messages to identifier-prefixed envelopes and
//! back. Decode direction is fixed per codec instance: a server listener
//! decodes client-originated traffic, so paired identifiers resolve through
//! the client-to-server table there. [`FrameCodec`] is the length-prefixed
//! record layer that delimits envelopes over a continuous byte stream.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::envelope::{self, RESERVED_ID};
use crate::core::serialization::SerializationFormat;
use crate::error::{Result, SwitchboardError};
use crate::registry::{AnyPayload, Direction, MessageRegistry, WireMessage};

/// Default upper bound for one frame (16 MB), preventing memory exhaustion
/// from a hostile length prefix.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// A decoded envelope: the wire identifier and the typed (but erased) payload.
pub struct Decoded {
    pub id: u32,
    pub payload: AnyPayload,
}

impl fmt::Debug for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoded")
            .field("id", &self.id)
            .field("payload", &"<erased>")
            .finish()
    }
}

#[derive(Clone, Copy)]
enum Lookup {
    Shared,
    Paired(Direction),
}

/// Encodes and decodes message envelopes against a frozen registry.
#[derive(Clone)]
pub struct MessageCodec {
    registry: Arc<MessageRegistry>,
    format: SerializationFormat,
    lookup: Lookup,
}

impl MessageCodec {
    /// Codec over the shared identifier space (unidirectional protocols).
    pub fn shared(registry: Arc<MessageRegistry>, format: SerializationFormat) -> Self {
        Self {
            registry,
            format,
            lookup: Lookup::Shared,
        }
    }

    /// Codec for a paired protocol. `inbound` names the direction this side
    /// decodes: a server passes [`Direction::ClientToServer`].
    pub fn paired(
        registry: Arc<MessageRegistry>,
        format: SerializationFormat,
        inbound: Direction,
    ) -> Self {
        Self {
            registry,
            format,
            lookup: Lookup::Paired(inbound),
        }
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }

    /// Encode a typed message into `identifier || payload`.
    ///
    /// Fails with a type-not-registered error if `T` was never bound.
    pub fn encode<T: WireMessage>(&self, msg: &T) -> Result<Bytes> {
        let (id, payload) = self.registry.encode_typed(msg, self.format)?;
        Ok(envelope::join(id, &payload))
    }

    /// Encode an erased payload (the session write path, where responses
    /// arrive as `Box<dyn Any>` from module workers).
    pub fn encode_any(&self, msg: &dyn Any) -> Result<Bytes> {
        let (id, payload) = self.registry.encode_payload(msg, self.format)?;
        Ok(envelope::join(id, &payload))
    }

    /// Decode an envelope into a fresh payload value.
    ///
    /// Fails distinctly for a malformed envelope (shorter than the
    /// identifier), an unknown identifier, and a payload that does not
    /// deserialize into the resolved type.
    pub fn decode(&self, frame: &[u8]) -> Result<Decoded> {
        let (id, payload_bytes) = envelope::split(frame)?;
        if id == RESERVED_ID {
            return Err(SwitchboardError::NotRegistered(id));
        }
        let payload = match self.lookup {
            Lookup::Shared => self.registry.decode_shared(id, payload_bytes, self.format)?,
            Lookup::Paired(direction) => {
                self.registry
                    .decode_directional(id, direction, payload_bytes, self.format)?
            }
        };
        Ok(Decoded { id, payload })
    }
}

/// Length-prefixed outer framing: `[length(4, BE)] [bytes]`.
///
/// The length prefix covers only the record body, added here on encode and
/// stripped before envelopes reach [`MessageCodec::decode`].
pub struct FrameCodec {
    max_frame: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame: MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame(max_frame: usize) -> Self {
        Self { max_frame }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = SwitchboardError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>> {
        if src.len() < 4 {
            return Ok(None);
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&src[..4]);
        let len = u32::from_be_bytes(len_bytes) as usize;

        // Validate before reserving anything.
        if len > self.max_frame {
            return Err(SwitchboardError::OversizedFrame(len));
        }
        if src.len() < 4 + len {
            src.reserve(4 + len - src.len());
            return Ok(None);
        }
        src.advance(4);
        Ok(Some(src.split_to(len)))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = SwitchboardError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > self.max_frame {
            return Err(SwitchboardError::OversizedFrame(item.len()));
        }
        dst.reserve(4 + item.len());
        dst.put_u32(item.len() as u32);
        dst.put_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Hello {
        name: String,
    }

    fn shared_codec() -> MessageCodec {
        let mut builder = RegistryBuilder::new();
        builder.register::<Hello>(1001).expect("register");
        MessageCodec::shared(builder.freeze(), SerializationFormat::Bincode)
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn encode_prefixes_big_endian_identifier() {
        let codec = shared_codec();
        let bytes = codec
            .encode(&Hello {
                name: "Potato".to_string(),
            })
            .unwrap();
        assert_eq!(&bytes[..4], &[0x00, 0x00, 0x03, 0xE9]);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn reserved_identifier_never_resolves() {
        let codec = shared_codec();
        let err = codec.decode(&[0, 0, 0, 0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, SwitchboardError::NotRegistered(0)));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn frame_codec_reassembles_partial_input() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from_static(b"hello world"), &mut buf).unwrap();

        // Feed the decoder one byte at a time; it must wait for a full record.
        let mut dec = FrameCodec::new();
        let mut incoming = BytesMut::new();
        let mut out = None;
        for byte in buf.iter() {
            incoming.put_u8(*byte);
            if let Some(frame) = dec.decode(&mut incoming).unwrap() {
                out = Some(frame);
            }
        }
        assert_eq!(out.as_deref(), Some(b"hello world".as_slice()));
    }

    #[test]
    fn frame_codec_rejects_hostile_length() {
        let mut dec = FrameCodec::with_max_frame(1024);
        let mut buf = BytesMut::new();
        buf.put_u32(2048);
        buf.put_slice(&[0u8; 16]);
        let err = dec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, SwitchboardError::OversizedFrame(2048)));
    }
}
