//! Message envelope layout.
//!
//! An envelope is a 4-byte big-endian identifier followed by opaque payload
//! bytes. Payload length comes from the transport-level outer framing, which
//! is stripped before these helpers see the bytes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, SwitchboardError};

/// Width of the identifier prefix in bytes.
pub const ID_LEN: usize = 4;

/// Identifier `0` is reserved/invalid on the wire.
pub const RESERVED_ID: u32 = 0;

/// Split an envelope into its identifier and payload bytes.
///
/// Anything shorter than the identifier prefix is a malformed envelope,
/// never a panic.
pub fn split(frame: &[u8]) -> Result<(u32, &[u8])> {
    if frame.len() < ID_LEN {
        return Err(SwitchboardError::MalformedEnvelope(frame.len()));
    }
    let mut id_bytes = [0u8; ID_LEN];
    id_bytes.copy_from_slice(&frame[..ID_LEN]);
    Ok((u32::from_be_bytes(id_bytes), &frame[ID_LEN..]))
}

/// Assemble an envelope from an identifier and serialized payload.
pub fn join(id: u32, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(ID_LEN + payload.len());
    buf.put_u32(id);
    buf.put_slice(payload);
    buf.freeze()
}
