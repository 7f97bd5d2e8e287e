//! # Core Protocol Components
//!
//! Envelope handling, message codec, and payload serialization.
//!
//! This module is the wire-format foundation: it turns typed messages into
//! identifier-prefixed byte envelopes and back, and provides the outer
//! length-prefixed framing used over byte-stream transports.
//!
//! ## Components
//! - **Envelope**: `[identifier(4, BE)] [payload(N)]` layout helpers
//! - **MessageCodec**: registry-driven encode/decode of envelopes
//! - **FrameCodec**: tokio codec for length-prefixed records over streams
//! - **Serialization**: pluggable payload formats (bincode/JSON/MessagePack)
//!
//! ## Wire Format
//! ```text
//! outer frame:  [Length(4, BE)] [Envelope(N)]
//! envelope:     [Identifier(4, BE)] [Payload(N-4)]
//! ```
//!
//! Identifier `0` is reserved and never resolves. Length validation happens
//! before allocation; frames above the configured maximum are rejected.

pub mod codec;
pub mod envelope;
pub mod serialization;

pub use codec::{Decoded, FrameCodec, MessageCodec};
pub use serialization::SerializationFormat;
