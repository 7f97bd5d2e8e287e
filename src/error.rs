//! # Error Types
//!
//! All failure values produced by the host, codec, and transport layers.
//!
//! ## Error Categories
//! - **Configuration errors**: duplicate registrations and invalid wiring,
//!   detected eagerly during the configuration phase. These are intentionally
//!   unrecoverable: bootstrap propagates them out of `main` and the process
//!   exits with a diagnostic.
//! - **Protocol errors**: malformed envelopes, unknown message identifiers,
//!   payloads that fail to deserialize. Recoverable per-connection — the
//!   offending session is closed, nothing else is affected.
//! - **Routing errors**: messages addressed to an unregistered module name.
//!   Recoverable, surfaced to the caller as a failure value.
//! - **Timeout errors**: a request that exceeded its deadline. The module-side
//!   work is not cancelled; its eventual result is discarded.
//!
//! All errors implement `std::error::Error` for interoperability.

use std::io;
use thiserror::Error;

/// Primary error type for all switchboard operations.
#[derive(Error, Debug)]
pub enum SwitchboardError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    // ---- configuration ----
    #[error("Message identifier {0} already registered")]
    DuplicateId(u32),

    #[error("Message type {0} already registered")]
    DuplicateType(&'static str),

    #[error("Message identifier 0 is reserved")]
    ReservedId,

    #[error("Module name '{0}' already registered")]
    DuplicateModule(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ---- protocol ----
    #[error("Malformed envelope: {0} bytes, need at least 4")]
    MalformedEnvelope(usize),

    #[error("Message identifier {0} not registered")]
    NotRegistered(u32),

    #[error("Message type {0} not registered")]
    TypeNotRegistered(&'static str),

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    // ---- routing ----
    #[error("Module '{0}' is not registered")]
    UnknownModule(String),

    #[error("Request timed out")]
    RequestTimeout,

    // ---- transport / lifecycle ----
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Invalid host state: {0}")]
    InvalidState(String),
}

/// Type alias for Results using SwitchboardError
pub type Result<T> = std::result::Result<T, SwitchboardError>;
