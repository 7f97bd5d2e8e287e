//! # Serialization Formats
//!
//! Abstraction over the payload byte formats a codec may use. The envelope
//! never prescribes a payload format; each listener picks one of these.
//!
//! ## Features
//! - **Bincode**: binary compact format (default, fastest)
//! - **JSON**: human-readable (debugging, interop)
//! - **MessagePack**: compact binary for bandwidth-constrained links
//!
//! The registry captures these functions in monomorphized form at
//! registration time, so the erased encode/decode path never inspects types
//! at runtime.

use crate::error::{Result, SwitchboardError};
use serde::{de::DeserializeOwned, Serialize};

/// Supported payload serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format (debugging, interop)
    Json,
    /// Compact binary format (MessagePack, efficient)
    MessagePack,
}

impl SerializationFormat {
    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
            SerializationFormat::MessagePack => "MessagePack",
        }
    }
}

/// Serialize a payload value in the given format.
pub fn serialize_value<T: Serialize>(value: &T, format: SerializationFormat) -> Result<Vec<u8>> {
    match format {
        SerializationFormat::Bincode => {
            bincode::serialize(value).map_err(|e| SwitchboardError::SerializeError(e.to_string()))
        }
        SerializationFormat::Json => {
            serde_json::to_vec(value).map_err(|e| SwitchboardError::SerializeError(e.to_string()))
        }
        SerializationFormat::MessagePack => {
            rmp_serde::to_vec(value).map_err(|e| SwitchboardError::SerializeError(e.to_string()))
        }
    }
}

/// Deserialize a payload value from the given format.
///
/// Always constructs a fresh value; nothing is reused between decodes.
pub fn deserialize_value<T: DeserializeOwned>(
    data: &[u8],
    format: SerializationFormat,
) -> Result<T> {
    match format {
        SerializationFormat::Bincode => bincode::deserialize(data)
            .map_err(|e| SwitchboardError::DeserializeError(e.to_string())),
        SerializationFormat::Json => serde_json::from_slice(data)
            .map_err(|e| SwitchboardError::DeserializeError(e.to_string())),
        SerializationFormat::MessagePack => rmp_serde::from_slice(data)
            .map_err(|e| SwitchboardError::DeserializeError(e.to_string())),
    }
}
