//! # Message Type Registry
//!
//! Bidirectional mapping between message types and stable numeric wire
//! identifiers. The registry is built once during the configuration phase
//! and then frozen behind an `Arc`, so steady-state lookups are plain
//! unsynchronized reads.
//!
//! Two identifier spaces exist:
//! - a **shared space** where one identifier maps to exactly one type, and
//! - a **paired space** for request/response protocols where client-to-server
//!   and server-to-client payloads differ in shape but share one logical
//!   message number; each direction keeps its own table.
//!
//! Registration is a typed call (`register::<T>(id)`), monomorphizing the
//! encode and decode routines for `T` into plain fn pointers at that moment.
//! No type metadata is inspected at runtime and no identifier depends on
//! anything but the explicit registration argument.
//!
//! Identifier `0` is reserved on the wire and always rejected.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::core::serialization::{deserialize_value, serialize_value, SerializationFormat};
use crate::error::{Result, SwitchboardError};

/// Bound required of any type carried in a wire envelope.
pub trait WireMessage: Serialize + DeserializeOwned + Any + Send + 'static {}

impl<T: Serialize + DeserializeOwned + Any + Send + 'static> WireMessage for T {}

/// Opaque decoded payload, routed by the host without inspection.
pub type AnyPayload = Box<dyn Any + Send>;

/// Direction a message travels in a paired registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client-originated traffic (what a server listener decodes).
    ClientToServer,
    /// Server-originated traffic (what a client decodes).
    ServerToClient,
}

type EncodeFn = fn(&dyn Any, SerializationFormat) -> Result<Vec<u8>>;
type DecodeFn = fn(&[u8], SerializationFormat) -> Result<AnyPayload>;

fn encode_erased<T: WireMessage>(msg: &dyn Any, format: SerializationFormat) -> Result<Vec<u8>> {
    let concrete = msg
        .downcast_ref::<T>()
        .ok_or_else(|| SwitchboardError::SerializeError("payload type mismatch".to_string()))?;
    serialize_value(concrete, format)
}

fn decode_erased<T: WireMessage>(data: &[u8], format: SerializationFormat) -> Result<AnyPayload> {
    let value: T = deserialize_value(data, format)?;
    Ok(Box::new(value))
}

/// Typed handle returned by a registration call.
///
/// Carries the identifier the type was bound to; useful where call sites want
/// the number without repeating the literal.
#[derive(Debug)]
pub struct MessageToken<T> {
    id: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for MessageToken<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for MessageToken<T> {}

impl<T> MessageToken<T> {
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Decode-side registry entry: the routine that turns payload bytes into a
/// fresh value of the registered destination type.
struct DecodeEntry {
    type_name: &'static str,
    decode: DecodeFn,
}

/// Encode-side registry entry keyed by `TypeId`.
struct TypeEntry {
    id: u32,
    type_name: &'static str,
    encode: EncodeFn,
}

/// Open-phase registry. Collects registrations, rejects conflicts eagerly,
/// and freezes into an immutable [`MessageRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    types: HashMap<TypeId, TypeEntry>,
    shared: HashMap<u32, DecodeEntry>,
    pair_c2s: HashMap<u32, DecodeEntry>,
    pair_s2c: HashMap<u32, DecodeEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `T` to `id` in the shared identifier space.
    ///
    /// Duplicate identifiers and duplicate types are configuration errors;
    /// the set of message types is fixed at build time, so a conflict here is
    /// a programming error and bootstrap is expected to terminate on it.
    pub fn register<T: WireMessage>(&mut self, id: u32) -> Result<MessageToken<T>> {
        self.check_id_free(id)?;
        if self.shared.contains_key(&id) {
            return Err(SwitchboardError::DuplicateId(id));
        }
        self.claim_type::<T>(id)?;
        self.shared.insert(
            id,
            DecodeEntry {
                type_name: std::any::type_name::<T>(),
                decode: decode_erased::<T>,
            },
        );
        debug!(id, ty = std::any::type_name::<T>(), "message registered");
        Ok(MessageToken {
            id,
            _marker: PhantomData,
        })
    }

    /// Bind a request/response pair to one logical identifier: `C2S` for
    /// client-originated traffic, `S2C` for server-originated traffic.
    pub fn register_pair<C2S: WireMessage, S2C: WireMessage>(&mut self, id: u32) -> Result<()> {
        self.register_client_to_server::<C2S>(id)?;
        self.register_server_to_client::<S2C>(id)?;
        Ok(())
    }

    /// Paired registration with only the client-to-server side present.
    pub fn register_client_to_server<T: WireMessage>(
        &mut self,
        id: u32,
    ) -> Result<MessageToken<T>> {
        self.check_id_free(id)?;
        if self.pair_c2s.contains_key(&id) {
            return Err(SwitchboardError::DuplicateId(id));
        }
        self.claim_type::<T>(id)?;
        self.pair_c2s.insert(
            id,
            DecodeEntry {
                type_name: std::any::type_name::<T>(),
                decode: decode_erased::<T>,
            },
        );
        debug!(id, ty = std::any::type_name::<T>(), "c2s message registered");
        Ok(MessageToken {
            id,
            _marker: PhantomData,
        })
    }

    /// Paired registration with only the server-to-client side present.
    pub fn register_server_to_client<T: WireMessage>(
        &mut self,
        id: u32,
    ) -> Result<MessageToken<T>> {
        self.check_id_free(id)?;
        if self.pair_s2c.contains_key(&id) {
            return Err(SwitchboardError::DuplicateId(id));
        }
        self.claim_type::<T>(id)?;
        self.pair_s2c.insert(
            id,
            DecodeEntry {
                type_name: std::any::type_name::<T>(),
                decode: decode_erased::<T>,
            },
        );
        debug!(id, ty = std::any::type_name::<T>(), "s2c message registered");
        Ok(MessageToken {
            id,
            _marker: PhantomData,
        })
    }

    /// Close the registration phase. The returned registry is read-only and
    /// safe for unsynchronized concurrent lookups.
    pub fn freeze(self) -> Arc<MessageRegistry> {
        Arc::new(MessageRegistry {
            types: self.types,
            shared: self.shared,
            pair_c2s: self.pair_c2s,
            pair_s2c: self.pair_s2c,
        })
    }

    fn check_id_free(&self, id: u32) -> Result<()> {
        if id == 0 {
            return Err(SwitchboardError::ReservedId);
        }
        Ok(())
    }

    fn claim_type<T: WireMessage>(&mut self, id: u32) -> Result<()> {
        let key = TypeId::of::<T>();
        if self.types.contains_key(&key) {
            return Err(SwitchboardError::DuplicateType(std::any::type_name::<T>()));
        }
        self.types.insert(
            key,
            TypeEntry {
                id,
                type_name: std::any::type_name::<T>(),
                encode: encode_erased::<T>,
            },
        );
        Ok(())
    }
}

/// Frozen registry: identifier/type lookups plus the monomorphized
/// encode/decode routines captured at registration time.
pub struct MessageRegistry {
    types: HashMap<TypeId, TypeEntry>,
    shared: HashMap<u32, DecodeEntry>,
    pair_c2s: HashMap<u32, DecodeEntry>,
    pair_s2c: HashMap<u32, DecodeEntry>,
}

impl MessageRegistry {
    /// Identifier bound to `T`, if any.
    pub fn id_of<T: WireMessage>(&self) -> Option<u32> {
        self.types.get(&TypeId::of::<T>()).map(|e| e.id)
    }

    /// Identifier bound to the concrete type behind an erased payload.
    pub fn id_of_any(&self, msg: &dyn Any) -> Option<u32> {
        self.types.get(&msg.type_id()).map(|e| e.id)
    }

    /// Serialize an erased payload, resolving its identifier first.
    pub fn encode_payload(
        &self,
        msg: &dyn Any,
        format: SerializationFormat,
    ) -> Result<(u32, Vec<u8>)> {
        let entry = self
            .types
            .get(&msg.type_id())
            .ok_or(SwitchboardError::TypeNotRegistered("<unregistered type>"))?;
        let bytes = (entry.encode)(msg, format)?;
        Ok((entry.id, bytes))
    }

    /// Serialize a typed payload, resolving its identifier first.
    pub fn encode_typed<T: WireMessage>(
        &self,
        msg: &T,
        format: SerializationFormat,
    ) -> Result<(u32, Vec<u8>)> {
        let entry = self
            .types
            .get(&TypeId::of::<T>())
            .ok_or(SwitchboardError::TypeNotRegistered(std::any::type_name::<T>()))?;
        let bytes = (entry.encode)(msg, format)?;
        Ok((entry.id, bytes))
    }

    /// Decode payload bytes for `id` using the shared identifier space.
    pub fn decode_shared(
        &self,
        id: u32,
        data: &[u8],
        format: SerializationFormat,
    ) -> Result<AnyPayload> {
        let entry = self
            .shared
            .get(&id)
            .ok_or(SwitchboardError::NotRegistered(id))?;
        (entry.decode)(data, format)
    }

    /// Decode payload bytes for `id` using the paired table for the given
    /// inbound direction.
    pub fn decode_directional(
        &self,
        id: u32,
        direction: Direction,
        data: &[u8],
        format: SerializationFormat,
    ) -> Result<AnyPayload> {
        let table = match direction {
            Direction::ClientToServer => &self.pair_c2s,
            Direction::ServerToClient => &self.pair_s2c,
        };
        let entry = table.get(&id).ok_or(SwitchboardError::NotRegistered(id))?;
        (entry.decode)(data, format)
    }

    /// Registered type name for an identifier, checking the shared space and
    /// both directions. Diagnostic use only.
    pub fn type_name_of(&self, id: u32) -> Option<&'static str> {
        self.shared
            .get(&id)
            .or_else(|| self.pair_c2s.get(&id))
            .or_else(|| self.pair_s2c.get(&id))
            .map(|e| e.type_name)
    }
}
