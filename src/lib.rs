//! # Switchboard
//!
//! A host process for independently-ticking logic modules, with message
//! routing between modules and the outside network over a compact
//! length/ID-prefixed binary protocol.
//!
//! ## Architecture
//! - [`registry`]: message types ↔ stable numeric identifiers, frozen after
//!   the configuration phase
//! - [`core`]: envelope codec (`[id(4, BE)][payload]`), outer length
//!   framing, pluggable payload serialization
//! - [`net`]: uniform connections and listeners over TCP, KCP, and
//!   WebSocket; per-connection sessions feeding one pipeline
//! - [`host`]: one worker per module, periodic ticks, fire-and-forget and
//!   request/response routing by module name
//!
//! ## Quick Start
//! ```no_run
//! use switchboard::config::SwitchboardConfig;
//! use switchboard::host::{Host, Module};
//!
//! struct Heartbeat;
//!
//! impl Module for Heartbeat {
//!     fn name(&self) -> &'static str {
//!         "heartbeat"
//!     }
//!     fn tick_rate(&self) -> u32 {
//!         1
//!     }
//!     fn on_tick(&mut self) {
//!         tracing::info!("beat");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> switchboard::error::Result<()> {
//!     let config = SwitchboardConfig::default();
//!     switchboard::utils::logging::init(&config.logging);
//!
//!     let mut host = Host::new(config.host);
//!     host.register(Box::new(Heartbeat))?;
//!     host.start().await?;
//!     host.run().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod host;
pub mod net;
pub mod registry;
pub mod utils;

pub use config::SwitchboardConfig;
pub use core::{Decoded, MessageCodec, SerializationFormat};
pub use error::{Result, SwitchboardError};
pub use host::{Host, HostState, Module, Router, StopHandle};
pub use net::{Listener, NetManager, Session, SessionHandler, SessionRef, TransportKind};
pub use registry::{AnyPayload, Direction, MessageRegistry, RegistryBuilder};
