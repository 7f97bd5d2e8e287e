//! # Transport Layer
//!
//! Uniform connection and listener abstractions over heterogeneous
//! transports, plus the per-connection session pipeline.
//!
//! ## Components
//! - **Conn**: a uniform byte-stream view of one live endpoint
//!   (`AsyncRead + AsyncWrite`), with an adapter that flattens
//!   frame-oriented transports into a continuous stream
//! - **Listener**: accepts inbound connections for one transport kind and
//!   hands each to a callback on its own task
//! - **Session**: the read/decode/dispatch loop and serialized write path
//!   bound to one accepted connection
//! - **NetManager**: starts and stops a group of configured listeners
//!   feeding one message-handling pipeline
//!
//! Transport kinds: reliable ordered stream (TCP), reliable datagram overlay
//! (KCP), and HTTP-upgraded framed socket (WebSocket). A host may run
//! several listeners of different kinds at once.

pub mod conn;
pub mod listener;
pub mod session;

pub use conn::{BoxConn, Conn, WsConn};
pub use listener::{Listener, TransportKind};
pub use session::{NetManager, Session, SessionHandler, SessionRef};
