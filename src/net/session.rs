//! Per-connection sessions and the listener group manager.
//!
//! A session owns one accepted connection for its lifetime: a read loop
//! strips the outer length framing, decodes envelopes, and delivers typed
//! payloads to the registered handler; a single writer task drains an
//! outbound queue so any number of concurrent senders are serialized onto
//! the connection. Protocol errors close the offending session and nothing
//! else.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::config::ListenerSpec;
use crate::core::codec::{Decoded, FrameCodec, MessageCodec};
use crate::error::{Result, SwitchboardError};
use crate::net::conn::BoxConn;
use crate::net::listener::Listener;
use crate::registry::{Direction, MessageRegistry, WireMessage};

/// Callbacks a session invokes as traffic arrives. Implementations route
/// decoded payloads into module workers; the session layer never inspects
/// payload contents.
pub trait SessionHandler: Send + Sync + 'static {
    fn on_open(&self, _session: &SessionRef) {}
    fn on_message(&self, session: &SessionRef, msg: Decoded);
    fn on_close(&self, _session: &SessionRef) {}
}

enum WriteCmd {
    Frame(Bytes),
    Shutdown,
}

/// Shared handle to one live session.
pub type SessionRef = Arc<Session>;

/// One accepted connection: identity, codec, and the serialized write path.
pub struct Session {
    id: u64,
    peer: SocketAddr,
    codec: MessageCodec,
    outbound: mpsc::UnboundedSender<WriteCmd>,
    closed: AtomicBool,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Encode and queue a typed message. Never blocks; fails once the
    /// connection is gone.
    pub fn send<T: WireMessage>(&self, msg: &T) -> Result<()> {
        let bytes = self.codec.encode(msg)?;
        self.queue(bytes)
    }

    /// Encode and queue an erased payload (responses coming back from
    /// module workers).
    pub fn send_any(&self, msg: &dyn std::any::Any) -> Result<()> {
        let bytes = self.codec.encode_any(msg)?;
        self.queue(bytes)
    }

    /// Ask the writer to close the connection after pending frames drain.
    pub fn close(&self) {
        let _ = self.outbound.send(WriteCmd::Shutdown);
    }

    fn queue(&self, bytes: Bytes) -> Result<()> {
        self.outbound
            .send(WriteCmd::Frame(bytes))
            .map_err(|_| SwitchboardError::ConnectionClosed)
    }
}

/// Spawn the read and write tasks for one accepted connection.
///
/// `active` is the owning listener's session counter; it was incremented by
/// the caller and is released when the read loop ends.
pub(crate) fn spawn_session(
    conn: BoxConn,
    peer: SocketAddr,
    id: u64,
    codec: MessageCodec,
    handler: Arc<dyn SessionHandler>,
    idle_timeout: Duration,
    active: Arc<AtomicUsize>,
) -> SessionRef {
    let (read_half, write_half) = tokio::io::split(conn);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let session = Arc::new(Session {
        id,
        peer,
        codec: codec.clone(),
        outbound: outbound_tx,
        closed: AtomicBool::new(false),
    });

    tokio::spawn(write_loop(write_half, outbound_rx, idle_timeout));

    let reader_session = session.clone();
    tokio::spawn(async move {
        handler.on_open(&reader_session);
        read_loop(read_half, &reader_session, codec, handler.as_ref(), idle_timeout).await;
        reader_session.closed.store(true, Ordering::Release);
        reader_session.close();
        handler.on_close(&reader_session);
        active.fetch_sub(1, Ordering::AcqRel);
    });

    session
}

async fn write_loop(
    write_half: WriteHalf<BoxConn>,
    mut outbound_rx: mpsc::UnboundedReceiver<WriteCmd>,
    write_deadline: Duration,
) {
    let mut framed = FramedWrite::new(write_half, FrameCodec::new());
    while let Some(cmd) = outbound_rx.recv().await {
        match cmd {
            WriteCmd::Frame(bytes) => {
                // Deadline-bounded: a peer that stops draining its socket
                // must not pin this task (or keep the session unclosable).
                match tokio::time::timeout(write_deadline, framed.send(bytes)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(error = %e, "session write failed");
                        break;
                    }
                    Err(_) => {
                        warn!("session write stalled past deadline, closing");
                        break;
                    }
                }
            }
            WriteCmd::Shutdown => break,
        }
    }
    let mut inner = framed.into_inner();
    let _ = inner.shutdown().await;
}

async fn read_loop(
    read_half: ReadHalf<BoxConn>,
    session: &SessionRef,
    codec: MessageCodec,
    handler: &dyn SessionHandler,
    idle_timeout: Duration,
) {
    let mut framed = FramedRead::new(read_half, FrameCodec::new());
    loop {
        let next = tokio::time::timeout(idle_timeout, framed.next()).await;
        let frame = match next {
            Err(_) => {
                info!(session = session.id(), peer = %session.peer(), "session idle timeout");
                break;
            }
            Ok(None) => {
                debug!(session = session.id(), "peer closed connection");
                break;
            }
            Ok(Some(Err(e))) => {
                warn!(session = session.id(), error = %e, "frame error, closing session");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match codec.decode(&frame) {
            Ok(decoded) => handler.on_message(session, decoded),
            Err(e) => {
                // Unknown identifier or malformed payload: this connection
                // is misbehaving; drop it without touching any other.
                warn!(session = session.id(), peer = %session.peer(), error = %e,
                      "protocol error, closing session");
                break;
            }
        }
    }
}

/// Owns the set of configured listeners and feeds every accepted connection
/// into one session pipeline.
pub struct NetManager {
    specs: Vec<ListenerSpec>,
    listeners: Vec<(Listener, Arc<AtomicUsize>)>,
    sessions: Arc<std::sync::Mutex<Vec<std::sync::Weak<Session>>>>,
    next_session_id: Arc<AtomicU64>,
}

impl NetManager {
    pub fn new(specs: Vec<ListenerSpec>) -> Self {
        Self {
            specs,
            listeners: Vec::new(),
            sessions: Arc::new(std::sync::Mutex::new(Vec::new())),
            next_session_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Bind and start every configured listener. Connections above a
    /// listener's session cap are dropped at accept time.
    pub async fn start(
        &mut self,
        registry: Arc<MessageRegistry>,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<()> {
        for spec in self.specs.clone() {
            let mut listener = Listener::bind(spec.kind, &spec.address).await?;
            let codec = if spec.paired {
                MessageCodec::paired(registry.clone(), spec.format, Direction::ClientToServer)
            } else {
                MessageCodec::shared(registry.clone(), spec.format)
            };

            let active = Arc::new(AtomicUsize::new(0));
            let counter = active.clone();
            let handler = handler.clone();
            let next_id = self.next_session_id.clone();
            let sessions = self.sessions.clone();
            let max_sessions = spec.max_sessions;
            let idle_timeout = spec.idle_timeout;

            listener.start(Arc::new(move |conn, peer| {
                if counter.fetch_add(1, Ordering::AcqRel) >= max_sessions {
                    counter.fetch_sub(1, Ordering::AcqRel);
                    warn!(peer = %peer, max_sessions, "session limit reached, dropping connection");
                    return;
                }
                let id = next_id.fetch_add(1, Ordering::Relaxed);
                let session = spawn_session(
                    conn,
                    peer,
                    id,
                    codec.clone(),
                    handler.clone(),
                    idle_timeout,
                    counter.clone(),
                );
                if let Ok(mut live) = sessions.lock() {
                    live.retain(|s| s.upgrade().is_some());
                    live.push(Arc::downgrade(&session));
                }
            }))?;

            self.listeners.push((listener, active));
        }
        Ok(())
    }

    /// Local addresses of the running listeners, in configuration order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners.iter().map(|(l, _)| l.local_addr()).collect()
    }

    /// Sessions currently alive across all listeners.
    pub fn session_count(&self) -> usize {
        self.listeners
            .iter()
            .map(|(_, active)| active.load(Ordering::Acquire))
            .sum()
    }

    /// Stop all listeners and close the sessions they accepted; each
    /// listener stop is individually bounded.
    pub async fn stop(&mut self) {
        for (listener, _) in &mut self.listeners {
            listener.stop().await;
        }
        self.listeners.clear();

        if let Ok(mut live) = self.sessions.lock() {
            for session in live.drain(..) {
                if let Some(session) = session.upgrade() {
                    session.close();
                }
            }
        }
    }
}
