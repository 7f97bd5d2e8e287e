//! Listeners for inbound connections.
//!
//! One uniform constructor covers every transport kind; the returned value
//! behaves identically regardless of what it accepts. Each accepted
//! connection is handed to the registered callback on its own task, so one
//! slow connection (or a slow WebSocket upgrade) never blocks acceptance.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_kcp::{KcpConfig, KcpListener, KcpStream};
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, SwitchboardError};
use crate::net::conn::{BoxConn, WsConn};

/// How long `stop` waits for the accept loop to wind down.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Transport kind tag for the uniform listener constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Reliable ordered byte stream.
    Tcp,
    /// Reliable datagram overlay over UDP.
    Kcp,
    /// HTTP-upgraded framed socket.
    Ws,
}

impl TransportKind {
    pub fn name(self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Kcp => "kcp",
            TransportKind::Ws => "ws",
        }
    }
}

/// Callback invoked once per accepted (and established) connection.
pub type ConnHandler = Arc<dyn Fn(BoxConn, SocketAddr) + Send + Sync>;

enum Acceptor {
    Tcp(TcpListener),
    Kcp(KcpListener),
    Ws(TcpListener),
}

/// A connection as accepted, before any per-transport establishment work.
/// WebSocket upgrades run on the connection's own task via [`RawConn::establish`].
enum RawConn {
    Tcp(TcpStream),
    Kcp(KcpStream),
    Ws(TcpStream),
}

impl RawConn {
    async fn establish(self) -> Result<BoxConn> {
        match self {
            RawConn::Tcp(stream) => Ok(Box::new(stream)),
            RawConn::Kcp(stream) => Ok(Box::new(stream)),
            RawConn::Ws(stream) => {
                let ws = accept_async(stream)
                    .await
                    .map_err(|e| SwitchboardError::TransportError(e.to_string()))?;
                Ok(Box::new(WsConn::new(ws)))
            }
        }
    }
}

async fn accept_one(acceptor: &mut Acceptor) -> Result<(RawConn, SocketAddr)> {
    match acceptor {
        Acceptor::Tcp(listener) => {
            let (stream, peer) = listener.accept().await?;
            Ok((RawConn::Tcp(stream), peer))
        }
        Acceptor::Kcp(listener) => {
            let (stream, peer) = listener
                .accept()
                .await
                .map_err(|e| SwitchboardError::TransportError(e.to_string()))?;
            Ok((RawConn::Kcp(stream), peer))
        }
        Acceptor::Ws(listener) => {
            let (stream, peer) = listener.accept().await?;
            Ok((RawConn::Ws(stream), peer))
        }
    }
}

/// Acceptor for inbound connections on one transport kind.
///
/// State machine: `bind` → `start` (accept loop running) → `stop`.
pub struct Listener {
    kind: TransportKind,
    local_addr: SocketAddr,
    acceptor: Option<Acceptor>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Listener {
    /// Bind a listener of the given kind. The result is uniform: callers
    /// never branch on the transport again.
    #[instrument(skip(addr), fields(kind = kind.name()))]
    pub async fn bind(kind: TransportKind, addr: &str) -> Result<Self> {
        let (acceptor, local_addr) = match kind {
            TransportKind::Tcp => {
                let listener = TcpListener::bind(addr).await?;
                let local = listener.local_addr()?;
                (Acceptor::Tcp(listener), local)
            }
            TransportKind::Kcp => {
                let listener = KcpListener::bind(KcpConfig::default(), addr)
                    .await
                    .map_err(|e| SwitchboardError::TransportError(e.to_string()))?;
                let local = listener
                    .local_addr()
                    .map_err(|e| SwitchboardError::TransportError(e.to_string()))?;
                (Acceptor::Kcp(listener), local)
            }
            TransportKind::Ws => {
                let listener = TcpListener::bind(addr).await?;
                let local = listener.local_addr()?;
                (Acceptor::Ws(listener), local)
            }
        };
        info!(kind = kind.name(), addr = %local_addr, "listener bound");
        Ok(Self {
            kind,
            local_addr,
            acceptor: Some(acceptor),
            shutdown_tx: None,
            handle: None,
        })
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Begin accepting connections. Returns immediately; each accepted
    /// connection is established and handed to `handler` on its own task.
    pub fn start(&mut self, handler: ConnHandler) -> Result<()> {
        let mut acceptor = self
            .acceptor
            .take()
            .ok_or_else(|| SwitchboardError::InvalidState("listener already started".into()))?;
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let kind = self.kind;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(kind = kind.name(), "listener shutting down");
                        break;
                    }
                    accepted = accept_one(&mut acceptor) => {
                        match accepted {
                            Ok((raw, peer)) => {
                                debug!(kind = kind.name(), peer = %peer, "connection accepted");
                                let handler = handler.clone();
                                tokio::spawn(async move {
                                    match raw.establish().await {
                                        Ok(conn) => handler(conn, peer),
                                        Err(e) => {
                                            warn!(peer = %peer, error = %e, "connection establishment failed");
                                        }
                                    }
                                });
                            }
                            Err(e) => {
                                error!(kind = kind.name(), error = %e, "accept failed");
                                // Transient accept errors (fd pressure etc.)
                                // should not spin the loop.
                                tokio::time::sleep(Duration::from_millis(50)).await;
                            }
                        }
                    }
                }
            }
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Stop accepting, bounded by [`STOP_TIMEOUT`]. Safe to call on a
    /// listener that never started or whose acceptor already closed.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            // The accept loop may already be gone; that is not an error.
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            if tokio::time::timeout(STOP_TIMEOUT, handle).await.is_err() {
                warn!(kind = self.kind.name(), "listener did not stop within bound, detaching");
            }
        }
    }
}
