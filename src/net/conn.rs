//! Uniform byte-stream connection handles.
//!
//! Stream transports (TCP, KCP) already expose `AsyncRead + AsyncWrite` and
//! pass through untouched. Frame-oriented transports go through [`WsConn`],
//! which buffers surplus frame bytes so an arbitrary-sized read is satisfied
//! across frame boundaries.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Buf, BytesMut};
use futures::{Sink, Stream};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

/// A live network endpoint as a uniform byte stream.
pub trait Conn: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Conn for T {}

/// Boxed connection handed from listener to session.
pub type BoxConn = Box<dyn Conn>;

fn ws_to_io(err: WsError) -> io::Error {
    match err {
        WsError::Io(e) => e,
        other => io::Error::other(other),
    }
}

/// Byte-stream view over a WebSocket connection.
///
/// Binary frames are flattened into one continuous stream; partial frame
/// bytes stay buffered for the next read. Control traffic (ping/pong) is
/// handled inside the socket and never reaches message decoding; a close
/// frame or stream end reads as EOF.
pub struct WsConn<S> {
    inner: WebSocketStream<S>,
    readbuf: BytesMut,
}

impl<S> WsConn<S> {
    pub fn new(inner: WebSocketStream<S>) -> Self {
        Self {
            inner,
            readbuf: BytesMut::new(),
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncRead for WsConn<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            // Drain buffered bytes first; one frame may serve many reads.
            if !this.readbuf.is_empty() {
                let n = buf.remaining().min(this.readbuf.len());
                buf.put_slice(&this.readbuf[..n]);
                this.readbuf.advance(n);
                return Poll::Ready(Ok(()));
            }
            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(Message::Binary(data))) => {
                    this.readbuf.extend_from_slice(&data);
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Transport-level health traffic, not payload.
                    continue;
                }
                Some(Ok(Message::Text(_) | Message::Frame(_))) => {
                    debug!("ignoring non-binary websocket frame");
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => return Poll::Ready(Ok(())),
                Some(Err(e)) => return Poll::Ready(Err(ws_to_io(e))),
            }
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> AsyncWrite for WsConn<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(Pin::new(&mut this.inner).poll_ready(cx)).map_err(ws_to_io)?;
        Pin::new(&mut this.inner)
            .start_send(Message::Binary(buf.to_vec()))
            .map_err(ws_to_io)?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_flush(cx).map_err(ws_to_io)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_close(cx).map_err(ws_to_io)
    }
}
