use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{TransportError, TransportResult};

/// Which side opened the connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Accepted by our listener.
    Inbound,
    /// Dialed by us.
    Outbound,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// A remote node on the other end of one connection.
#[async_trait]
pub trait Peer: Send + Sync {
    fn remote_addr(&self) -> SocketAddr;

    fn direction(&self) -> Direction;

    fn is_outbound(&self) -> bool {
        self.direction() == Direction::Outbound
    }

    /// Write raw bytes to the peer.
    async fn send(&mut self, data: &[u8]) -> TransportResult<()>;

    /// Shut the connection down. The peer must not be used afterwards.
    async fn close(&mut self) -> TransportResult<()>;
}

/// A peer over an established TCP connection.
///
/// Reads and writes pass straight through to the socket, so handshakes and
/// decoders can use it like any other async stream.
#[derive(Debug)]
pub struct TcpPeer {
    stream: TcpStream,
    remote_addr: SocketAddr,
    direction: Direction,
}

impl TcpPeer {
    pub fn new(stream: TcpStream, remote_addr: SocketAddr, direction: Direction) -> Self {
        Self {
            stream,
            remote_addr,
            direction,
        }
    }

    /// Dial `addr` and wrap the connection as an outbound peer.
    pub async fn connect(addr: &str) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        let remote_addr = stream.peer_addr()?;
        Ok(Self::new(stream, remote_addr, Direction::Outbound))
    }

    /// Local address of the underlying socket.
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.stream.local_addr()?)
    }
}

#[async_trait]
impl Peer for TcpPeer {
    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    async fn send(&mut self, data: &[u8]) -> TransportResult<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        match self.stream.shutdown().await {
            Ok(()) => Ok(()),
            // Already torn down by the remote side.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => {
                debug!(addr = %self.remote_addr, "peer already disconnected");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl AsyncRead for TcpPeer {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpPeer {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
