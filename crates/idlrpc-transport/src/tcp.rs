use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// A connected stream endpoint — implements `Read` + `Write`.
///
/// Wraps a TCP stream with the operations the framing and engine layers
/// need: timeouts, cloning for a split reader/writer pair, and shutdown.
pub struct RpcStream {
    inner: TcpStream,
}

impl RpcStream {
    fn new(inner: TcpStream) -> Result<Self> {
        inner.set_nodelay(true)?;
        Ok(Self { inner })
    }

    /// Set the read timeout on the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set the write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Clone this stream (creates a new file descriptor over the same
    /// connection). Used to split one connection into a reader and a writer.
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self { inner: cloned })
    }

    /// Shut down both directions. The counterpart observes end-of-stream on
    /// its next read.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown(Shutdown::Both);
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    /// Local address of this endpoint.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Into::into)
    }
}

impl Read for RpcStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for RpcStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for RpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcStream")
            .field("peer", &self.inner.peer_addr().ok())
            .finish()
    }
}

/// TCP listening endpoint.
///
/// Provides bind/accept/connect for the stream binding.
pub struct TcpEndpoint {
    listener: TcpListener,
    addr: SocketAddr,
}

impl TcpEndpoint {
    /// Bind and listen on `addr`. Port 0 binds an ephemeral port; the actual
    /// address is available via [`local_addr`](Self::local_addr).
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr,
            source: e,
        })?;
        let addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr,
            source: e,
        })?;
        info!(%addr, "listening on tcp endpoint");
        Ok(Self { listener, addr })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<RpcStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        RpcStream::new(stream)
    }

    /// Connect to a listening endpoint (blocking).
    pub fn connect(addr: SocketAddr) -> Result<RpcStream> {
        let stream = TcpStream::connect(addr).map_err(|e| TransportError::Connect {
            addr,
            source: e,
        })?;
        debug!(%addr, "connected to tcp endpoint");
        RpcStream::new(stream)
    }

    /// The address this endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}
