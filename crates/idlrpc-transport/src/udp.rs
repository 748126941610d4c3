use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// UDP datagram endpoint.
///
/// Servers bind a known address and use [`recv_from`](Self::recv_from) /
/// [`send_to`](Self::send_to). Clients connect an ephemeral socket to the
/// server address and use [`send`](Self::send) / [`recv`](Self::recv).
pub struct UdpEndpoint {
    socket: UdpSocket,
    addr: SocketAddr,
}

impl UdpEndpoint {
    /// Bind a datagram socket on `addr`. Port 0 binds an ephemeral port.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|e| TransportError::Bind {
            addr,
            source: e,
        })?;
        let addr = socket.local_addr().map_err(|e| TransportError::Bind {
            addr,
            source: e,
        })?;
        info!(%addr, "listening on udp endpoint");
        Ok(Self { socket, addr })
    }

    /// Bind an ephemeral local socket and connect it to `addr` so that
    /// [`send`](Self::send) and [`recv`](Self::recv) exchange datagrams with
    /// that peer only.
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let local = if addr.is_ipv4() {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
        } else {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
        };
        let socket = UdpSocket::bind(local).map_err(|e| TransportError::Bind {
            addr: local,
            source: e,
        })?;
        socket.connect(addr).map_err(|e| TransportError::Connect {
            addr,
            source: e,
        })?;
        let bound = socket.local_addr().map_err(TransportError::Io)?;
        debug!(%addr, local = %bound, "connected udp endpoint");
        Ok(Self { socket, addr: bound })
    }

    /// Send one datagram to the connected peer.
    pub fn send(&self, buf: &[u8]) -> Result<usize> {
        self.socket.send(buf).map_err(Into::into)
    }

    /// Receive one datagram from the connected peer.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        self.socket.recv(buf).map_err(Into::into)
    }

    /// Send one datagram to an explicit address.
    pub fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize> {
        self.socket.send_to(buf, addr).map_err(Into::into)
    }

    /// Receive one datagram and the address it came from.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).map_err(Into::into)
    }

    /// Set the receive timeout. Engines use this as their liveness tick.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Clone the endpoint (new descriptor over the same socket).
    pub fn try_clone(&self) -> Result<Self> {
        let socket = self.socket.try_clone()?;
        Ok(Self {
            socket,
            addr: self.addr,
        })
    }

    /// The local address this endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl std::fmt::Debug for UdpEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpEndpoint").field("addr", &self.addr).finish()
    }
}
