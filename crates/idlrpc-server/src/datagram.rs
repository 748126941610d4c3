use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bytes::BytesMut;
use idlrpc_frame::{codec, message, LEN_HEADER};
use idlrpc_transport::{TransportError, UdpEndpoint};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::dispatch::{Dispatched, ServiceDispatch};
use crate::error::Result;

/// Datagram-binding server.
///
/// A single receive loop serves every client. Each datagram must carry one
/// frame whose length prefix duplicates the datagram length; the sender is
/// registered (or refreshed) in the address-keyed client registry before
/// dispatch, and the reply goes back to the originating address. Clients are
/// never expired until [`stop`](Self::stop).
pub struct DatagramServer<D> {
    socket: UdpEndpoint,
    dispatch: D,
    clients: Mutex<BTreeSet<SocketAddr>>,
    running: AtomicBool,
    send: Mutex<BytesMut>,
    config: ServerConfig,
}

impl<D: ServiceDispatch> DatagramServer<D> {
    /// Bind the datagram socket. Port 0 binds an ephemeral port.
    pub fn bind(addr: SocketAddr, dispatch: D, config: ServerConfig) -> Result<Self> {
        let socket = UdpEndpoint::bind(addr)?;
        socket.set_read_timeout(Some(config.poll_timeout))?;
        Ok(Self {
            socket,
            dispatch,
            clients: Mutex::new(BTreeSet::new()),
            running: AtomicBool::new(true),
            send: Mutex::new(BytesMut::new()),
            config,
        })
    }

    /// The address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// Receive and dispatch datagrams until [`stop`](Self::stop) is called.
    pub fn run(&self) {
        info!(addr = %self.local_addr(), "datagram server running");
        let mut buf = vec![0u8; self.config.max_frame_size + LEN_HEADER];

        while self.running.load(Ordering::SeqCst) {
            let (received, from) = match self.socket.recv_from(&mut buf) {
                Ok(result) => result,
                Err(TransportError::Io(err))
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    // Liveness tick: re-check the shutdown flag.
                    continue;
                }
                Err(err) => {
                    warn!(error = %err, "datagram receive failed");
                    break;
                }
            };

            let frame = match codec::decode_datagram(&buf[..received], self.config.max_frame_size)
            {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(%from, error = %err, "dropping malformed datagram");
                    continue;
                }
            };

            // Register or refresh the sender before dispatch so a push
            // triggered by this very request reaches it.
            self.clients
                .lock()
                .expect("client registry lock poisoned")
                .insert(from);

            match self.dispatch.dispatch(&frame) {
                Ok(Dispatched::Reply(response)) => {
                    if let Err(err) = self.send_framed(&response, from) {
                        warn!(%from, error = %err, "response send failed");
                    }
                }
                Ok(Dispatched::OneWay) => {}
                Ok(Dispatched::Unknown) => {
                    let request_id = message::message_id(&frame).unwrap_or(0);
                    warn!(%from, request_id, "ignoring unknown request id");
                }
                Err(err) => {
                    warn!(%from, error = %err, "dropping malformed request");
                }
            }
        }

        debug!("datagram loop exited");
    }

    fn send_framed(&self, message: &[u8], to: SocketAddr) -> Result<()> {
        let mut buf = self.send.lock().expect("send lock poisoned");
        buf.clear();
        codec::encode_frame(message, &mut buf)?;
        self.socket.send_to(&buf, to)?;
        Ok(())
    }

    /// Frame a message once and send the datagram to every registered
    /// client, optionally excluding one address. Returns the number of
    /// clients written to. Delivery is best-effort.
    pub fn broadcast(&self, message: &[u8], exclude: Option<SocketAddr>) -> usize {
        let addrs: Vec<SocketAddr> = self
            .clients
            .lock()
            .expect("client registry lock poisoned")
            .iter()
            .copied()
            .collect();

        let mut buf = self.send.lock().expect("send lock poisoned");
        buf.clear();
        if let Err(err) = codec::encode_frame(message, &mut buf) {
            warn!(error = %err, "broadcast message unframeable");
            return 0;
        }

        let mut sent = 0usize;
        for addr in addrs {
            if Some(addr) == exclude {
                continue;
            }
            match self.socket.send_to(&buf, addr) {
                Ok(_) => sent += 1,
                Err(err) => warn!(%addr, error = %err, "broadcast send failed"),
            }
        }

        sent
    }

    /// Number of addresses in the client registry.
    pub fn client_count(&self) -> usize {
        self.clients
            .lock()
            .expect("client registry lock poisoned")
            .len()
    }

    /// Stop the receive loop (observed at the next poll tick) and empty the
    /// client registry.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.clients
            .lock()
            .expect("client registry lock poisoned")
            .clear();
        info!("datagram server stopped");
    }
}
