use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use idlrpc_frame::{message, FrameConfig, FrameError, FrameReader, FrameWriter};
use idlrpc_transport::{RpcStream, TcpEndpoint};
use tracing::{debug, info, warn};

use crate::clients::{ClientHandle, ClientId, ClientSet};
use crate::config::ServerConfig;
use crate::dispatch::{Dispatched, ServiceDispatch};
use crate::error::Result;

type ConnectionHook = Arc<dyn Fn(ClientId) + Send + Sync>;

/// Stream-binding server.
///
/// [`run`](Self::run) accepts connections until [`stop`](Self::stop); each
/// accepted connection gets a dedicated worker thread that reads frames,
/// routes them through the service dispatcher, and writes framed responses
/// back on the same connection. Connections are registered in the tracked
/// set before their first frame is read and deregistered after the worker
/// exits.
pub struct StreamServer<D> {
    endpoint: TcpEndpoint,
    dispatch: Arc<D>,
    clients: Arc<ClientSet>,
    running: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_client_id: AtomicU64,
    on_connected: Option<ConnectionHook>,
    on_disconnected: Option<ConnectionHook>,
    config: ServerConfig,
}

impl<D: ServiceDispatch + 'static> StreamServer<D> {
    /// Bind the listening endpoint. Port 0 binds an ephemeral port.
    pub fn bind(addr: SocketAddr, dispatch: D, config: ServerConfig) -> Result<Self> {
        let endpoint = TcpEndpoint::bind(addr)?;
        Ok(Self {
            endpoint,
            dispatch: Arc::new(dispatch),
            clients: Arc::new(ClientSet::new()),
            running: Arc::new(AtomicBool::new(true)),
            workers: Mutex::new(Vec::new()),
            next_client_id: AtomicU64::new(1),
            on_connected: None,
            on_disconnected: None,
            config,
        })
    }

    /// Install a hook invoked after a connection is registered, before its
    /// first frame is read.
    pub fn on_client_connected(mut self, hook: impl Fn(ClientId) + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Arc::new(hook));
        self
    }

    /// Install a hook invoked after a connection's worker exits and the
    /// connection is deregistered.
    pub fn on_client_disconnected(
        mut self,
        hook: impl Fn(ClientId) + Send + Sync + 'static,
    ) -> Self {
        self.on_disconnected = Some(Arc::new(hook));
        self
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    /// Accept and serve connections until [`stop`](Self::stop) is called.
    pub fn run(&self) {
        info!(addr = %self.local_addr(), "stream server running");

        while self.running.load(Ordering::SeqCst) {
            let stream = match self.endpoint.accept() {
                Ok(stream) => stream,
                Err(err) => {
                    if self.running.load(Ordering::SeqCst) {
                        warn!(error = %err, "accept failed");
                        continue;
                    }
                    break;
                }
            };

            if !self.running.load(Ordering::SeqCst) {
                // The wake-up connection from stop(); not a client.
                break;
            }

            match self.spawn_worker(stream) {
                Ok(handle) => self
                    .workers
                    .lock()
                    .expect("worker list lock poisoned")
                    .push(handle),
                Err(err) => warn!(error = %err, "failed to start connection worker"),
            }
        }

        debug!("accept loop exited");
    }

    fn spawn_worker(&self, stream: RpcStream) -> Result<JoinHandle<()>> {
        let id = ClientId(self.next_client_id.fetch_add(1, Ordering::Relaxed));
        let addr = stream.peer_addr().ok();

        let frame_config = FrameConfig {
            max_frame_size: self.config.max_frame_size,
            read_timeout: Some(self.config.poll_timeout),
            write_timeout: Some(self.config.poll_timeout),
        };

        let reader_stream = stream.try_clone()?;
        let reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
        let writer = Arc::new(Mutex::new(FrameWriter::with_config_stream(
            stream,
            frame_config,
        )?));

        // Registration precedes the first frame read so broadcasts reach the
        // client from the moment it connects.
        self.clients.insert(ClientHandle {
            id,
            addr,
            writer: Arc::clone(&writer),
        });

        let clients = Arc::clone(&self.clients);
        let dispatch = Arc::clone(&self.dispatch);
        let running = Arc::clone(&self.running);
        let on_connected = self.on_connected.clone();
        let on_disconnected = self.on_disconnected.clone();

        let handle = std::thread::Builder::new()
            .name(format!("idlrpc-conn-{}", id.0))
            .spawn(move || {
                debug!(%id, ?addr, "client connected");
                if let Some(hook) = &on_connected {
                    hook(id);
                }

                connection_loop(id, reader, &writer, dispatch.as_ref(), &running);

                clients.remove(id);
                if let Some(hook) = &on_disconnected {
                    hook(id);
                }
                debug!(%id, "client disconnected");
            })
            .map_err(idlrpc_transport::TransportError::Io)?;

        Ok(handle)
    }

    /// Serialize a message once and send the framed bytes to every tracked
    /// client, optionally excluding one (used to avoid echoing a push back
    /// to its originator). Returns the number of clients written to.
    ///
    /// Delivery is best-effort: a failed send is logged and the client's own
    /// worker observes the teardown on its next read.
    pub fn broadcast(&self, message: &[u8], exclude: Option<ClientId>) -> usize {
        let handles = self.clients.snapshot();
        let mut sent = 0usize;

        for handle in handles {
            if Some(handle.id) == exclude {
                continue;
            }
            let mut writer = handle.writer.lock().expect("client writer lock poisoned");
            match writer.send(message) {
                Ok(()) => sent += 1,
                Err(err) => warn!(id = %handle.id, error = %err, "broadcast send failed"),
            }
        }

        sent
    }

    /// Number of currently tracked connections.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Stop accepting, stop the workers, and empty the tracked set.
    ///
    /// Workers observe the flag at their next receive tick (bounded by the
    /// poll timeout); the accept loop is woken by a loopback connection.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        // Wake the blocking accept; the woken iteration sees the flag.
        let _ = TcpEndpoint::connect(self.local_addr());

        let workers = std::mem::take(
            &mut *self.workers.lock().expect("worker list lock poisoned"),
        );
        for handle in workers {
            if handle.join().is_err() {
                warn!("connection worker panicked");
            }
        }

        self.clients.clear();
        info!("stream server stopped");
    }
}

impl<D> Drop for StreamServer<D> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let workers = std::mem::take(
            &mut *self.workers.lock().expect("worker list lock poisoned"),
        );
        for handle in workers {
            let _ = handle.join();
        }
    }
}

fn connection_loop<D: ServiceDispatch>(
    id: ClientId,
    mut reader: FrameReader<RpcStream>,
    writer: &Mutex<FrameWriter<RpcStream>>,
    dispatch: &D,
    running: &AtomicBool,
) {
    while running.load(Ordering::SeqCst) {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                // Liveness tick: re-check the shutdown flag.
                continue;
            }
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => {
                // Framing is unrecoverable once the length accounting is in
                // doubt; tear the connection down.
                warn!(%id, error = %err, "receive failed, closing connection");
                break;
            }
        };

        match dispatch.dispatch(&frame) {
            Ok(Dispatched::Reply(response)) => {
                let mut writer = writer.lock().expect("client writer lock poisoned");
                if let Err(err) = writer.send(&response) {
                    warn!(%id, error = %err, "response send failed, closing connection");
                    break;
                }
            }
            Ok(Dispatched::OneWay) => {}
            Ok(Dispatched::Unknown) => {
                let request_id = message::message_id(&frame).unwrap_or(0);
                warn!(%id, request_id, "ignoring unknown request id");
            }
            Err(err) => {
                warn!(%id, error = %err, "dropping malformed request");
            }
        }
    }
}
