use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use bytes::{Bytes, BytesMut};
use idlrpc_frame::{codec, message, LEN_HEADER};
use idlrpc_transport::{TransportError, UdpEndpoint};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::push::PushDispatch;
use crate::queue::{ResponseQueue, TakeError};

/// Datagram-binding client endpoint.
///
/// Same call surface as [`StreamClient`](crate::StreamClient); each request
/// travels as one datagram whose length prefix duplicates the datagram
/// length. The listener treats receive timeouts as liveness ticks rather
/// than errors.
pub struct DatagramClient {
    socket: UdpEndpoint,
    send: Mutex<BytesMut>,
    queue: Arc<ResponseQueue>,
    shutdown: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
    config: ClientConfig,
}

impl DatagramClient {
    /// Connect an ephemeral socket to the server address and start the
    /// listener thread.
    pub fn connect(
        addr: SocketAddr,
        pushes: Arc<dyn PushDispatch>,
        config: ClientConfig,
    ) -> Result<Self> {
        let socket = UdpEndpoint::connect(addr)?;
        socket.set_read_timeout(Some(config.poll_timeout))?;
        let recv_socket = socket.try_clone()?;

        let queue = Arc::new(ResponseQueue::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let listener = {
            let queue = Arc::clone(&queue);
            let shutdown = Arc::clone(&shutdown);
            let max_frame = config.max_frame_size;
            std::thread::Builder::new()
                .name("idlrpc-client-datagram-listener".to_string())
                .spawn(move || listener_loop(recv_socket, queue, pushes, shutdown, max_frame))
                .map_err(TransportError::Io)?
        };

        Ok(Self {
            socket,
            send: Mutex::new(BytesMut::new()),
            queue,
            shutdown,
            listener: Some(listener),
            config,
        })
    }

    /// Send a request datagram and wait for the response carrying
    /// `response_id`.
    pub fn call(&self, request: &[u8], response_id: u32) -> Result<Bytes> {
        self.send_oneway(request)?;

        match self.queue.take(response_id, self.config.call_timeout) {
            Ok(message) => Ok(message),
            Err(TakeError::Timeout) => Err(ClientError::Timeout(self.config.call_timeout)),
            Err(TakeError::Closed) => Err(ClientError::Disconnected(
                "listener exited before response arrived".to_string(),
            )),
        }
    }

    /// Send a request that has no response message.
    pub fn send_oneway(&self, request: &[u8]) -> Result<()> {
        if self.queue.is_closed() {
            return Err(ClientError::Disconnected(
                "listener is stopped".to_string(),
            ));
        }

        let mut buf = self.send.lock().expect("send lock poisoned");
        buf.clear();
        codec::encode_frame(request, &mut buf)?;
        self.socket.send(&buf)?;
        Ok(())
    }

    /// Whether the listener is still running.
    pub fn is_connected(&self) -> bool {
        !self.queue.is_closed()
    }

    /// Stop the listener thread; the join is bounded by the poll timeout.
    pub fn stop_listening(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.listener.take() {
            if handle.join().is_err() {
                warn!("datagram listener panicked");
            }
        }
    }

    /// The client-side configuration in effect.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Drop for DatagramClient {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

fn listener_loop(
    socket: UdpEndpoint,
    queue: Arc<ResponseQueue>,
    pushes: Arc<dyn PushDispatch>,
    shutdown: Arc<AtomicBool>,
    max_frame: usize,
) {
    let mut buf = vec![0u8; max_frame + LEN_HEADER];

    while !shutdown.load(Ordering::SeqCst) {
        let received = match socket.recv(&mut buf) {
            Ok(n) => n,
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

        let frame = match codec::decode_datagram(&buf[..received], max_frame) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "dropping malformed datagram");
                continue;
            }
        };

        let id = match message::message_id(&frame) {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "dropping runt datagram");
                continue;
            }
        };

        if pushes.is_push(id) {
            pushes.dispatch(id, &frame);
        } else {
            queue.push(id, frame);
        }
    }

    debug!("datagram listener exiting");
    queue.close();
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use idlrpc_codec::{WireReader, WireWriter};
    use idlrpc_frame::message::{write_request_header, write_response_header, STATUS_OK};

    use super::*;
    use crate::push::NoPushes;

    const ECHO_REQ: u32 = 1000;
    const ECHO_RESP: u32 = 1001;

    fn spawn_echo_server(replies: usize) -> (SocketAddr, thread::JoinHandle<()>) {
        let socket = UdpEndpoint::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = socket.local_addr();

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 64 * 1024 + LEN_HEADER];
            for _ in 0..replies {
                let (n, from) = socket.recv_from(&mut buf).unwrap();
                let frame = codec::decode_datagram(&buf[..n], 64 * 1024).unwrap();

                let mut r = WireReader::new(&frame);
                assert_eq!(r.get_u32().unwrap(), ECHO_REQ);
                let value = r.get_i32().unwrap();

                let mut response = WireWriter::new();
                write_response_header(&mut response, ECHO_RESP, STATUS_OK);
                response.put_i32(value + 1);

                let mut out = BytesMut::new();
                codec::encode_frame(response.as_slice(), &mut out).unwrap();
                socket.send_to(&out, from).unwrap();
            }
        });

        (addr, handle)
    }

    fn call_echo(client: &DatagramClient, value: i32) -> Result<i32> {
        let mut request = WireWriter::new();
        write_request_header(&mut request, ECHO_REQ);
        request.put_i32(value);

        let response = client.call(request.as_slice(), ECHO_RESP)?;
        let mut r = WireReader::new(&response);
        let _header = idlrpc_frame::ResponseHeader::read(&mut r)?;
        Ok(r.get_i32()?)
    }

    #[test]
    fn datagram_call_round_trip() {
        let (addr, server) = spawn_echo_server(3);
        let client =
            DatagramClient::connect(addr, Arc::new(NoPushes), ClientConfig::default()).unwrap();

        for i in [0, -5, 1000] {
            assert_eq!(call_echo(&client, i).unwrap(), i + 1);
        }

        server.join().unwrap();
    }

    #[test]
    fn call_times_out_without_reply() {
        let socket = UdpEndpoint::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = socket.local_addr();

        let config = ClientConfig {
            call_timeout: Duration::from_millis(100),
            poll_timeout: Duration::from_millis(50),
            ..ClientConfig::default()
        };
        let client = DatagramClient::connect(addr, Arc::new(NoPushes), config).unwrap();

        let mut request = WireWriter::new();
        write_request_header(&mut request, ECHO_REQ);
        request.put_i32(1);

        let err = client.call(request.as_slice(), ECHO_RESP).unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
    }

    #[test]
    fn stop_listening_joins_within_poll_timeout() {
        let socket = UdpEndpoint::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = socket.local_addr();

        let config = ClientConfig {
            poll_timeout: Duration::from_millis(50),
            ..ClientConfig::default()
        };
        let mut client = DatagramClient::connect(addr, Arc::new(NoPushes), config).unwrap();

        thread::sleep(Duration::from_millis(10));
        let start = Instant::now();
        client.stop_listening();
        assert!(start.elapsed() < Duration::from_millis(500));
        assert!(!client.is_connected());
    }

    #[test]
    fn malformed_datagrams_are_dropped_not_fatal() {
        let socket = UdpEndpoint::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let server_addr = socket.local_addr();

        let config = ClientConfig {
            call_timeout: Duration::from_millis(500),
            poll_timeout: Duration::from_millis(50),
            ..ClientConfig::default()
        };
        let client = DatagramClient::connect(server_addr, Arc::new(NoPushes), config).unwrap();

        // Learn the client's address from its request, answer with garbage,
        // then with the real response.
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 64 * 1024];
            let (_, from) = socket.recv_from(&mut buf).unwrap();
            socket.send_to(&[0xFF, 0x00, 0x01], from).unwrap();

            let mut response = WireWriter::new();
            write_response_header(&mut response, ECHO_RESP, STATUS_OK);
            response.put_i32(8);
            let mut out = BytesMut::new();
            codec::encode_frame(response.as_slice(), &mut out).unwrap();
            socket.send_to(&out, from).unwrap();
        });

        assert_eq!(call_echo(&client, 7).unwrap(), 8);
        handle.join().unwrap();
    }
}
