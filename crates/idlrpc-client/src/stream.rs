use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use bytes::Bytes;
use idlrpc_frame::{message, FrameConfig, FrameError, FrameReader, FrameWriter};
use idlrpc_transport::{RpcStream, TcpEndpoint};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::push::PushDispatch;
use crate::queue::{ResponseQueue, TakeError};

/// Stream-binding client endpoint.
///
/// Owns the TCP connection, a listener thread that demultiplexes RPC
/// responses from server pushes, a send lock, and the response-correlation
/// queue. Dropping the client shuts the connection down and joins the
/// listener.
pub struct StreamClient {
    writer: Mutex<FrameWriter<RpcStream>>,
    stream: RpcStream,
    queue: Arc<ResponseQueue>,
    shutdown: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
    config: ClientConfig,
}

impl StreamClient {
    /// Connect to a server and start the listener thread.
    ///
    /// Push frames observed by the listener are routed through `pushes`
    /// synchronously on the listener thread.
    pub fn connect(
        addr: SocketAddr,
        pushes: Arc<dyn PushDispatch>,
        config: ClientConfig,
    ) -> Result<Self> {
        let stream = TcpEndpoint::connect(addr)?;
        let reader_stream = stream.try_clone()?;
        let shutdown_stream = stream.try_clone()?;

        let frame_config = FrameConfig {
            max_frame_size: config.max_frame_size,
            read_timeout: Some(config.poll_timeout),
            write_timeout: Some(config.call_timeout),
        };

        let reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
        let writer = FrameWriter::with_config_stream(stream, frame_config)?;

        let queue = Arc::new(ResponseQueue::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let listener = {
            let queue = Arc::clone(&queue);
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("idlrpc-client-listener".to_string())
                .spawn(move || listener_loop(reader, queue, pushes, shutdown))
                .map_err(idlrpc_transport::TransportError::Io)?
        };

        Ok(Self {
            writer: Mutex::new(writer),
            stream: shutdown_stream,
            queue,
            shutdown,
            listener: Some(listener),
            config,
        })
    }

    /// Send a request and wait for the response carrying `response_id`.
    ///
    /// The request bytes go out as one frame under the send lock; the wait
    /// is bounded by the configured call timeout. A response that arrives
    /// after the timeout stays in the queue as an orphan until the client is
    /// destroyed.
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
                "connection is closed".to_string(),
            ));
        }

        let mut writer = self.writer.lock().expect("send lock poisoned");
        writer.send(request)?;
        Ok(())
    }

    /// Whether the listener is still serving the connection.
    pub fn is_connected(&self) -> bool {
        !self.queue.is_closed()
    }

    /// Stop the listener thread and wait for it to exit.
    ///
    /// The join is bounded by the poll timeout: the listener observes the
    /// flag on its next receive tick.
    pub fn stop_listening(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.listener.take() {
            if handle.join().is_err() {
                warn!("client listener panicked");
            }
        }
    }

    /// The client-side configuration in effect.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Unblock the listener immediately rather than waiting out the poll
        // tick; pending queue entries die with the queue.
        self.stream.shutdown();
        self.stop_listening();
    }
}

fn listener_loop(
    mut reader: FrameReader<RpcStream>,
    queue: Arc<ResponseQueue>,
    pushes: Arc<dyn PushDispatch>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                // Liveness tick: re-check the shutdown flag.
                continue;
            }
            Err(FrameError::ConnectionClosed) => {
                debug!("server closed the connection");
                break;
            }
            Err(err) => {
                warn!(error = %err, "listener receive failed");
                break;
            }
        };

        let id = match message::message_id(&frame) {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "dropping runt frame");
                continue;
            }
        };

        if pushes.is_push(id) {
            pushes.dispatch(id, &frame);
        } else {
            queue.push(id, frame);
        }
    }

    queue.close();
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::{Duration, Instant};

    use idlrpc_codec::{WireReader, WireWriter};
    use idlrpc_frame::message::{write_request_header, write_response_header, STATUS_OK};
    use idlrpc_frame::FrameReader as ServerReader;
    use idlrpc_frame::FrameWriter as ServerWriter;

    use super::*;
    use crate::push::NoPushes;

    const ECHO_REQ: u32 = 1000;
    const ECHO_RESP: u32 = 1001;
    const EVENT_PUSH: u32 = 1002;

    /// Minimal hand-rolled peer: answers each echo request, optionally
    /// pushing an event frame first.
    fn spawn_echo_server(push_before_reply: bool) -> (SocketAddr, thread::JoinHandle<()>) {
        let endpoint = TcpEndpoint::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = endpoint.local_addr();

        let handle = thread::spawn(move || {
            let stream = endpoint.accept().unwrap();
            let mut reader = ServerReader::new(stream.try_clone().unwrap());
            let mut writer = ServerWriter::new(stream);

            while let Ok(frame) = reader.read_frame() {
                let mut r = WireReader::new(&frame);
                let id = r.get_u32().unwrap();
                assert_eq!(id, ECHO_REQ);
                let value = r.get_i32().unwrap();

                if push_before_reply {
                    let mut push = WireWriter::new();
                    write_request_header(&mut push, EVENT_PUSH);
                    push.put_str("event");
                    writer.send(push.as_slice()).unwrap();
                }

                let mut response = WireWriter::new();
                write_response_header(&mut response, ECHO_RESP, STATUS_OK);
                response.put_i32(value + 1);
                writer.send(response.as_slice()).unwrap();
            }
        });

        (addr, handle)
    }

    fn call_echo(client: &StreamClient, value: i32) -> Result<i32> {
        let mut request = WireWriter::new();
        write_request_header(&mut request, ECHO_REQ);
        request.put_i32(value);

        let response = client.call(request.as_slice(), ECHO_RESP)?;
        let mut r = WireReader::new(&response);
        let _header = idlrpc_frame::ResponseHeader::read(&mut r)?;
        Ok(r.get_i32()?)
    }

    #[test]
    fn sequential_calls_observe_responses_in_order() {
        let (addr, server) = spawn_echo_server(false);
        let client =
            StreamClient::connect(addr, Arc::new(NoPushes), ClientConfig::default()).unwrap();

        for i in 0..16 {
            assert_eq!(call_echo(&client, i).unwrap(), i + 1);
        }

        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn push_frames_bypass_the_response_queue() {
        struct CountingPushes {
            hits: AtomicUsize,
        }

        impl PushDispatch for CountingPushes {
            fn is_push(&self, id: u32) -> bool {
                id == EVENT_PUSH
            }

            fn dispatch(&self, id: u32, message: &[u8]) {
                assert_eq!(id, EVENT_PUSH);
                let mut r = WireReader::new(message);
                assert_eq!(r.get_u32().unwrap(), EVENT_PUSH);
                assert_eq!(r.get_str().unwrap(), "event");
                self.hits.fetch_add(1, Ordering::SeqCst);
            }
        }

        let (addr, server) = spawn_echo_server(true);
        let pushes = Arc::new(CountingPushes {
            hits: AtomicUsize::new(0),
        });
        let client =
            StreamClient::connect(addr, Arc::clone(&pushes) as _, ClientConfig::default()).unwrap();

        assert_eq!(call_echo(&client, 41).unwrap(), 42);
        assert_eq!(call_echo(&client, 1).unwrap(), 2);

        // Pushes were dispatched, not queued as responses.
        assert_eq!(pushes.hits.load(Ordering::SeqCst), 2);

        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn call_times_out_when_server_is_silent() {
        let endpoint = TcpEndpoint::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = endpoint.local_addr();
        let server = thread::spawn(move || {
            let stream = endpoint.accept().unwrap();
            // Hold the connection open without replying.
            thread::sleep(Duration::from_millis(300));
            drop(stream);
        });

        let config = ClientConfig {
            call_timeout: Duration::from_millis(100),
            ..ClientConfig::default()
        };
        let client = StreamClient::connect(addr, Arc::new(NoPushes), config).unwrap();

        let mut request = WireWriter::new();
        write_request_header(&mut request, ECHO_REQ);
        request.put_i32(7);

        let err = client.call(request.as_slice(), ECHO_RESP).unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));

        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn call_after_server_close_is_disconnected() {
        let endpoint = TcpEndpoint::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = endpoint.local_addr();
        let server = thread::spawn(move || {
            let stream = endpoint.accept().unwrap();
            drop(stream);
        });

        let config = ClientConfig {
            poll_timeout: Duration::from_millis(50),
            call_timeout: Duration::from_millis(200),
            ..ClientConfig::default()
        };
        let client = StreamClient::connect(addr, Arc::new(NoPushes), config).unwrap();
        server.join().unwrap();

        // Give the listener a tick to observe end-of-stream.
        let deadline = Instant::now() + Duration::from_secs(1);
        while client.is_connected() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!client.is_connected());

        let mut request = WireWriter::new();
        write_request_header(&mut request, ECHO_REQ);
        request.put_i32(7);
        let err = client.call(request.as_slice(), ECHO_RESP).unwrap_err();
        assert!(matches!(err, ClientError::Disconnected(_)));
    }

    #[test]
    fn drop_joins_listener_promptly() {
        let (addr, server) = spawn_echo_server(false);
        let client =
            StreamClient::connect(addr, Arc::new(NoPushes), ClientConfig::default()).unwrap();

        let start = Instant::now();
        drop(client);
        // Drop shuts the socket down, so the join is immediate rather than
        // waiting out the full poll tick.
        assert!(start.elapsed() < Duration::from_secs(2));

        server.join().unwrap();
    }
}
