//! End-to-end tests exercising the full type lattice over both bindings,
//! against a TypeTest service written in the shape the generator emits.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use idlrpc::client::{ClientConfig, DatagramClient, NoPushes, StreamClient};
use idlrpc::codec::{Decode, Encode, WireReader, WireWriter};
use idlrpc::frame::message::{write_request_header, write_response_header, STATUS_OK};
use idlrpc::frame::ResponseHeader;
use idlrpc::server::{DatagramServer, Dispatched, ServerConfig, ServiceDispatch, StreamServer};

// Message ids: base 1000, declaration order.
const TEST_INTEGERS_REQ: u32 = 1000;
const TEST_INTEGERS_RESP: u32 = 1001;
const TEST_FLOATS_REQ: u32 = 1002;
const TEST_FLOATS_RESP: u32 = 1003;
const TEST_STRING_REQ: u32 = 1004;
const TEST_STRING_RESP: u32 = 1005;
const TEST_STRUCT_REQ: u32 = 1006;
const TEST_STRUCT_RESP: u32 = 1007;
const TEST_ENUM_REQ: u32 = 1008;
const TEST_ENUM_RESP: u32 = 1009;
const TEST_IN_OUT_REQ: u32 = 1010;
const TEST_IN_OUT_RESP: u32 = 1011;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Encode for Priority {
    fn encode(&self, writer: &mut WireWriter) {
        writer.put_i32(*self as i32);
    }
}

impl Decode for Priority {
    fn decode(reader: &mut WireReader<'_>) -> idlrpc::codec::Result<Self> {
        Ok(match reader.get_enum(4)? {
            0 => Self::Low,
            1 => Self::Medium,
            2 => Self::High,
            _ => Self::Critical,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct IntegerTypes {
    i8_value: i8,
    u8_value: u8,
    i16_value: i16,
    u16_value: u16,
    i32_value: i32,
    u32_value: u32,
    i64_value: i64,
    u64_value: u64,
}

impl Encode for IntegerTypes {
    fn encode(&self, writer: &mut WireWriter) {
        writer.put_i8(self.i8_value);
        writer.put_u8(self.u8_value);
        writer.put_i16(self.i16_value);
        writer.put_u16(self.u16_value);
        writer.put_i32(self.i32_value);
        writer.put_u32(self.u32_value);
        writer.put_i64(self.i64_value);
        writer.put_u64(self.u64_value);
    }
}

impl Decode for IntegerTypes {
    fn decode(reader: &mut WireReader<'_>) -> idlrpc::codec::Result<Self> {
        Ok(Self {
            i8_value: reader.get_i8()?,
            u8_value: reader.get_u8()?,
            i16_value: reader.get_i16()?,
            u16_value: reader.get_u16()?,
            i32_value: reader.get_i32()?,
            u32_value: reader.get_u32()?,
            i64_value: reader.get_i64()?,
            u64_value: reader.get_u64()?,
        })
    }
}

trait TypeTestHandler: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn test_integers(
        &self,
        i8v: i8,
        u8v: u8,
        i16v: i16,
        u16v: u16,
        i32v: i32,
        u32v: u32,
        i64v: i64,
        u64v: u64,
    ) -> i32;
    fn test_floats(&self, f: f32, d: f64) -> f64;
    fn test_string(&self, s: String) -> String;
    fn test_struct(&self, data: IntegerTypes) -> IntegerTypes;
    fn test_enum(&self, p: Priority) -> Priority;
    fn test_in_out(
        &self,
        value: i32,
        s: String,
        data: IntegerTypes,
        seq: Vec<i32>,
    ) -> (i32, String, IntegerTypes, Vec<i32>);
}

struct TypeTestDispatch<H> {
    handler: H,
}

fn reply(id: u32, build: impl FnOnce(&mut WireWriter)) -> Dispatched {
    let mut w = WireWriter::new();
    write_response_header(&mut w, id, STATUS_OK);
    build(&mut w);
    Dispatched::Reply(w.freeze())
}

impl<H: TypeTestHandler> ServiceDispatch for TypeTestDispatch<H> {
    fn dispatch(&self, message: &[u8]) -> idlrpc::codec::Result<Dispatched> {
        let mut r = WireReader::new(message);
        let id = r.get_u32()?;

        Ok(match id {
            TEST_INTEGERS_REQ => {
                let i8v = r.get_i8()?;
                let u8v = r.get_u8()?;
                let i16v = r.get_i16()?;
                let u16v = r.get_u16()?;
                let i32v = r.get_i32()?;
                let u32v = r.get_u32()?;
                let i64v = r.get_i64()?;
                let u64v = r.get_u64()?;
                let ret = self
                    .handler
                    .test_integers(i8v, u8v, i16v, u16v, i32v, u32v, i64v, u64v);
                reply(TEST_INTEGERS_RESP, |w| w.put_i32(ret))
            }
            TEST_FLOATS_REQ => {
                let f = r.get_f32()?;
                let d = r.get_f64()?;
                let ret = self.handler.test_floats(f, d);
                reply(TEST_FLOATS_RESP, |w| w.put_f64(ret))
            }
            TEST_STRING_REQ => {
                let s = r.get_str()?;
                let ret = self.handler.test_string(s);
                reply(TEST_STRING_RESP, |w| w.put_str(&ret))
            }
            TEST_STRUCT_REQ => {
                let data = IntegerTypes::decode(&mut r)?;
                let ret = self.handler.test_struct(data);
                reply(TEST_STRUCT_RESP, |w| ret.encode(w))
            }
            TEST_ENUM_REQ => {
                let p = Priority::decode(&mut r)?;
                let ret = self.handler.test_enum(p);
                reply(TEST_ENUM_RESP, |w| ret.encode(w))
            }
            TEST_IN_OUT_REQ => {
                let value = r.get_i32()?;
                let s = r.get_str()?;
                let data = IntegerTypes::decode(&mut r)?;
                let seq = Vec::<i32>::decode(&mut r)?;
                let (value, s, data, seq) = self.handler.test_in_out(value, s, data, seq);
                reply(TEST_IN_OUT_RESP, |w| {
                    w.put_i32(value);
                    w.put_str(&s);
                    data.encode(w);
                    seq.encode(w);
                })
            }
            _ => Dispatched::Unknown,
        })
    }
}

/// The reference handler behind the literal expectations below.
struct EchoHandler;

impl TypeTestHandler for EchoHandler {
    fn test_integers(
        &self,
        _i8v: i8,
        _u8v: u8,
        _i16v: i16,
        _u16v: u16,
        i32v: i32,
        _u32v: u32,
        _i64v: i64,
        _u64v: u64,
    ) -> i32 {
        i32v + 1000
    }

    fn test_floats(&self, f: f32, d: f64) -> f64 {
        f as f64 + d
    }

    fn test_string(&self, s: String) -> String {
        format!("Echo: {s}")
    }

    fn test_struct(&self, mut data: IntegerTypes) -> IntegerTypes {
        data.i32_value *= 2;
        data.i64_value *= 2;
        data
    }

    fn test_enum(&self, p: Priority) -> Priority {
        p
    }

    fn test_in_out(
        &self,
        value: i32,
        s: String,
        mut data: IntegerTypes,
        seq: Vec<i32>,
    ) -> (i32, String, IntegerTypes, Vec<i32>) {
        data.i32_value += 999;
        (
            value * 2,
            format!("{s}_modified"),
            data,
            seq.into_iter().map(|v| v + 100).collect(),
        )
    }
}

// Request builders and response decoders, shared by both bindings.

fn integers_request(values: (i8, u8, i16, u16, i32, u32, i64, u64)) -> WireWriter {
    let mut w = WireWriter::new();
    write_request_header(&mut w, TEST_INTEGERS_REQ);
    w.put_i8(values.0);
    w.put_u8(values.1);
    w.put_i16(values.2);
    w.put_u16(values.3);
    w.put_i32(values.4);
    w.put_u32(values.5);
    w.put_i64(values.6);
    w.put_u64(values.7);
    w
}

fn decode_i32_response(response: &[u8], expected_id: u32) -> i32 {
    let mut r = WireReader::new(response);
    let header = ResponseHeader::read(&mut r).unwrap();
    assert_eq!(header.id, expected_id);
    assert_eq!(header.status, STATUS_OK);
    r.get_i32().unwrap()
}

fn server_config() -> ServerConfig {
    ServerConfig {
        poll_timeout: Duration::from_millis(50),
        ..ServerConfig::default()
    }
}

fn start_stream_server() -> Arc<StreamServer<TypeTestDispatch<EchoHandler>>> {
    let server = Arc::new(
        StreamServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            TypeTestDispatch {
                handler: EchoHandler,
            },
            server_config(),
        )
        .unwrap(),
    );
    let runner = Arc::clone(&server);
    thread::spawn(move || runner.run());
    server
}

#[test]
fn integer_echo_returns_i32_plus_1000() {
    let server = start_stream_server();
    let client = StreamClient::connect(
        server.local_addr(),
        Arc::new(NoPushes),
        ClientConfig::default(),
    )
    .unwrap();

    let request = integers_request((1, 2, 3, 4, 5, 6, 7, 8));
    let response = client.call(request.as_slice(), TEST_INTEGERS_RESP).unwrap();
    assert_eq!(decode_i32_response(&response, TEST_INTEGERS_RESP), 1005);

    drop(client);
    server.stop();
}

#[test]
fn float_sum_within_binary32_rounding() {
    let server = start_stream_server();
    let client = StreamClient::connect(
        server.local_addr(),
        Arc::new(NoPushes),
        ClientConfig::default(),
    )
    .unwrap();

    let mut request = WireWriter::new();
    write_request_header(&mut request, TEST_FLOATS_REQ);
    request.put_f32(3.14);
    request.put_f64(2.718);

    let response = client.call(request.as_slice(), TEST_FLOATS_RESP).unwrap();
    let mut r = WireReader::new(&response);
    let _header = ResponseHeader::read(&mut r).unwrap();
    let sum = r.get_f64().unwrap();

    let expected = 3.14f32 as f64 + 2.718f64;
    assert!((sum - expected).abs() < 1e-12);
    assert!((sum - 5.858).abs() < 1e-6);

    drop(client);
    server.stop();
}

#[test]
fn string_echo_prefixes_payload() {
    let server = start_stream_server();
    let client = StreamClient::connect(
        server.local_addr(),
        Arc::new(NoPushes),
        ClientConfig::default(),
    )
    .unwrap();

    let mut request = WireWriter::new();
    write_request_header(&mut request, TEST_STRING_REQ);
    request.put_str("Hello World");

    let response = client.call(request.as_slice(), TEST_STRING_RESP).unwrap();
    let mut r = WireReader::new(&response);
    let _header = ResponseHeader::read(&mut r).unwrap();
    assert_eq!(r.get_str().unwrap(), "Echo: Hello World");

    drop(client);
    server.stop();
}

#[test]
fn struct_mutation_is_observed() {
    let server = start_stream_server();
    let client = StreamClient::connect(
        server.local_addr(),
        Arc::new(NoPushes),
        ClientConfig::default(),
    )
    .unwrap();

    let data = IntegerTypes {
        i32_value: 100,
        i64_value: 1000,
        ..IntegerTypes::default()
    };

    let mut request = WireWriter::new();
    write_request_header(&mut request, TEST_STRUCT_REQ);
    data.encode(&mut request);

    let response = client.call(request.as_slice(), TEST_STRUCT_RESP).unwrap();
    let mut r = WireReader::new(&response);
    let _header = ResponseHeader::read(&mut r).unwrap();
    let mutated = IntegerTypes::decode(&mut r).unwrap();

    assert_eq!(mutated.i32_value, 200);
    assert_eq!(mutated.i64_value, 2000);

    drop(client);
    server.stop();
}

#[test]
fn enum_round_trips_over_the_wire() {
    let server = start_stream_server();
    let client = StreamClient::connect(
        server.local_addr(),
        Arc::new(NoPushes),
        ClientConfig::default(),
    )
    .unwrap();

    for p in [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ] {
        let mut request = WireWriter::new();
        write_request_header(&mut request, TEST_ENUM_REQ);
        p.encode(&mut request);

        let response = client.call(request.as_slice(), TEST_ENUM_RESP).unwrap();
        let mut r = WireReader::new(&response);
        let _header = ResponseHeader::read(&mut r).unwrap();
        assert_eq!(Priority::decode(&mut r).unwrap(), p);
    }

    drop(client);
    server.stop();
}

#[test]
fn in_out_parameters_come_back_rewritten() {
    let server = start_stream_server();
    let client = StreamClient::connect(
        server.local_addr(),
        Arc::new(NoPushes),
        ClientConfig::default(),
    )
    .unwrap();

    // In-out parameters appear in both directions: input values in the
    // request, rewritten values in the response, declaration order.
    let mut value = 100i32;
    let mut text = "test".to_string();
    let mut data = IntegerTypes {
        i32_value: 50,
        ..IntegerTypes::default()
    };
    let mut seq = vec![1i32, 2, 3];

    let mut request = WireWriter::new();
    write_request_header(&mut request, TEST_IN_OUT_REQ);
    request.put_i32(value);
    request.put_str(&text);
    data.encode(&mut request);
    seq.encode(&mut request);

    let response = client.call(request.as_slice(), TEST_IN_OUT_RESP).unwrap();
    let mut r = WireReader::new(&response);
    let _header = ResponseHeader::read(&mut r).unwrap();
    // Copy-back only happens after the whole response decodes.
    value = r.get_i32().unwrap();
    text = r.get_str().unwrap();
    data = IntegerTypes::decode(&mut r).unwrap();
    seq = Vec::<i32>::decode(&mut r).unwrap();

    assert_eq!(value, 200);
    assert_eq!(text, "test_modified");
    assert_eq!(data.i32_value, 1049);
    assert_eq!(seq, vec![101, 102, 103]);

    drop(client);
    server.stop();
}

#[test]
fn datagram_binding_serves_the_same_dispatcher() {
    let server = Arc::new(
        DatagramServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            TypeTestDispatch {
                handler: EchoHandler,
            },
            server_config(),
        )
        .unwrap(),
    );
    let runner = Arc::clone(&server);
    thread::spawn(move || runner.run());

    let client = DatagramClient::connect(
        server.local_addr(),
        Arc::new(NoPushes),
        ClientConfig::default(),
    )
    .unwrap();

    let request = integers_request((1, 2, 3, 4, 5, 6, 7, 8));
    let response = client.call(request.as_slice(), TEST_INTEGERS_RESP).unwrap();
    assert_eq!(decode_i32_response(&response, TEST_INTEGERS_RESP), 1005);

    let mut request = WireWriter::new();
    write_request_header(&mut request, TEST_STRING_REQ);
    request.put_str("datagram");
    let response = client.call(request.as_slice(), TEST_STRING_RESP).unwrap();
    let mut r = WireReader::new(&response);
    let _header = ResponseHeader::read(&mut r).unwrap();
    assert_eq!(r.get_str().unwrap(), "Echo: datagram");

    assert_eq!(server.client_count(), 1);
    server.stop();
}
