//! Runtime module for the `KeyValueStore` service, in the shape the code
//! generator emits: message ids in declaration order, wire types, a typed
//! client with overridable event slots, and the server-side handler trait,
//! dispatcher, and push methods.

use std::net::SocketAddr;
use std::sync::Arc;

use idlrpc_client::{ClientConfig, PushDispatch, StreamClient};
use idlrpc_codec::{Decode, Encode, WireReader, WireWriter};
use idlrpc_frame::message::{write_request_header, write_response_header, STATUS_OK};
use idlrpc_frame::ResponseHeader;
use idlrpc_server::{ClientId, Dispatched, ServerConfig, ServiceDispatch, StreamServer};
use tracing::warn;

// Message ids: base 1000, declaration order. clear is one-way; the three
// on_* channels are pushes (request-form only).
pub const SET_REQ: u32 = 1000;
pub const SET_RESP: u32 = 1001;
pub const GET_REQ: u32 = 1002;
pub const GET_RESP: u32 = 1003;
pub const REMOVE_REQ: u32 = 1004;
pub const REMOVE_RESP: u32 = 1005;
pub const EXISTS_REQ: u32 = 1006;
pub const EXISTS_RESP: u32 = 1007;
pub const COUNT_REQ: u32 = 1008;
pub const COUNT_RESP: u32 = 1009;
pub const CLEAR_REQ: u32 = 1010;
pub const BATCH_SET_REQ: u32 = 1011;
pub const BATCH_SET_RESP: u32 = 1012;
pub const BATCH_GET_REQ: u32 = 1013;
pub const BATCH_GET_RESP: u32 = 1014;
pub const ON_KEY_CHANGED: u32 = 1015;
pub const ON_BATCH_CHANGED: u32 = 1016;
pub const ON_CONNECTION_STATUS: u32 = 1017;

/// Outcome of a store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Success,
    KeyNotFound,
    InvalidKey,
    Error,
}

impl Encode for OperationStatus {
    fn encode(&self, writer: &mut WireWriter) {
        writer.put_i32(*self as i32);
    }
}

impl Decode for OperationStatus {
    fn decode(reader: &mut WireReader<'_>) -> idlrpc_codec::Result<Self> {
        Ok(match reader.get_enum(4)? {
            0 => Self::Success,
            1 => Self::KeyNotFound,
            2 => Self::InvalidKey,
            _ => Self::Error,
        })
    }
}

/// Kind of store mutation carried by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEventType {
    KeyAdded,
    KeyUpdated,
    KeyRemoved,
    StoreCleared,
}

impl Encode for ChangeEventType {
    fn encode(&self, writer: &mut WireWriter) {
        writer.put_i32(*self as i32);
    }
}

impl Decode for ChangeEventType {
    fn decode(reader: &mut WireReader<'_>) -> idlrpc_codec::Result<Self> {
        Ok(match reader.get_enum(4)? {
            0 => Self::KeyAdded,
            1 => Self::KeyUpdated,
            2 => Self::KeyRemoved,
            _ => Self::StoreCleared,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl Encode for KeyValue {
    fn encode(&self, writer: &mut WireWriter) {
        self.key.encode(writer);
        self.value.encode(writer);
    }
}

impl Decode for KeyValue {
    fn decode(reader: &mut WireReader<'_>) -> idlrpc_codec::Result<Self> {
        Ok(Self {
            key: String::decode(reader)?,
            value: String::decode(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub event_type: ChangeEventType,
    pub key: String,
    pub old_value: String,
    pub new_value: String,
    pub timestamp: i64,
}

impl Encode for ChangeEvent {
    fn encode(&self, writer: &mut WireWriter) {
        self.event_type.encode(writer);
        self.key.encode(writer);
        self.old_value.encode(writer);
        self.new_value.encode(writer);
        self.timestamp.encode(writer);
    }
}

impl Decode for ChangeEvent {
    fn decode(reader: &mut WireReader<'_>) -> idlrpc_codec::Result<Self> {
        Ok(Self {
            event_type: ChangeEventType::decode(reader)?,
            key: String::decode(reader)?,
            old_value: String::decode(reader)?,
            new_value: String::decode(reader)?,
            timestamp: i64::decode(reader)?,
        })
    }
}

/// Client-side notification slots. Defaults ignore every notification;
/// override the channels you care about. Called synchronously on the
/// client's listener thread.
pub trait KeyValueStoreEvents: Send + Sync {
    fn on_key_changed(&self, _event: ChangeEvent) {}
    fn on_batch_changed(&self, _events: Vec<ChangeEvent>) {}
    fn on_connection_status(&self, _connected: bool) {}
}

/// Event sink that ignores every notification.
pub struct IgnoreEvents;

impl KeyValueStoreEvents for IgnoreEvents {}

/// Routes push frames to the event slots. Generated from the service's
/// push-channel table.
struct EventRouter {
    events: Arc<dyn KeyValueStoreEvents>,
}

impl EventRouter {
    fn route(&self, id: u32, message: &[u8]) -> idlrpc_codec::Result<()> {
        let mut reader = WireReader::new(message);
        let _id = reader.get_u32()?;
        match id {
            ON_KEY_CHANGED => self.events.on_key_changed(ChangeEvent::decode(&mut reader)?),
            ON_BATCH_CHANGED => self
                .events
                .on_batch_changed(Vec::<ChangeEvent>::decode(&mut reader)?),
            ON_CONNECTION_STATUS => self.events.on_connection_status(reader.get_bool()?),
            _ => {}
        }
        Ok(())
    }
}

impl PushDispatch for EventRouter {
    fn is_push(&self, id: u32) -> bool {
        matches!(id, ON_KEY_CHANGED | ON_BATCH_CHANGED | ON_CONNECTION_STATUS)
    }

    fn dispatch(&self, id: u32, message: &[u8]) {
        if let Err(err) = self.route(id, message) {
            warn!(id, error = %err, "dropping malformed notification");
        }
    }
}

/// Typed client for the KeyValueStore service (stream binding).
pub struct KeyValueStoreClient {
    core: StreamClient,
}

impl KeyValueStoreClient {
    /// Connect with notifications ignored.
    pub fn connect(addr: SocketAddr) -> idlrpc_client::Result<Self> {
        Self::connect_with(addr, Arc::new(IgnoreEvents), ClientConfig::default())
    }

    /// Connect with an event sink and explicit configuration.
    pub fn connect_with(
        addr: SocketAddr,
        events: Arc<dyn KeyValueStoreEvents>,
        config: ClientConfig,
    ) -> idlrpc_client::Result<Self> {
        let core = StreamClient::connect(addr, Arc::new(EventRouter { events }), config)?;
        Ok(Self { core })
    }

    pub fn set(&self, key: &str, value: &str) -> idlrpc_client::Result<bool> {
        let mut w = WireWriter::new();
        write_request_header(&mut w, SET_REQ);
        w.put_str(key);
        w.put_str(value);

        let response = self.core.call(w.as_slice(), SET_RESP)?;
        let mut r = WireReader::new(&response);
        let _header = ResponseHeader::read(&mut r)?;
        Ok(r.get_bool()?)
    }

    pub fn get(&self, key: &str) -> idlrpc_client::Result<String> {
        let mut w = WireWriter::new();
        write_request_header(&mut w, GET_REQ);
        w.put_str(key);

        let response = self.core.call(w.as_slice(), GET_RESP)?;
        let mut r = WireReader::new(&response);
        let _header = ResponseHeader::read(&mut r)?;
        Ok(r.get_str()?)
    }

    pub fn remove(&self, key: &str) -> idlrpc_client::Result<bool> {
        let mut w = WireWriter::new();
        write_request_header(&mut w, REMOVE_REQ);
        w.put_str(key);

        let response = self.core.call(w.as_slice(), REMOVE_RESP)?;
        let mut r = WireReader::new(&response);
        let _header = ResponseHeader::read(&mut r)?;
        Ok(r.get_bool()?)
    }

    pub fn exists(&self, key: &str) -> idlrpc_client::Result<bool> {
        let mut w = WireWriter::new();
        write_request_header(&mut w, EXISTS_REQ);
        w.put_str(key);

        let response = self.core.call(w.as_slice(), EXISTS_RESP)?;
        let mut r = WireReader::new(&response);
        let _header = ResponseHeader::read(&mut r)?;
        Ok(r.get_bool()?)
    }

    pub fn count(&self) -> idlrpc_client::Result<i64> {
        let mut w = WireWriter::new();
        write_request_header(&mut w, COUNT_REQ);

        let response = self.core.call(w.as_slice(), COUNT_RESP)?;
        let mut r = WireReader::new(&response);
        let _header = ResponseHeader::read(&mut r)?;
        Ok(r.get_i64()?)
    }

    /// One-way: sends the request and returns without waiting.
    pub fn clear(&self) -> idlrpc_client::Result<()> {
        let mut w = WireWriter::new();
        write_request_header(&mut w, CLEAR_REQ);
        self.core.send_oneway(w.as_slice())
    }

    pub fn batch_set(&self, items: &[KeyValue]) -> idlrpc_client::Result<i64> {
        let mut w = WireWriter::new();
        write_request_header(&mut w, BATCH_SET_REQ);
        w.put_u32(items.len() as u32);
        for item in items {
            item.encode(&mut w);
        }

        let response = self.core.call(w.as_slice(), BATCH_SET_RESP)?;
        let mut r = WireReader::new(&response);
        let _header = ResponseHeader::read(&mut r)?;
        Ok(r.get_i64()?)
    }

    /// Returns the values and per-key statuses (out parameters, in
    /// declaration order).
    pub fn batch_get(
        &self,
        keys: &[String],
    ) -> idlrpc_client::Result<(Vec<String>, Vec<OperationStatus>)> {
        let mut w = WireWriter::new();
        write_request_header(&mut w, BATCH_GET_REQ);
        w.put_u32(keys.len() as u32);
        for key in keys {
            w.put_str(key);
        }

        let response = self.core.call(w.as_slice(), BATCH_GET_RESP)?;
        let mut r = WireReader::new(&response);
        let _header = ResponseHeader::read(&mut r)?;
        let values = Vec::<String>::decode(&mut r)?;
        let status = Vec::<OperationStatus>::decode(&mut r)?;
        Ok((values, status))
    }

    /// Whether the listener is still serving the connection.
    pub fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    /// Stop the listener thread explicitly.
    pub fn stop_listening(&mut self) {
        self.core.stop_listening();
    }
}

/// Server-side abstract handlers, one per RPC method. Handlers run on
/// connection worker threads and synchronize their own state.
pub trait KeyValueStoreHandler: Send + Sync {
    fn set(&self, key: String, value: String) -> bool;
    fn get(&self, key: String) -> String;
    fn remove(&self, key: String) -> bool;
    fn exists(&self, key: String) -> bool;
    fn count(&self) -> i64;
    fn clear(&self);
    fn batch_set(&self, items: Vec<KeyValue>) -> i64;
    fn batch_get(&self, keys: Vec<String>) -> (Vec<String>, Vec<OperationStatus>);
}

/// Request router generated from the service's method table.
pub struct KeyValueStoreDispatch<H> {
    handler: H,
}

impl<H> KeyValueStoreDispatch<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

fn reply(id: u32, build: impl FnOnce(&mut WireWriter)) -> Dispatched {
    let mut w = WireWriter::new();
    write_response_header(&mut w, id, STATUS_OK);
    build(&mut w);
    Dispatched::Reply(w.freeze())
}

impl<H: KeyValueStoreHandler> ServiceDispatch for KeyValueStoreDispatch<H> {
    fn dispatch(&self, message: &[u8]) -> idlrpc_codec::Result<Dispatched> {
        let mut r = WireReader::new(message);
        let id = r.get_u32()?;

        Ok(match id {
            SET_REQ => {
                let key = r.get_str()?;
                let value = r.get_str()?;
                let ret = self.handler.set(key, value);
                reply(SET_RESP, |w| w.put_bool(ret))
            }
            GET_REQ => {
                let key = r.get_str()?;
                let ret = self.handler.get(key);
                reply(GET_RESP, |w| w.put_str(&ret))
            }
            REMOVE_REQ => {
                let key = r.get_str()?;
                let ret = self.handler.remove(key);
                reply(REMOVE_RESP, |w| w.put_bool(ret))
            }
            EXISTS_REQ => {
                let key = r.get_str()?;
                let ret = self.handler.exists(key);
                reply(EXISTS_RESP, |w| w.put_bool(ret))
            }
            COUNT_REQ => {
                let ret = self.handler.count();
                reply(COUNT_RESP, |w| w.put_i64(ret))
            }
            CLEAR_REQ => {
                self.handler.clear();
                Dispatched::OneWay
            }
            BATCH_SET_REQ => {
                let items = Vec::<KeyValue>::decode(&mut r)?;
                let ret = self.handler.batch_set(items);
                reply(BATCH_SET_RESP, |w| w.put_i64(ret))
            }
            BATCH_GET_REQ => {
                let keys = Vec::<String>::decode(&mut r)?;
                let (values, status) = self.handler.batch_get(keys);
                reply(BATCH_GET_RESP, |w| {
                    values.encode(w);
                    status.encode(w);
                })
            }
            _ => Dispatched::Unknown,
        })
    }
}

/// KeyValueStore server (stream binding): dispatch plus the typed push
/// methods for the service's three channels.
pub struct KeyValueStoreServer<H> {
    inner: StreamServer<KeyValueStoreDispatch<H>>,
}

impl<H: KeyValueStoreHandler + 'static> KeyValueStoreServer<H> {
    pub fn bind(
        addr: SocketAddr,
        handler: H,
        config: ServerConfig,
    ) -> idlrpc_server::Result<Self> {
        let inner = StreamServer::bind(addr, KeyValueStoreDispatch::new(handler), config)?;
        Ok(Self { inner })
    }

    /// Install a hook invoked when a client connects.
    pub fn on_client_connected(mut self, hook: impl Fn(ClientId) + Send + Sync + 'static) -> Self {
        self.inner = self.inner.on_client_connected(hook);
        self
    }

    /// Install a hook invoked when a client disconnects.
    pub fn on_client_disconnected(
        mut self,
        hook: impl Fn(ClientId) + Send + Sync + 'static,
    ) -> Self {
        self.inner = self.inner.on_client_disconnected(hook);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }

    /// Accept and serve connections until [`stop`](Self::stop).
    pub fn run(&self) {
        self.inner.run()
    }

    pub fn stop(&self) {
        self.inner.stop()
    }

    pub fn client_count(&self) -> usize {
        self.inner.client_count()
    }

    /// Push a key-change notification to every connected client, optionally
    /// excluding one. Returns the number of clients written to.
    pub fn push_on_key_changed(&self, event: &ChangeEvent, exclude: Option<ClientId>) -> usize {
        let mut w = WireWriter::new();
        write_request_header(&mut w, ON_KEY_CHANGED);
        event.encode(&mut w);
        self.inner.broadcast(w.as_slice(), exclude)
    }

    /// Push a batch-change notification.
    pub fn push_on_batch_changed(
        &self,
        events: &[ChangeEvent],
        exclude: Option<ClientId>,
    ) -> usize {
        let mut w = WireWriter::new();
        write_request_header(&mut w, ON_BATCH_CHANGED);
        w.put_u32(events.len() as u32);
        for event in events {
            event.encode(&mut w);
        }
        self.inner.broadcast(w.as_slice(), exclude)
    }

    /// Push a connection-status notification.
    pub fn push_on_connection_status(&self, connected: bool, exclude: Option<ClientId>) -> usize {
        let mut w = WireWriter::new();
        write_request_header(&mut w, ON_CONNECTION_STATUS);
        w.put_bool(connected);
        self.inner.broadcast(w.as_slice(), exclude)
    }
}

#[cfg(test)]
mod tests {
    use idlrpc_frame::message::{IdAllocator, SERVICE_BASE_ID};

    use super::*;

    #[test]
    fn ids_follow_declaration_order() {
        let mut ids = IdAllocator::new(SERVICE_BASE_ID);
        assert_eq!(ids.rpc(), (SET_REQ, SET_RESP));
        assert_eq!(ids.rpc(), (GET_REQ, GET_RESP));
        assert_eq!(ids.rpc(), (REMOVE_REQ, REMOVE_RESP));
        assert_eq!(ids.rpc(), (EXISTS_REQ, EXISTS_RESP));
        assert_eq!(ids.rpc(), (COUNT_REQ, COUNT_RESP));
        assert_eq!(ids.oneway(), CLEAR_REQ);
        assert_eq!(ids.rpc(), (BATCH_SET_REQ, BATCH_SET_RESP));
        assert_eq!(ids.rpc(), (BATCH_GET_REQ, BATCH_GET_RESP));
        assert_eq!(ids.push(), ON_KEY_CHANGED);
        assert_eq!(ids.push(), ON_BATCH_CHANGED);
        assert_eq!(ids.push(), ON_CONNECTION_STATUS);
    }

    #[test]
    fn change_event_round_trip() {
        let event = ChangeEvent {
            event_type: ChangeEventType::KeyUpdated,
            key: "name".to_string(),
            old_value: "Bob".to_string(),
            new_value: "Alice".to_string(),
            timestamp: 1_700_000_000_123,
        };

        let mut w = WireWriter::new();
        event.encode(&mut w);
        let bytes = w.freeze();

        let mut r = WireReader::new(&bytes);
        assert_eq!(ChangeEvent::decode(&mut r).unwrap(), event);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn change_event_wire_layout() {
        let event = ChangeEvent {
            event_type: ChangeEventType::KeyAdded,
            key: "k".to_string(),
            old_value: String::new(),
            new_value: "v".to_string(),
            timestamp: 1,
        };

        let mut w = WireWriter::new();
        event.encode(&mut w);

        // ordinal 0, "k", "", "v", i64 1 — fields in declaration order.
        assert_eq!(
            w.as_slice(),
            &[
                0x00, 0x00, 0x00, 0x00, // KeyAdded
                0x00, 0x00, 0x00, 0x01, b'k', // key
                0x00, 0x00, 0x00, 0x00, // old_value (empty)
                0x00, 0x00, 0x00, 0x01, b'v', // new_value
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // timestamp
            ]
        );
    }

    #[test]
    fn operation_status_rejects_out_of_range_ordinal() {
        let mut w = WireWriter::new();
        w.put_i32(4);
        let bytes = w.freeze();
        let mut r = WireReader::new(&bytes);
        assert!(OperationStatus::decode(&mut r).is_err());
    }

    #[test]
    fn key_value_sequence_round_trip() {
        let items = vec![
            KeyValue {
                key: "a".to_string(),
                value: "1".to_string(),
            },
            KeyValue {
                key: "b".to_string(),
                value: "2".to_string(),
            },
        ];

        let mut w = WireWriter::new();
        items.encode(&mut w);
        let bytes = w.freeze();

        let mut r = WireReader::new(&bytes);
        assert_eq!(Vec::<KeyValue>::decode(&mut r).unwrap(), items);
    }

    struct FixedHandler;

    impl KeyValueStoreHandler for FixedHandler {
        fn set(&self, key: String, _value: String) -> bool {
            !key.is_empty()
        }
        fn get(&self, key: String) -> String {
            format!("value-of-{key}")
        }
        fn remove(&self, _key: String) -> bool {
            false
        }
        fn exists(&self, _key: String) -> bool {
            true
        }
        fn count(&self) -> i64 {
            3
        }
        fn clear(&self) {}
        fn batch_set(&self, items: Vec<KeyValue>) -> i64 {
            items.len() as i64
        }
        fn batch_get(&self, keys: Vec<String>) -> (Vec<String>, Vec<OperationStatus>) {
            let status = keys.iter().map(|_| OperationStatus::Success).collect();
            (keys, status)
        }
    }

    #[test]
    fn dispatcher_routes_by_request_id() {
        let dispatch = KeyValueStoreDispatch::new(FixedHandler);

        let mut w = WireWriter::new();
        write_request_header(&mut w, GET_REQ);
        w.put_str("name");

        let outcome = dispatch.dispatch(w.as_slice()).unwrap();
        let response = match outcome {
            Dispatched::Reply(bytes) => bytes,
            other => panic!("expected reply, got {other:?}"),
        };

        let mut r = WireReader::new(&response);
        let header = ResponseHeader::read(&mut r).unwrap();
        assert_eq!(header.id, GET_RESP);
        assert_eq!(header.status, STATUS_OK);
        assert_eq!(r.get_str().unwrap(), "value-of-name");
    }

    #[test]
    fn dispatcher_marks_clear_one_way() {
        let dispatch = KeyValueStoreDispatch::new(FixedHandler);

        let mut w = WireWriter::new();
        write_request_header(&mut w, CLEAR_REQ);

        assert!(matches!(
            dispatch.dispatch(w.as_slice()).unwrap(),
            Dispatched::OneWay
        ));
    }

    #[test]
    fn dispatcher_flags_unknown_ids() {
        let dispatch = KeyValueStoreDispatch::new(FixedHandler);

        let mut w = WireWriter::new();
        write_request_header(&mut w, 9999);

        assert!(matches!(
            dispatch.dispatch(w.as_slice()).unwrap(),
            Dispatched::Unknown
        ));
    }

    #[test]
    fn dispatcher_propagates_malformed_payloads() {
        let dispatch = KeyValueStoreDispatch::new(FixedHandler);

        let mut w = WireWriter::new();
        write_request_header(&mut w, SET_REQ);
        w.put_u8(0xFF); // not a length-prefixed string

        assert!(dispatch.dispatch(w.as_slice()).is_err());
    }
}
