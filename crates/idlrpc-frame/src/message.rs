//! Message-layer scaffolding consumed by generated service modules.
//!
//! Every message starts with a u32 message id. RPC responses carry an i32
//! status immediately after the id; the runtime writes [`STATUS_OK`] and
//! treats the field as opaque on receipt. Ids are assigned sequentially from
//! a per-service base in declaration order, so they are stable across
//! processes for a given IDL input.

use idlrpc_codec::{Result, WireReader, WireWriter};

/// Default per-service message-id base.
pub const SERVICE_BASE_ID: u32 = 1000;

/// Status value the runtime encodes on every successful response.
pub const STATUS_OK: i32 = 0;

/// Sequential message-id assignment in declaration order.
///
/// An RPC method consumes two consecutive ids (request, then response); a
/// one-way method or push channel consumes one (request-form only).
#[derive(Debug)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new(base: u32) -> Self {
        Self { next: base }
    }

    /// Allocate `(request id, response id)` for an RPC method.
    pub fn rpc(&mut self) -> (u32, u32) {
        let request = self.next;
        self.next += 2;
        (request, request + 1)
    }

    /// Allocate the single request id of a one-way method.
    pub fn oneway(&mut self) -> u32 {
        let request = self.next;
        self.next += 1;
        request
    }

    /// Allocate the single request id of a push channel.
    pub fn push(&mut self) -> u32 {
        self.oneway()
    }
}

/// Peek the message id at the front of a message.
pub fn message_id(message: &[u8]) -> Result<u32> {
    WireReader::new(message).get_u32()
}

/// Write the request header: the message id.
pub fn write_request_header(writer: &mut WireWriter, id: u32) {
    writer.put_u32(id);
}

/// Write the response header: the message id, then the status field.
pub fn write_response_header(writer: &mut WireWriter, id: u32, status: i32) {
    writer.put_u32(id);
    writer.put_i32(status);
}

/// Parsed response header. The status is carried opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub id: u32,
    pub status: i32,
}

impl ResponseHeader {
    pub fn read(reader: &mut WireReader<'_>) -> Result<Self> {
        let id = reader.get_u32()?;
        let status = reader.get_i32()?;
        Ok(Self { id, status })
    }
}
