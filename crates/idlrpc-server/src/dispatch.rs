use bytes::Bytes;
use idlrpc_codec::Result;

/// Outcome of routing one request message.
#[derive(Debug)]
pub enum Dispatched {
    /// Serialized response message to frame and send back to the caller.
    Reply(Bytes),
    /// The request was one-way; no response message exists.
    OneWay,
    /// The request id names no method of this service. The engine logs the
    /// id and continues (the frame is already drained by the framing layer).
    Unknown,
}

/// Per-service request router, generated from the IDL.
///
/// `message` is a complete request message including the id header. The
/// implementation switches on the id, decodes the typed parameters, invokes
/// the abstract handler, and serializes the response. Response ids are never
/// dispatched.
///
/// Handlers run on the connection worker thread (stream binding) or the
/// receive loop (datagram binding); implementations synchronize their own
/// state.
pub trait ServiceDispatch: Send + Sync {
    fn dispatch(&self, message: &[u8]) -> Result<Dispatched>;
}
