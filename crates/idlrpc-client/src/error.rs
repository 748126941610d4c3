/// Errors surfaced by client calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] idlrpc_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] idlrpc_frame::FrameError),

    /// The response payload could not be decoded.
    #[error("malformed response: {0}")]
    Codec(#[from] idlrpc_codec::CodecError),

    /// No matching response arrived within the call timeout.
    #[error("call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The client is not connected, or the listener exited before the
    /// response arrived.
    #[error("client disconnected: {0}")]
    Disconnected(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
