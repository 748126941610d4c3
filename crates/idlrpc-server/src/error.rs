/// Errors that can occur while running a server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] idlrpc_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] idlrpc_frame::FrameError),

    /// A request payload could not be decoded.
    #[error("malformed request: {0}")]
    Codec(#[from] idlrpc_codec::CodecError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
