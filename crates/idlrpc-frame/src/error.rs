/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A datagram's length prefix disagrees with the datagram size.
    #[error("frame length mismatch (prefix says {declared} bytes, datagram carries {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// The message inside the frame could not be decoded.
    #[error("malformed message: {0}")]
    Codec(#[from] idlrpc_codec::CodecError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
