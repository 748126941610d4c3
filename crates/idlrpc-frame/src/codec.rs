use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: 4-byte big-endian message length.
pub const LEN_HEADER: usize = 4;

/// Default maximum frame size. Matches the 65536-byte receive buffers of the
/// engines; larger frames are rejected as malformed.
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024;

/// Encode a message into the wire format: length prefix, then the bytes.
pub fn encode_frame(message: &[u8], dst: &mut BytesMut) -> Result<()> {
    if message.len() > u32::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size: message.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(LEN_HEADER + message.len());
    dst.put_u32(message.len() as u32);
    dst.put_slice(message);
    Ok(())
}

/// Decode one frame from a stream buffer.
///
/// Returns `Ok(None)` if the buffer doesn't hold a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_frame: usize) -> Result<Option<Bytes>> {
    if src.len() < LEN_HEADER {
        return Ok(None);
    }

    let message_len = u32::from_be_bytes(src[0..4].try_into().unwrap()) as usize;
    if message_len > max_frame {
        return Err(FrameError::FrameTooLarge {
            size: message_len,
            max: max_frame,
        });
    }

    let total = LEN_HEADER + message_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(LEN_HEADER);
    Ok(Some(src.split_to(message_len).freeze()))
}

/// Decode the single frame a datagram must contain.
///
/// The length prefix duplicates the datagram length and is validated against
/// it; any disagreement is a malformed message.
pub fn decode_datagram(datagram: &[u8], max_frame: usize) -> Result<Bytes> {
    if datagram.len() < LEN_HEADER {
        return Err(FrameError::LengthMismatch {
            declared: 0,
            actual: datagram.len(),
        });
    }

    let declared = u32::from_be_bytes(datagram[0..4].try_into().unwrap()) as usize;
    let actual = datagram.len() - LEN_HEADER;
    if declared != actual {
        return Err(FrameError::LengthMismatch { declared, actual });
    }
    if declared > max_frame {
        return Err(FrameError::FrameTooLarge {
            size: declared,
            max: max_frame,
        });
    }

    Ok(Bytes::copy_from_slice(&datagram[LEN_HEADER..]))
}

/// Configuration shared by frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum message size in bytes. Default: 65536.
    pub max_frame_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
