//! Length-prefixed message framing for idlrpc.
//!
//! Every logical message travels as a frame:
//! - A 4-byte big-endian unsigned byte length
//! - Exactly that many message bytes
//!
//! The stream binding concatenates frames on a byte stream; the datagram
//! binding carries one frame per datagram, with the duplicated length prefix
//! validated against the datagram size on receipt.
//!
//! The [`message`] module holds the message-layer scaffolding generated
//! service modules build on: sequential message-id allocation and the
//! request/response header shapes.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{decode_datagram, decode_frame, encode_frame, FrameConfig, DEFAULT_MAX_FRAME, LEN_HEADER};
pub use error::{FrameError, Result};
pub use message::{IdAllocator, ResponseHeader, SERVICE_BASE_ID, STATUS_OK};
pub use reader::FrameReader;
pub use writer::FrameWriter;
