//! Big-endian wire codec for idlrpc services.
//!
//! Every IDL type has exactly one canonical representation with no framing
//! of its own:
//! - Integers of all widths and float bit patterns are big-endian
//! - Booleans are one byte (encoder emits 0x01 for true)
//! - Strings are a u32 byte length followed by UTF-8 bytes
//! - Sequences are a u32 element count followed by the element encodings
//! - Records are their field encodings concatenated in declaration order
//!
//! Generated service modules build on [`Encode`] and [`Decode`]; the layers
//! above read and write fields in order with no offset bookkeeping.

pub mod error;
pub mod reader;
pub mod wire;
pub mod writer;

pub use error::{CodecError, Result};
pub use reader::WireReader;
pub use wire::{Decode, Encode};
pub use writer::WireWriter;
