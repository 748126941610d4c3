/// Errors that can occur while decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A read would run past the end of the buffer.
    #[error("buffer underflow (needed {needed} bytes, {remaining} remaining)")]
    Underflow { needed: usize, remaining: usize },

    /// An enum ordinal outside the declared variant range.
    #[error("enum ordinal {ordinal} out of range (variant count {variants})")]
    BadEnumOrdinal { ordinal: i32, variants: u32 },

    /// A string field carried invalid UTF-8.
    #[error("invalid utf-8 in string field: {0}")]
    BadUtf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
