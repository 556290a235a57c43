use agentwire_buffer::BufferError;

use crate::tlv::TlvType;

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A buffer view operation failed (bounds, missing NUL, ...).
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// An encoder could not fit its output in the supplied view.
    #[error("buffer too small ({required} bytes required, {available} available)")]
    BufferTooSmall { required: usize, available: usize },

    /// Decoded framing violates the protocol.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// A TLV of one type was decoded where another was expected.
    #[error("TLV type mismatch (expected {expected}, wire has {found})")]
    TypeMismatch { expected: TlvType, found: u16 },

    /// An encoding request carried an out-of-range value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
