//! Blocking TCP transport for agentwire frames.
//!
//! An [`Endpoint`] owns at most one listening socket and one
//! connection, and frames whole messages over the stream: a read
//! first drains the 8-byte preamble, extracts the declared length,
//! then drains the remainder, retrying transient errors with a fixed
//! backoff. Peer disconnects are a normal termination (an empty view
//! or a zero-byte write count), not an error.

pub mod endpoint;
pub mod error;

pub use endpoint::Endpoint;
pub use error::{NetError, Result};

use agentwire_buffer::{BufferWritableView, Region};

/// Standard size for a whole-message buffer.
///
/// The protocol caps a frame at 65535 bytes; the buffer is slightly
/// smaller than 64 KiB to play nice with memory allocators.
pub const MESSAGE_BUFFER_LEN: usize = 65500;

/// Allocate a fresh heap buffer suitable for one whole message.
pub fn message_buffer() -> BufferWritableView {
    BufferWritableView::new(Region::with_capacity(MESSAGE_BUFFER_LEN))
}
