//! Message codec for the agentwire controller/agent protocol.
//!
//! A frame is an 8-byte preamble, 16 further header bytes, then a
//! sequence of TLVs; the preamble's length field covers the whole
//! frame. All multi-byte fields are big-endian. This crate provides
//! the common-header encoder/decoder, the closed TLV registry with
//! its value objects, and the message encoder/decoder state machines
//! that preserve framing invariants while composing or walking TLVs.

pub mod error;
pub mod header;
pub mod message;
pub mod tlv;

pub use error::{CodecError, Result};
pub use header::{
    CommonHeaderDecoder, CommonHeaderEncoder, EntityClass, MessageClass, HEADER_LEN, PREAMBLE_LEN,
    PROTOCOL_VERSION,
};
pub use message::{MessageDecoder, MessageEncoder, TLV_HEADER_LEN};
pub use tlv::{TlvType, TlvValue};
