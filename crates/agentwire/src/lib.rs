//! Controller/agent TLV protocol suite.
//!
//! agentwire speaks a length-prefixed, TLV-framed request/response
//! protocol between a controller and a network-element agent over
//! blocking TCP.
//!
//! # Crate Structure
//!
//! - [`buffer`] — shared byte regions, buffer views, the sized pool
//! - [`codec`] — common-header and TLV message codec
//! - [`net`] — blocking TCP endpoint and message framer

/// Re-export buffer types.
pub mod buffer {
    pub use agentwire_buffer::*;
}

/// Re-export codec types.
pub mod codec {
    pub use agentwire_codec::*;
}

/// Re-export transport types.
pub mod net {
    pub use agentwire_net::*;
}
