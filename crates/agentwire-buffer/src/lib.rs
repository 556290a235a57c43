//! Byte regions, buffer views and the sized buffer pool.
//!
//! This is the foundation layer of agentwire. A [`Region`] is a
//! fixed-capacity byte area with shared ownership; [`BufferView`] and
//! [`BufferWritableView`] are cheap `(region, offset, len)` values over
//! it, with bounds-checked typed accessors in network byte order.
//! [`BufferPool`] recycles same-sized regions across messages.
//!
//! Views of both capabilities may alias the same region; a write
//! through one writable view is observed by every other view. The
//! region is released when the last view referring to it drops.

pub mod addr;
pub mod error;
pub mod pool;
pub mod region;
pub mod view;
pub mod wire;

pub use addr::{AddrParseError, Ipv4Address, Ipv4Cidr, MacAddress};
pub use error::{BufferError, Result};
pub use pool::BufferPool;
pub use region::Region;
pub use view::{BufferView, BufferWritableView};
