//! The shared backing byte region.

use std::cell::Cell;
use std::rc::Rc;

/// A contiguous byte area of fixed capacity.
///
/// Regions are always handled through `Rc<Region>`; every view holds a
/// counted reference, so the region lives until the last view drops.
/// The bytes use interior mutability (`Cell<u8>`), which is what lets
/// several views — read-only and writable alike — coexist over the
/// same region. The codec runs single-threaded, so the region is
/// deliberately not `Sync`.
pub struct Region {
    bytes: Box<[Cell<u8>]>,
}

impl Region {
    /// Allocate a zero-filled region of the given capacity.
    pub fn with_capacity(capacity: usize) -> Rc<Region> {
        Rc::new(Region {
            bytes: vec![Cell::new(0); capacity].into_boxed_slice(),
        })
    }

    /// Build a region adopting the contents of an existing vector.
    pub fn from_vec(data: Vec<u8>) -> Rc<Region> {
        Rc::new(Region {
            bytes: data.into_iter().map(Cell::new).collect(),
        })
    }

    /// Capacity fixed at creation time.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn cells(&self) -> &[Cell<u8>] {
        &self.bytes
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("capacity", &self.bytes.len())
            .finish()
    }
}
