//! A pool of same-sized byte regions.

use std::cell::RefCell;
use std::rc::Rc;

use crate::region::Region;
use crate::view::BufferWritableView;

/// A pool handing out writable views over recycled regions.
///
/// All regions share one element size. `acquire` prefers a free
/// region and grows the pool by one element when none is available.
/// A region is free exactly when the pool holds the only reference to
/// it, so release happens automatically when the last view over the
/// region drops; there is no handle to return and no way to release
/// twice.
///
/// The pool is single-owner and not thread-safe, matching the
/// single-threaded codec model.
pub struct BufferPool {
    element_size: usize,
    regions: RefCell<Vec<Rc<Region>>>,
}

impl BufferPool {
    /// Create a pool of `initial_capacity` regions of `element_size`
    /// bytes each.
    pub fn new(element_size: usize, initial_capacity: usize) -> BufferPool {
        let regions = (0..initial_capacity)
            .map(|_| Region::with_capacity(element_size))
            .collect();
        BufferPool {
            element_size,
            regions: RefCell::new(regions),
        }
    }

    /// Element size every region in this pool was created with.
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Get a writable view over a free region, growing if necessary.
    pub fn acquire(&self) -> BufferWritableView {
        let mut regions = self.regions.borrow_mut();
        if let Some(free) = regions.iter().find(|r| Rc::strong_count(r) == 1) {
            return BufferWritableView::new(Rc::clone(free));
        }
        let region = Region::with_capacity(self.element_size);
        regions.push(Rc::clone(&region));
        BufferWritableView::new(region)
    }

    /// Total number of regions, busy and free.
    pub fn capacity(&self) -> usize {
        self.regions.borrow().len()
    }

    /// Number of regions currently free.
    pub fn free_count(&self) -> usize {
        self.regions
            .borrow()
            .iter()
            .filter(|r| Rc::strong_count(r) == 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_cycles_do_not_grow() {
        let pool = BufferPool::new(64, 1);
        for _ in 0..10 {
            let view = pool.acquire();
            assert_eq!(view.len(), 64);
            assert_eq!(pool.free_count(), 0);
        }
        assert_eq!(pool.capacity(), 1);
        assert_eq!(pool.free_count(), pool.capacity());
    }

    #[test]
    fn grows_by_one_when_exhausted() {
        let pool = BufferPool::new(32, 1);
        let first = pool.acquire();
        let second = pool.acquire();
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.free_count(), 0);
        drop(first);
        assert_eq!(pool.free_count(), 1);
        drop(second);
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.capacity(), 2);
    }

    #[test]
    fn region_stays_busy_while_any_view_lives() {
        let pool = BufferPool::new(16, 1);
        let view = pool.acquire();
        let sub = view.sub(4, 8).unwrap();
        drop(view);
        // A sub-view still references the region.
        assert_eq!(pool.free_count(), 0);
        drop(sub);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn recycled_region_keeps_previous_bytes() {
        let pool = BufferPool::new(8, 1);
        {
            let view = pool.acquire();
            view.set_u8(0, 0x5A).unwrap();
        }
        // Recycling does not re-zero; callers own initialization.
        let view = pool.acquire();
        assert_eq!(view.get_u8(0).unwrap(), 0x5A);
    }

    #[test]
    fn empty_initial_capacity_grows_on_demand() {
        let pool = BufferPool::new(8, 0);
        assert_eq!(pool.capacity(), 0);
        let _view = pool.acquire();
        assert_eq!(pool.capacity(), 1);
    }
}
