//! Generation-stamped visited set for graph traversal.
//!
//! Each traversal bumps a generation counter instead of zeroing the array, so
//! repeated searches over the same graph cost O(1) to reset. One set lives per
//! thread (see [`with_visited`]), which lets build workers and concurrent
//! queries traverse without sharing scratch space.

use std::cell::RefCell;

thread_local! {
    static VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

/// Run `f` with this thread's visited set, sized for `capacity` nodes.
pub fn with_visited<R>(capacity: usize, f: impl FnOnce(&mut VisitedSet) -> R) -> R {
    VISITED.with(|cell| {
        let mut visited = cell.borrow_mut();
        visited.ensure_capacity(capacity);
        f(&mut visited)
    })
}

/// Visited marks indexed by node id.
/// Uses a u16 generation, so a full memset happens once every 65534 clears.
#[derive(Debug)]
pub struct VisitedSet {
    marks: Vec<u16>,
    generation: u16,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            marks: vec![0u16; capacity],
            generation: 1,
        }
    }

    /// Forget every mark.
    pub fn clear(&mut self) {
        if self.generation == u16::MAX {
            self.marks.fill(0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
    }

    /// Grow to cover at least `capacity` ids. Existing marks are kept.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        if capacity > self.marks.len() {
            self.marks.resize(capacity, 0);
        }
    }

    /// Mark `id`. Returns `true` if it was not already marked.
    #[inline]
    pub fn insert(&mut self, id: u32) -> bool {
        let slot = &mut self.marks[id as usize];
        if *slot == self.generation {
            false
        } else {
            *slot = self.generation;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_clear() {
        let mut vs = VisitedSet::new(100);
        assert!(vs.insert(0));
        assert!(!vs.insert(0));
        assert!(vs.insert(50));
        assert_eq!(vs.marks[0], vs.generation);

        vs.clear();
        assert_ne!(vs.marks[0], vs.generation);
        assert!(vs.insert(0));
        assert!(vs.insert(50));
    }

    #[test]
    fn test_generation_wraps_with_memset() {
        let mut vs = VisitedSet::new(10);
        for _ in 0..65534 {
            vs.clear();
        }
        assert_eq!(vs.generation, u16::MAX);
        vs.insert(5);

        vs.clear();
        assert_eq!(vs.generation, 1);
        assert!(vs.insert(5));
    }

    #[test]
    fn test_thread_local_pool_grows() {
        let grown = with_visited(16, |vs| {
            vs.clear();
            vs.insert(15)
        });
        assert!(grown);
        let len = with_visited(4, |vs| vs.marks.len());
        assert!(len >= 16);
    }
}
