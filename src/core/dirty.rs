//! Per-stream redraw tracking.
//!
//! An index enters the set on a confirmed frame-ready notification or a
//! forced full redraw (expose/resize). It leaves only through `clear()`,
//! which the loop calls with the indices a pass just composited.

use std::collections::BTreeSet;

/// When a non-empty dirty set is allowed to composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Composite whatever is dirty, as soon as it is dirty
    #[default]
    Eager,
    /// Hold the pass until every stream has a new frame
    Lockstep,
}

#[derive(Debug, Clone)]
pub struct DirtyTracker {
    dirty: BTreeSet<usize>,
    count: usize,
    policy: SyncPolicy,
    /// Set by a full redraw; the pass waits for all indices
    full_redraw: bool,
}

impl DirtyTracker {
    pub fn new(count: usize, policy: SyncPolicy) -> Self {
        Self {
            dirty: BTreeSet::new(),
            count,
            policy,
            full_redraw: false,
        }
    }

    /// Frame-ready for one stream. Out-of-range indices are ignored.
    pub fn mark(&mut self, index: usize) {
        if index < self.count {
            self.dirty.insert(index);
        }
    }

    /// Expose/resize: every stream must be redrawn before the next pass.
    pub fn mark_all(&mut self) {
        self.dirty.extend(0..self.count);
        self.full_redraw = true;
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    fn all_dirty(&self) -> bool {
        self.dirty.len() == self.count
    }

    /// True when a composite pass is due.
    pub fn is_ready(&self) -> bool {
        if self.dirty.is_empty() {
            return false;
        }
        match self.policy {
            SyncPolicy::Lockstep => self.all_dirty(),
            SyncPolicy::Eager => !self.full_redraw || self.all_dirty(),
        }
    }

    /// Dirty indices in ascending order, without clearing.
    pub fn indices(&self) -> Vec<usize> {
        self.dirty.iter().copied().collect()
    }

    /// Remove indices that were composited.
    pub fn clear(&mut self, composited: &[usize]) {
        for i in composited {
            self.dirty.remove(i);
        }
        if self.dirty.is_empty() {
            self.full_redraw = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_ascending_and_clear() {
        let mut d = DirtyTracker::new(4, SyncPolicy::Eager);
        d.mark(3);
        d.mark(0);
        d.mark(2);
        d.mark(3);
        assert_eq!(d.len(), 3);
        let indices = d.indices();
        assert_eq!(indices, vec![0, 2, 3]);
        d.clear(&indices);
        assert!(d.is_empty());
        assert!(!d.is_ready());
    }

    #[test]
    fn test_eager_composites_single_stream() {
        let mut d = DirtyTracker::new(4, SyncPolicy::Eager);
        assert!(!d.is_ready());
        d.mark(1);
        assert!(d.is_ready());
    }

    #[test]
    fn test_full_redraw_marks_everything() {
        let mut d = DirtyTracker::new(3, SyncPolicy::Eager);
        d.mark_all();
        assert!(d.is_ready());
        assert_eq!(d.indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_partial_clear_keeps_full_redraw_barrier() {
        let mut d = DirtyTracker::new(3, SyncPolicy::Eager);
        d.mark_all();
        d.clear(&[0]);
        // Remaining slots still owe a redraw, but the pass waits for all
        assert!(!d.is_ready());
        d.mark(0);
        assert!(d.is_ready());
        d.clear(&[0, 1, 2]);
        d.mark(1);
        assert!(d.is_ready());
    }

    #[test]
    fn test_lockstep_waits_for_all() {
        let mut d = DirtyTracker::new(3, SyncPolicy::Lockstep);
        d.mark(0);
        d.mark(2);
        assert!(!d.is_ready());
        d.mark(1);
        assert!(d.is_ready());
    }

    #[test]
    fn test_out_of_range_ignored() {
        let mut d = DirtyTracker::new(2, SyncPolicy::Eager);
        d.mark(5);
        assert!(d.is_empty());
    }
}
