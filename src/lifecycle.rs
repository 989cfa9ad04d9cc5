//! Outstanding-work accounting for background reads.
//!
//! Two counters are kept, both touched only on the control thread:
//! the per-archive count of reads in flight, which keeps the archive's
//! shared state alive through an `Rc` back-reference, and the host-wide
//! [`Keepalive`] count that [`Host::run`](crate::Host::run) waits on.
//! [`TaskGuard`] raises both on creation and lowers both exactly once when
//! dropped, so teardown happens on every completion path.

use std::cell::Cell;
use std::rc::Rc;

use crate::archive::ArchiveInner;

/// Host-wide count of pending work.
#[derive(Debug, Clone, Default)]
pub struct Keepalive {
    count: Rc<Cell<usize>>,
}

impl Keepalive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.get()
    }

    pub fn is_alive(&self) -> bool {
        self.count.get() > 0
    }

    /// Hold the host alive until the returned reference is dropped.
    pub fn acquire(&self) -> KeepaliveRef {
        self.count.set(self.count.get() + 1);
        KeepaliveRef {
            count: Rc::clone(&self.count),
        }
    }
}

/// One unit of pending work counted by a [`Keepalive`].
#[derive(Debug)]
pub struct KeepaliveRef {
    count: Rc<Cell<usize>>,
}

impl Drop for KeepaliveRef {
    fn drop(&mut self) {
        let count = self.count.get();
        debug_assert!(count > 0, "keepalive released more often than acquired");
        self.count.set(count.saturating_sub(1));
    }
}

/// Bookkeeping for one outstanding background read.
pub(crate) struct TaskGuard {
    archive: Rc<ArchiveInner>,
    _keepalive: KeepaliveRef,
}

impl TaskGuard {
    pub(crate) fn new(archive: &Rc<ArchiveInner>, keepalive: &Keepalive) -> Self {
        archive.retain_task();
        Self {
            archive: Rc::clone(archive),
            _keepalive: keepalive.acquire(),
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.archive.release_task();
    }
}
