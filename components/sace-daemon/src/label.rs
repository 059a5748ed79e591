//! Allocates the opaque, non-reusable labels handed out for live children
//! and running events. The original broker used the `ServiceInfo`
//! pointer's address as the label; a monotonic counter gives the same
//! "never reused, never zero" guarantee without exposing memory layout.

use std::sync::atomic::{AtomicU64, Ordering};

use sace_protocol::Label;

pub struct LabelAllocator {
    next: AtomicU64,
}

impl LabelAllocator {
    pub fn new() -> Self {
        LabelAllocator { next: AtomicU64::new(1) }
    }

    pub fn allocate(&self) -> Label {
        Label(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for LabelAllocator {
    fn default() -> Self {
        Self::new()
    }
}
