//! Client-side sequence allocation. The original broker stamped sequence
//! numbers with the calling thread id (`gettid() << 16 | counter`) so
//! replies could be demultiplexed across threads sharing one fd; this
//! port gives each [`crate::Client`] its own counter instead; callers
//! that want cross-thread demultiplexing should give each thread its own
//! `Client`.

use std::sync::atomic::{AtomicU32, Ordering};

use sace_protocol::Sequence;

pub struct SequenceAllocator {
    next: AtomicU32,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        SequenceAllocator { next: AtomicU32::new(1) }
    }

    pub fn allocate(&self) -> Sequence {
        Sequence(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new()
    }
}
