//! Fallback for targets without explicit cache maintenance support.

pub mod cache {
    use core::sync::atomic::{fence, Ordering};

    /// Orders all prior stores; the target has no cache maintenance
    /// instructions we know how to issue.
    pub fn dcache_flush_range(_start: usize, _end: usize) {
        fence(Ordering::SeqCst);
    }
}
