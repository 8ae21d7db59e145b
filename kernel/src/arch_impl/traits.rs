//! Architecture-agnostic traits for hardware abstraction.
//!
//! These traits define the interface between architecture-specific code and
//! the blackbox. Each architecture provides an implementation.

/// Data cache maintenance.
pub trait CacheMaintenance: Sync {
    /// Clean and invalidate every cache line overlapping `[start, end)` to
    /// the point of coherency, then wait for completion.
    ///
    /// After this returns, the bytes in the range are visible to anything
    /// that reads physical memory directly, including the next boot.
    fn flush_range(&self, start: usize, end: usize);
}
