//! Architecture abstraction layer for the blackbox.
//!
//! The only architecture-specific service the blackbox needs is data cache
//! maintenance: a record sealed during a panic has to reach memory before
//! the reset, not sit in a dirty cache line that the reset discards.

pub mod traits;
pub use traits::*;

#[cfg(target_arch = "aarch64")]
pub mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use aarch64 as current;

#[cfg(target_arch = "x86_64")]
pub mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use x86_64 as current;

#[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
pub mod generic;
#[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
pub use generic as current;

/// Cache maintenance for the architecture the kernel was built for.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchCache;

impl CacheMaintenance for ArchCache {
    #[inline]
    fn flush_range(&self, start: usize, end: usize) {
        if end > start {
            current::cache::dcache_flush_range(start, end);
        }
    }
}

/// Kernel-wide instance, suitable for `Platform::cache`.
pub static ARCH_CACHE: ArchCache = ArchCache;
