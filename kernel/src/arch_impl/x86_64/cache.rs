//! Cache line flushing.
//!
//! x86 caches are coherent with DMA, but a warm reset does not write back
//! dirty lines, so a record written just before the reset still needs an
//! explicit flush.

use core::arch::x86_64::{_mm_clflush, _mm_mfence};

use super::constants::CLFLUSH_LINE_SIZE;

/// Write back and invalidate `[start, end)`, then fence.
pub fn dcache_flush_range(start: usize, end: usize) {
    let first = start & !(CLFLUSH_LINE_SIZE - 1);
    let last = (end + CLFLUSH_LINE_SIZE - 1) & !(CLFLUSH_LINE_SIZE - 1);
    for addr in (first..last).step_by(CLFLUSH_LINE_SIZE) {
        // SAFETY: CLFLUSH is unprivileged and part of the x86_64 baseline;
        // callers pass ranges they own.
        unsafe { _mm_clflush(addr as *const u8) };
    }
    // SAFETY: MFENCE has no operands and is part of the x86_64 baseline.
    unsafe { _mm_mfence() };
}
