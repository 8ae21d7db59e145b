//! Data cache maintenance by virtual address.

use aarch64_cpu::asm::barrier;

use super::constants::DCACHE_LINE_SIZE;

/// Clean and invalidate `[start, end)` to the point of coherency.
///
/// Uses `dc civac` per line so dirty lines are written back before the
/// reset, then `dsb sy` so every maintenance operation has completed before
/// we return.
pub fn dcache_flush_range(start: usize, end: usize) {
    let first = start & !(DCACHE_LINE_SIZE - 1);
    let last = (end + DCACHE_LINE_SIZE - 1) & !(DCACHE_LINE_SIZE - 1);
    for addr in (first..last).step_by(DCACHE_LINE_SIZE) {
        // SAFETY: DC CIVAC is permitted at EL1, only writes back and
        // invalidates lines, and callers pass mapped ranges they own.
        unsafe {
            core::arch::asm!("dc civac, {}", in(reg) addr, options(nostack, preserves_flags));
        }
    }
    barrier::dsb(barrier::SY);
}
