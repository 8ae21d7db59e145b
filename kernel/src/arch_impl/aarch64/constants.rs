//! AArch64 architecture constants.

/// Smallest data cache line on the cores we run on (CTR_EL0.DminLine).
pub const DCACHE_LINE_SIZE: usize = 64;
