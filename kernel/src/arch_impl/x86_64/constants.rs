//! x86_64 architecture constants.

/// CLFLUSH line size. CPUID.01H:EBX[15:8] reports 8 * 8 on every part we
/// support.
pub const CLFLUSH_LINE_SIZE: usize = 64;
