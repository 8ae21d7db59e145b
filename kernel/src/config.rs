//! Blackbox configuration.
//!
//! Boards that need different paths or a different region size build their
//! own value from `BlackboxConfig::DEFAULT` with the `with_*` methods before
//! calling `blackbox::init`. Values are fixed once the subsystem is up.

/// Root directory for persisted fault logs.
pub const LOG_ROOT_PATH: &str = "/storage/data/log";

/// Fault log for panics recovered on the next boot.
pub const KERNEL_FAULT_LOG_PATH: &str = "/storage/data/log/kernel_fault.log";

/// Fault log for recoverable (non-panic) events.
pub const USER_FAULT_LOG_PATH: &str = "/storage/data/log/user_fault.log";

/// Size of the retained log region (16 KiB).
pub const FAULT_LOG_SIZE: usize = 0x4000;

/// Number of back-to-back contiguous allocations made while looking for a
/// well-aligned region. A heuristic tuned for one allocator, not a bound.
pub const MEM_OVERLAP_COUNT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlackboxConfig {
    /// Bytes reserved for the fault record, header included.
    pub fault_log_size: usize,
    /// Allocation attempts for the overlap heuristic.
    pub overlap_count: usize,
    pub kernel_fault_log_path: &'static str,
    pub user_fault_log_path: &'static str,
}

impl BlackboxConfig {
    pub const DEFAULT: Self = Self {
        fault_log_size: FAULT_LOG_SIZE,
        overlap_count: MEM_OVERLAP_COUNT,
        kernel_fault_log_path: KERNEL_FAULT_LOG_PATH,
        user_fault_log_path: USER_FAULT_LOG_PATH,
    };

    pub const fn with_fault_log_size(mut self, size: usize) -> Self {
        self.fault_log_size = size;
        self
    }

    pub const fn with_overlap_count(mut self, count: usize) -> Self {
        self.overlap_count = count;
        self
    }

    pub const fn with_log_paths(mut self, kernel: &'static str, user: &'static str) -> Self {
        self.kernel_fault_log_path = kernel;
        self.user_fault_log_path = user;
        self
    }
}

impl Default for BlackboxConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
