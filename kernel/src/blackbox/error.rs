//! Blackbox error types

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BboxError {
    /// The retained log region was never acquired; the subsystem is disabled
    NotInitialized,
    /// A required argument was absent
    InvalidArgument,
    /// The retained log region holds no valid fault record
    NoRecord,
    /// The module does not provide this operation
    Unsupported,
    /// Another fault context currently owns the region
    Busy,
    /// No contiguous block could be allocated for the region
    NoMemory,
    /// The subsystem was already installed
    AlreadyInitialized,
    /// Writing a fault log file failed
    Io,
    /// The upload transport rejected a log file
    Upload,
    /// The module registry refused the registration or notification
    Registry,
}

impl fmt::Display for BboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BboxError::NotInitialized => write!(f, "log region not initialized"),
            BboxError::InvalidArgument => write!(f, "invalid argument"),
            BboxError::NoRecord => write!(f, "no fault record"),
            BboxError::Unsupported => write!(f, "operation not supported"),
            BboxError::Busy => write!(f, "log region busy"),
            BboxError::NoMemory => write!(f, "out of contiguous memory"),
            BboxError::AlreadyInitialized => write!(f, "already initialized"),
            BboxError::Io => write!(f, "fault log I/O error"),
            BboxError::Upload => write!(f, "upload failed"),
            BboxError::Registry => write!(f, "module registry error"),
        }
    }
}
