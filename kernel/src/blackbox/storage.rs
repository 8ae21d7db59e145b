//! Fault log persistence.
//!
//! Every persisted fault log starts with a short text block describing the
//! event, followed by the raw diagnostic payload. The file is truncated by
//! the first write and appended to by the second.

use core::fmt::Write;

use super::error::BboxError;
use super::info::ErrorInfo;
use crate::logger::FixedBuffer;

/// Room for the formatted error info block: three labels plus the largest
/// possible field values.
const BASIC_INFO_SIZE: usize = 768;

/// Filesystem write service.
pub trait LogStore: Sync {
    /// Write `data` to `path`, creating the file if needed. With `append`
    /// false the file is truncated first.
    fn full_write_file(&self, path: &str, data: &[u8], append: bool) -> Result<(), BboxError>;
}

/// Format the text block that opens every fault log.
pub fn format_basic_error_info<const N: usize>(out: &mut FixedBuffer<N>, info: &ErrorInfo) {
    // FixedBuffer truncates instead of failing
    let _ = write!(
        out,
        "#### error info ####\nevent: {}\nmodule: {}\nerrorDesc: {}\n",
        info.event(),
        info.module(),
        info.error_desc()
    );
}

/// Truncate `path` and write the error info block to it.
pub fn save_basic_error_info(
    store: &dyn LogStore,
    path: &str,
    info: &ErrorInfo,
) -> Result<(), BboxError> {
    let mut text = FixedBuffer::<BASIC_INFO_SIZE>::new();
    format_basic_error_info(&mut text, info);
    store.full_write_file(path, text.as_bytes(), false)
}

/// Write a complete fault log: the error info block, then `payload`.
pub fn save_fault_log(
    store: &dyn LogStore,
    path: &str,
    payload: &[u8],
    info: &ErrorInfo,
) -> Result<(), BboxError> {
    save_basic_error_info(store, path, info)?;
    store.full_write_file(path, payload, true)
}
