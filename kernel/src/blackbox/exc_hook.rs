//! Bridge between the exception reporter and the retained log region.
//!
//! During a panic the exception reporter writes its diagnostic text straight
//! into the payload area of the region instead of going through the console
//! or the filesystem, either of which may be what just broke. The bridge only
//! tells the reporter where that area is; it does no work of its own.

use core::ptr::NonNull;

use super::region::RetainedLogRegion;

/// Write callback the reporter invokes for ordinary, non-panic output:
/// `(start_addr, space, rw_flag, buf)`.
pub type ExcWriteFn = fn(start_addr: u32, space: u32, rw_flag: u32, buf: *mut u8);

/// Destination handed to the exception reporter.
#[derive(Debug, Clone, Copy)]
pub struct ExcHook {
    /// Offset into `buf` at which the reporter starts writing.
    pub offset: u32,
    /// Bytes available at `buf + offset`.
    pub max_len: u32,
    /// First byte of the destination, just past the record header.
    pub buf: NonNull<u8>,
    pub write: ExcWriteFn,
}

// SAFETY: `buf` points into the retained log region, which lives for the
// rest of the kernel and is written only by the reporter during a panic.
unsafe impl Send for ExcHook {}
unsafe impl Sync for ExcHook {}

/// Exception/trace reporter contract.
pub trait ExcInfoReporter: Sync {
    /// Install the panic-time destination. Called once at init.
    fn register_hook(&self, hook: ExcHook);

    /// Forget the destination; the reporter must not write to it afterwards.
    fn unregister_hook(&self);

    /// Bytes of diagnostic text captured so far. May exceed the hook's
    /// `max_len` when the reporter produced more than fits.
    fn captured_len(&self) -> u32;
}

/// Ordinary-path writes are intentionally dropped: only panic-time output
/// lands in the region, and it is written there directly by the reporter.
fn write_exc_file(_start_addr: u32, _space: u32, _rw_flag: u32, _buf: *mut u8) {}

/// Describe the payload area of `region` as a reporter destination.
pub fn exc_hook_for(region: &RetainedLogRegion) -> ExcHook {
    ExcHook {
        offset: 0,
        max_len: u32::try_from(region.payload_capacity()).unwrap_or(u32::MAX),
        buf: region.payload_ptr(),
        write: write_exc_file,
    }
}

/// Point `reporter` at the payload area of `region`.
pub fn register_exc_info_hook(region: &RetainedLogRegion, reporter: &dyn ExcInfoReporter) {
    let hook = exc_hook_for(region);
    log::debug!(
        "blackbox: exception hook at {:p}, {} bytes",
        hook.buf,
        hook.max_len
    );
    reporter.register_hook(hook);
}
