//! Fault record subsystem.
//!
//! The pieces, bottom up:
//!
//! - [`record`]: the binary header that marks a valid fault record.
//! - [`region`]: the retained memory block the record lives in.
//! - [`exc_hook`]: points the exception reporter at that block.
//! - [`storage`] and [`upload`]: persisting and shipping fault logs.
//! - [`system_adapter`]: the `SYSTEM` module tying them together.
//!
//! The module registry, exception reporter, page allocator, filesystem and
//! upload transport all belong to other subsystems and are reached through
//! the traits collected in [`Platform`].

pub mod error;
pub mod exc_hook;
pub mod info;
pub mod record;
pub mod region;
#[cfg(any(test, feature = "blackbox_test"))]
pub mod selftest;
pub mod storage;
pub mod system_adapter;
pub mod upload;

pub use error::BboxError;
pub use exc_hook::{ExcHook, ExcInfoReporter};
pub use info::ErrorInfo;
pub use region::RetainedLogRegion;
pub use storage::LogStore;
pub use system_adapter::{init, init_with_config, SystemAdapter, SystemModule, SYSTEM_MODULE};
pub use upload::EventUploader;

use crate::arch_impl::CacheMaintenance;
use crate::memory::ContiguousPageAllocator;

/// Services the blackbox borrows from the rest of the kernel.
#[derive(Clone, Copy)]
pub struct Platform<'p> {
    pub pages: &'p dyn ContiguousPageAllocator,
    pub exc: &'p dyn ExcInfoReporter,
    pub store: &'p dyn LogStore,
    pub uploader: &'p dyn EventUploader,
    pub cache: &'p dyn CacheMaintenance,
}

/// A fault-handling module as seen by the module registry.
///
/// Every operation is optional; the defaults report `Unsupported`. Argument
/// slots are `Option` because the registry passes through whatever the
/// event producer supplied, and a module must reject a missing argument
/// rather than assume it.
pub trait ModuleOps: Sync {
    /// Name the module registers under.
    fn module(&self) -> &str;

    /// Record the event described by `info`.
    fn dump(&self, _log_dir: Option<&str>, _info: Option<&ErrorInfo>) -> Result<(), BboxError> {
        Err(BboxError::Unsupported)
    }

    /// Called after `dump`, before the system is reset or the event is
    /// closed.
    fn reset(&self, _info: Option<&ErrorInfo>) -> Result<(), BboxError> {
        Err(BboxError::Unsupported)
    }

    /// Fill `out` with the event recorded before the last reset, if any.
    fn get_last_log_info(&self, _out: Option<&mut ErrorInfo>) -> Result<(), BboxError> {
        Err(BboxError::Unsupported)
    }

    /// Persist the event recorded before the last reset.
    fn save_last_log(&self, _log_dir: Option<&str>, _info: Option<&ErrorInfo>) -> Result<(), BboxError> {
        Err(BboxError::Unsupported)
    }
}

/// Module registry contract.
pub trait ModuleRegistry: Sync {
    fn register_module_ops(&self, ops: &'static dyn ModuleOps) -> Result<(), BboxError>;

    /// Raise an event against `module`. Dispatch happens on the registry's
    /// side.
    fn notify_error(
        &self,
        event: &str,
        module: &str,
        error_desc: &str,
        need_sys_reset: u32,
    ) -> Result<(), BboxError>;
}
