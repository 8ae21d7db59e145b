//! System fault module.
//!
//! Implements the four module operations for the `SYSTEM` module:
//!
//! - **dump**: on a panic, seal the record header in the retained region and
//!   flush it to memory. Nothing else; the filesystem and the upload
//!   transport may be what is failing. Any other event is written straight
//!   to the user fault log.
//! - **reset**: upload the user fault log for non-panic events.
//! - **get_last_log_info**: report a record left behind by a previous boot.
//! - **save_last_log**: persist that record to the kernel fault log, clear
//!   the region and upload the log.
//!
//! A panic record is therefore uploaded exactly once, on the boot after the
//! panic.

use conquer_once::spin::OnceCell;
use core::sync::atomic::{AtomicBool, Ordering};

use super::error::BboxError;
use super::exc_hook;
use super::info::{ErrorInfo, MODULE_SYSTEM};
use super::record::{self, FaultLogHeader};
use super::region::RetainedLogRegion;
use super::storage;
use super::upload;
use super::{ModuleOps, ModuleRegistry, Platform};
use crate::config::BlackboxConfig;

/// Owner of the retained log region and the collaborators the system module
/// talks to.
pub struct SystemAdapter<'p> {
    region: RetainedLogRegion,
    platform: Platform<'p>,
    config: BlackboxConfig,
}

impl<'p> SystemAdapter<'p> {
    /// Acquire a region as configured and build an adapter over it.
    pub fn new(platform: Platform<'p>, config: BlackboxConfig) -> Result<Self, BboxError> {
        let region = RetainedLogRegion::acquire(
            platform.pages,
            config.fault_log_size,
            config.overlap_count,
        )?;
        Ok(Self::with_region(region, platform, config))
    }

    /// Build an adapter over an existing region, e.g. one made with
    /// [`RetainedLogRegion::from_reserved`].
    pub fn with_region(
        region: RetainedLogRegion,
        platform: Platform<'p>,
        config: BlackboxConfig,
    ) -> Self {
        Self {
            region,
            platform,
            config,
        }
    }

    pub fn region(&self) -> &RetainedLogRegion {
        &self.region
    }

    pub fn config(&self) -> &BlackboxConfig {
        &self.config
    }

    pub fn into_region(self) -> RetainedLogRegion {
        self.region
    }

    /// Diagnostic bytes the reporter captured, clamped to the payload area.
    fn captured_len(&self) -> usize {
        let captured = self.platform.exc.captured_len() as usize;
        record::clamp_payload_len(captured, self.region.capacity())
    }

    fn flush_region(&self) {
        let (start, end) = self.region.address_range();
        self.platform.cache.flush_range(start, end);
    }

    /// Panic path. Must not log, allocate, or touch storage.
    fn seal_panic_record(&self, info: &ErrorInfo) -> Result<(), BboxError> {
        let mut claim = self.region.try_claim()?;
        claim.clear_header();
        // Bounded by a u32 captured length, so the cast is lossless.
        let len = self.captured_len() as u32;
        claim.seal(&FaultLogHeader::new(len, info));
        self.flush_region();
        Ok(())
    }

    fn save_user_fault_log(&self, info: &ErrorInfo) {
        let path = self.config.user_fault_log_path;
        let payload = self.region.payload(self.captured_len());
        log::debug!(
            "blackbox: saving {} bytes for event [{}] to {}",
            payload.len(),
            info.event(),
            path
        );
        if let Err(e) = storage::save_fault_log(self.platform.store, path, payload, info) {
            log::warn!("blackbox: failed to save {}: {}", path, e);
        }
    }
}

impl ModuleOps for SystemAdapter<'_> {
    fn module(&self) -> &str {
        MODULE_SYSTEM
    }

    fn dump(&self, log_dir: Option<&str>, info: Option<&ErrorInfo>) -> Result<(), BboxError> {
        let (Some(_), Some(info)) = (log_dir, info) else {
            log::error!(
                "blackbox: dump: log_dir present: {}, info present: {}",
                log_dir.is_some(),
                info.is_some()
            );
            return Err(BboxError::InvalidArgument);
        };

        if info.is_panic() {
            return self.seal_panic_record(info);
        }

        self.save_user_fault_log(info);
        Ok(())
    }

    fn reset(&self, info: Option<&ErrorInfo>) -> Result<(), BboxError> {
        let Some(info) = info else {
            log::error!("blackbox: reset: info missing");
            return Err(BboxError::InvalidArgument);
        };

        // Panic records go up with save_last_log on the next boot.
        if !info.is_panic() {
            let path = self.config.user_fault_log_path;
            if let Err(e) = upload::upload_fault_log(self.platform.uploader, path, info) {
                log::warn!("blackbox: failed to upload {}: {}", path, e);
            }
        }
        Ok(())
    }

    fn get_last_log_info(&self, out: Option<&mut ErrorInfo>) -> Result<(), BboxError> {
        let Some(out) = out else {
            log::error!("blackbox: get_last_log_info: info missing");
            return Err(BboxError::InvalidArgument);
        };

        let header = self.region.read_header().ok_or(BboxError::NoRecord)?;
        *out = header.info;
        Ok(())
    }

    fn save_last_log(&self, log_dir: Option<&str>, info: Option<&ErrorInfo>) -> Result<(), BboxError> {
        let (Some(_), Some(info)) = (log_dir, info) else {
            log::error!(
                "blackbox: save_last_log: log_dir present: {}, info present: {}",
                log_dir.is_some(),
                info.is_some()
            );
            return Err(BboxError::InvalidArgument);
        };

        let path = self.config.kernel_fault_log_path;
        let mut claim = self.region.try_claim()?;
        let header = self.region.read_header();

        if let Some(header) = &header {
            let len = record::clamp_payload_len(header.payload_len as usize, self.region.capacity());
            log::info!(
                "blackbox: last boot ended in [{}] from [{}], {} bytes captured",
                header.info.event(),
                header.info.module(),
                len
            );
            let payload = self.region.payload(len);
            if let Err(e) = storage::save_fault_log(self.platform.store, path, payload, &header.info) {
                log::warn!("blackbox: failed to save {}: {}", path, e);
            }
        }

        claim.zero();
        self.flush_region();
        drop(claim);

        if header.is_none() {
            log::debug!("blackbox: no fault record from last boot");
            return Ok(());
        }

        if let Err(e) = upload::upload_fault_log(self.platform.uploader, path, info) {
            log::warn!("blackbox: failed to upload {}: {}", path, e);
        }
        Ok(())
    }
}

/// The `SYSTEM` module as registered with the module registry.
///
/// The registry needs a `'static` handle, so this forwards to an adapter
/// stored in a once-cell. The adapter is stored before registration, so a
/// registry that dispatches from inside `register_module_ops` already sees
/// the region. Until `enabled` is set, and again after a refused
/// registration, every operation reports `NotInitialized`.
pub struct SystemModule {
    adapter: &'static OnceCell<SystemAdapter<'static>>,
    enabled: AtomicBool,
}

impl SystemModule {
    pub const fn new(adapter: &'static OnceCell<SystemAdapter<'static>>) -> Self {
        Self {
            adapter,
            enabled: AtomicBool::new(false),
        }
    }

    pub fn adapter(&self) -> Result<&SystemAdapter<'static>, BboxError> {
        if !self.enabled.load(Ordering::Acquire) {
            return Err(BboxError::NotInitialized);
        }
        self.adapter.get().ok_or(BboxError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Bring the subsystem up: acquire the region, point the exception
    /// reporter at it and register with `registry`.
    ///
    /// On any failure the subsystem stays absent and every operation keeps
    /// returning `NotInitialized`. A module whose registration was refused
    /// cannot be installed again. Nothing here panics.
    pub fn install(
        &'static self,
        platform: Platform<'static>,
        config: BlackboxConfig,
        registry: &dyn ModuleRegistry,
    ) -> Result<(), BboxError> {
        if self.adapter.is_initialized() {
            return Err(BboxError::AlreadyInitialized);
        }

        let region = match RetainedLogRegion::acquire(
            platform.pages,
            config.fault_log_size,
            config.overlap_count,
        ) {
            Ok(region) => region,
            Err(e) => {
                log::error!("blackbox: failed to reserve log region: {}", e);
                run_selftest(registry);
                return Err(e);
            }
        };
        log::info!(
            "blackbox: log region at {:p}, {} bytes ({} pages)",
            region.base(),
            region.capacity(),
            region.pages()
        );

        let adapter = SystemAdapter::with_region(region, platform, config);
        if self.adapter.try_init_once(move || adapter).is_err() {
            // Lost to a concurrent install; our pages stay reserved.
            log::error!("blackbox: raced with another install");
            return Err(BboxError::AlreadyInitialized);
        }
        let Some(adapter) = self.adapter.get() else {
            return Err(BboxError::NotInitialized);
        };

        exc_hook::register_exc_info_hook(adapter.region(), platform.exc);
        self.enabled.store(true, Ordering::Release);

        if let Err(e) = registry.register_module_ops(self) {
            log::error!("blackbox: failed to register module {}: {}", MODULE_SYSTEM, e);
            self.enabled.store(false, Ordering::Release);
            platform.exc.unregister_hook();
            // SAFETY: `enabled` is cleared and the cell is private to this
            // module, so nothing reaches the region again; the hook is gone.
            if let Err(e) = unsafe { adapter.region().retire(platform.pages) } {
                log::warn!("blackbox: log region still in use, not freed: {}", e);
            }
            return Err(e);
        }
        log::info!("blackbox: module {} ready", MODULE_SYSTEM);

        run_selftest(registry);
        Ok(())
    }
}

#[cfg(feature = "blackbox_test")]
fn run_selftest(registry: &dyn ModuleRegistry) {
    super::selftest::run(registry);
}

#[cfg(not(feature = "blackbox_test"))]
fn run_selftest(_registry: &dyn ModuleRegistry) {}

impl ModuleOps for SystemModule {
    fn module(&self) -> &str {
        MODULE_SYSTEM
    }

    fn dump(&self, log_dir: Option<&str>, info: Option<&ErrorInfo>) -> Result<(), BboxError> {
        self.adapter()?.dump(log_dir, info)
    }

    fn reset(&self, info: Option<&ErrorInfo>) -> Result<(), BboxError> {
        self.adapter()?.reset(info)
    }

    fn get_last_log_info(&self, out: Option<&mut ErrorInfo>) -> Result<(), BboxError> {
        self.adapter()?.get_last_log_info(out)
    }

    fn save_last_log(&self, log_dir: Option<&str>, info: Option<&ErrorInfo>) -> Result<(), BboxError> {
        self.adapter()?.save_last_log(log_dir, info)
    }
}

/// Kernel-wide adapter, set once by [`init`]. Reached only through
/// [`SYSTEM_MODULE`].
static SYSTEM_ADAPTER: OnceCell<SystemAdapter<'static>> = OnceCell::uninit();

/// Kernel-wide `SYSTEM` module.
pub static SYSTEM_MODULE: SystemModule = SystemModule::new(&SYSTEM_ADAPTER);

/// Initialize the kernel-wide blackbox with the default configuration.
///
/// Call once from architecture-level init, before the subsystems whose
/// failures should be captured. A failure is logged and leaves the
/// blackbox disabled; boot should carry on regardless.
pub fn init(platform: Platform<'static>, registry: &dyn ModuleRegistry) -> Result<(), BboxError> {
    init_with_config(platform, BlackboxConfig::DEFAULT, registry)
}

/// Like [`init`], with a board-specific configuration.
pub fn init_with_config(
    platform: Platform<'static>,
    config: BlackboxConfig,
    registry: &dyn ModuleRegistry,
) -> Result<(), BboxError> {
    SYSTEM_MODULE.install(platform, config, registry)
}
