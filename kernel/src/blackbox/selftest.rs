//! Boot-time smoke test for the module registry path.
//!
//! Built with the `blackbox_test` feature. Registers a module that provides
//! no operations and raises one event against it, which exercises the
//! registry's dispatch of an event to a module that cannot handle it.

use super::{ModuleOps, ModuleRegistry};

pub const MODULE_TEST: &str = "MODULE_TEST";
pub const EVENT_TEST1: &str = "EVENT_TEST1";
pub const TEST_ERROR_DESC: &str = "Test BBoxNotifyError111";

/// A module with every capability slot empty.
pub struct TestModule;

impl ModuleOps for TestModule {
    fn module(&self) -> &str {
        MODULE_TEST
    }
}

pub static TEST_MODULE: TestModule = TestModule;

/// Register [`TEST_MODULE`] and raise [`EVENT_TEST1`] against it.
pub fn run(registry: &dyn ModuleRegistry) {
    if let Err(e) = registry.register_module_ops(&TEST_MODULE) {
        log::error!("blackbox: selftest: failed to register {}: {}", MODULE_TEST, e);
        return;
    }
    if let Err(e) = registry.notify_error(EVENT_TEST1, MODULE_TEST, TEST_ERROR_DESC, 0) {
        log::warn!("blackbox: selftest: notify failed: {}", e);
    }
}
