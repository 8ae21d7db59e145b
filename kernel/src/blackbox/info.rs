//! Error information carried with every fault event.

use core::fmt;

pub const EVENT_MAX_LEN: usize = 32;
pub const MODULE_MAX_LEN: usize = 32;
pub const ERROR_DESC_MAX_LEN: usize = 512;

/// Module name the system fault module registers under.
pub const MODULE_SYSTEM: &str = "SYSTEM";

// Event kinds. Only PANIC changes how a fault is recorded.
pub const EVENT_SYSREBOOT: &str = "SYSREBOOT";
pub const EVENT_LONGPRESS: &str = "LONGPRESS";
pub const EVENT_COMBINATIONKEY: &str = "COMBINATIONKEY";
pub const EVENT_SUBSYSREBOOT: &str = "SUBSYSREBOOT";
pub const EVENT_POWEROFF: &str = "POWEROFF";
pub const EVENT_PANIC: &str = "PANIC";
pub const EVENT_OOPS: &str = "OOPS";
pub const EVENT_SYS_WATCHDOG: &str = "SYSWATCHDOG";
pub const EVENT_HUNGTASK: &str = "HUNGTASK";
pub const EVENT_BOOTFAIL: &str = "BOOTFAIL";

/// Fixed-size description of a fault event.
///
/// Every field is NUL-padded UTF-8 and always holds at least one trailing
/// NUL, so the struct can be copied byte-for-byte into the retained log
/// region and read back by a different build.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ErrorInfo {
    event: [u8; EVENT_MAX_LEN],
    module: [u8; MODULE_MAX_LEN],
    error_desc: [u8; ERROR_DESC_MAX_LEN],
}

impl ErrorInfo {
    pub const fn empty() -> Self {
        Self {
            event: [0; EVENT_MAX_LEN],
            module: [0; MODULE_MAX_LEN],
            error_desc: [0; ERROR_DESC_MAX_LEN],
        }
    }

    /// Build an `ErrorInfo`, truncating each string to fit its field.
    pub fn new(event: &str, module: &str, error_desc: &str) -> Self {
        let mut info = Self::empty();
        copy_field(&mut info.event, event);
        copy_field(&mut info.module, module);
        copy_field(&mut info.error_desc, error_desc);
        info
    }

    pub(crate) const fn from_raw(
        event: [u8; EVENT_MAX_LEN],
        module: [u8; MODULE_MAX_LEN],
        error_desc: [u8; ERROR_DESC_MAX_LEN],
    ) -> Self {
        Self { event, module, error_desc }
    }

    pub fn event(&self) -> &str {
        field_str(&self.event)
    }

    pub fn module(&self) -> &str {
        field_str(&self.module)
    }

    pub fn error_desc(&self) -> &str {
        field_str(&self.error_desc)
    }

    /// True for the one event kind after which a reset is imminent.
    pub fn is_panic(&self) -> bool {
        self.event() == EVENT_PANIC
    }

    pub(crate) fn raw_event(&self) -> &[u8; EVENT_MAX_LEN] {
        &self.event
    }

    pub(crate) fn raw_module(&self) -> &[u8; MODULE_MAX_LEN] {
        &self.module
    }

    pub(crate) fn raw_error_desc(&self) -> &[u8; ERROR_DESC_MAX_LEN] {
        &self.error_desc
    }
}

impl Default for ErrorInfo {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorInfo")
            .field("event", &self.event())
            .field("module", &self.module())
            .field("error_desc", &self.error_desc())
            .finish()
    }
}

/// Copy `src` into `dst`, leaving room for the terminating NUL and never
/// splitting a UTF-8 sequence.
fn copy_field(dst: &mut [u8], src: &str) {
    let mut len = src.len().min(dst.len() - 1);
    while !src.is_char_boundary(len) {
        len -= 1;
    }
    dst[..len].copy_from_slice(&src.as_bytes()[..len]);
    dst[len..].fill(0);
}

/// Read a NUL-padded field. Bytes that are not valid UTF-8 (a corrupted
/// record) end the string early rather than failing.
fn field_str(field: &[u8]) -> &str {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let bytes = &field[..end];
    match core::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
    }
}
