//! Fault record binary layout.
//!
//! The record is the only durable format the blackbox owns. It has to be
//! readable by whatever kernel boots after the reset, which may be a
//! different build, so every field has a fixed offset and size and integers
//! are little-endian. Nothing here depends on `repr(C)` struct layout.
//!
//! # Layout
//!
//! ```text
//! offset  size  field
//! ------  ----  -----------------------------------------------
//!      0     8  tag            b"GOODLOG\0"
//!      8     4  payload_len    u32 LE, diagnostic bytes captured
//!     12    32  event          NUL-padded
//!     44    32  module         NUL-padded
//!     76   512  error_desc     NUL-padded
//!    588     …  payload        raw diagnostic text
//! ```
//!
//! A record is valid iff the tag matches byte-for-byte. There is no checksum
//! or version field; the tag only proves the region was sealed by us rather
//! than left over from firmware or power-on garbage.

use super::info::{ErrorInfo, ERROR_DESC_MAX_LEN, EVENT_MAX_LEN, MODULE_MAX_LEN};

/// Validity marker.
pub const LOG_FLAG: [u8; TAG_LEN] = *b"GOODLOG\0";

pub const TAG_LEN: usize = 8;

const LEN_OFFSET: usize = TAG_LEN;
const EVENT_OFFSET: usize = LEN_OFFSET + 4;
const MODULE_OFFSET: usize = EVENT_OFFSET + EVENT_MAX_LEN;
const DESC_OFFSET: usize = MODULE_OFFSET + MODULE_MAX_LEN;

/// Bytes occupied by the header at the start of the region.
pub const HEADER_SIZE: usize = DESC_OFFSET + ERROR_DESC_MAX_LEN;

const _: () = assert!(HEADER_SIZE == 588, "fault record header layout changed");

/// Decoded record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultLogHeader {
    /// Diagnostic bytes captured after the header.
    pub payload_len: u32,
    pub info: ErrorInfo,
}

impl FaultLogHeader {
    pub fn new(payload_len: u32, info: &ErrorInfo) -> Self {
        Self { payload_len, info: *info }
    }

    /// Encode the full header, tag included.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..TAG_LEN].copy_from_slice(&LOG_FLAG);
        out[LEN_OFFSET..EVENT_OFFSET].copy_from_slice(&self.payload_len.to_le_bytes());
        out[EVENT_OFFSET..MODULE_OFFSET].copy_from_slice(self.info.raw_event());
        out[MODULE_OFFSET..DESC_OFFSET].copy_from_slice(self.info.raw_module());
        out[DESC_OFFSET..HEADER_SIZE].copy_from_slice(self.info.raw_error_desc());
        out
    }

    /// Decode a header, or `None` if the tag does not match.
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Option<Self> {
        if !has_valid_tag(bytes) {
            return None;
        }

        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[LEN_OFFSET..EVENT_OFFSET]);
        let mut event = [0u8; EVENT_MAX_LEN];
        event.copy_from_slice(&bytes[EVENT_OFFSET..MODULE_OFFSET]);
        let mut module = [0u8; MODULE_MAX_LEN];
        module.copy_from_slice(&bytes[MODULE_OFFSET..DESC_OFFSET]);
        let mut error_desc = [0u8; ERROR_DESC_MAX_LEN];
        error_desc.copy_from_slice(&bytes[DESC_OFFSET..HEADER_SIZE]);

        Some(Self {
            payload_len: u32::from_le_bytes(len),
            info: ErrorInfo::from_raw(event, module, error_desc),
        })
    }
}

/// True iff `bytes` starts with the record tag.
#[inline]
pub fn has_valid_tag(bytes: &[u8]) -> bool {
    bytes.len() >= TAG_LEN && bytes[..TAG_LEN] == LOG_FLAG
}

/// Payload bytes a region of `capacity` bytes can hold.
#[inline]
pub const fn max_payload(capacity: usize) -> usize {
    capacity.saturating_sub(HEADER_SIZE)
}

/// Clamp a diagnostic length to what fits behind the header. Oversized
/// diagnostics are truncated, never written past the region.
#[inline]
pub fn clamp_payload_len(len: usize, capacity: usize) -> usize {
    len.min(max_payload(capacity))
}
