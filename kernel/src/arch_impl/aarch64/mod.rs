//! AArch64 (ARM64) architecture implementation.

pub mod cache;
pub mod constants;
