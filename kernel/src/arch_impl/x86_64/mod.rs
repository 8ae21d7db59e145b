//! x86_64 architecture implementation.

pub mod cache;
pub mod constants;
