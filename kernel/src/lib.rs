//! Kernel blackbox: fault capture that survives an uncontrolled reset.
//!
//! The blackbox reserves a physically contiguous block of memory at
//! architecture init time and uses it to carry a fault record across a
//! reboot. On a panic the exception reporter streams diagnostic text straight
//! into that block, the system fault module seals it with a header and
//! flushes the data cache, and the next boot picks the record up, persists
//! it to the log partition and hands it to the upload transport.
//!
//! ```text
//!  exception ──> registry ──> SystemModule::dump
//!                                   │
//!                 panic ────────────┼──────────── other events
//!                   │                               │
//!        seal header + dcache flush         user_fault.log (buffered I/O)
//!                   │                               │
//!              ~~ reset ~~                    reset -> upload
//!                   │
//!        get_last_log_info / save_last_log
//!                   │
//!        kernel_fault.log -> upload, region zeroed
//! ```
//!
//! Nothing in this crate allocates from the heap, and nothing is allowed to
//! escalate into a kernel panic: once initialized the blackbox is strictly
//! best-effort, and if initialization fails it is silently absent.

#![cfg_attr(not(test), no_std)]

pub mod arch_impl;
pub mod blackbox;
pub mod config;
pub mod logger;
pub mod memory;

#[cfg(test)]
mod testing;

pub use blackbox::{init, BboxError, ErrorInfo, ModuleOps, ModuleRegistry, Platform};
pub use config::BlackboxConfig;
