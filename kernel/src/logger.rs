//! Early-boot logger.
//!
//! The blackbox comes up at architecture init level, long before any console
//! exists, and its init path is exactly where we want to see failures. This
//! logger formats records into a fixed in-memory buffer until a console sink
//! is attached, then replays the buffer once and forwards everything after
//! that straight to the sink. It never allocates.

use conquer_once::spin::OnceCell;
use core::fmt::{self, Write};
use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

/// Bytes of boot messages kept before a sink is attached.
const BUFFER_SIZE: usize = 8192;

/// Longest single formatted line sent to the sink.
const LINE_SIZE: usize = 256;

/// Where log lines go once the console is up.
pub trait ConsoleSink: Sync {
    fn write_str(&self, s: &str);
}

/// Fixed-capacity text buffer.
///
/// Writes that do not fit are truncated at a character boundary rather than
/// failing, so a long message never aborts the formatting of a fault log.
pub struct FixedBuffer<const N: usize> {
    buffer: [u8; N],
    position: usize,
}

impl<const N: usize> FixedBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buffer: [0; N],
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    pub fn clear(&mut self) {
        self.position = 0;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.position]
    }

    pub fn as_str(&self) -> &str {
        // Only whole characters are ever copied in.
        core::str::from_utf8(self.as_bytes()).unwrap_or("<invalid UTF-8>")
    }
}

impl<const N: usize> Default for FixedBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Write for FixedBuffer<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let remaining = N - self.position;
        let mut len = s.len().min(remaining);
        while !s.is_char_boundary(len) {
            len -= 1;
        }
        self.buffer[self.position..self.position + len].copy_from_slice(&s.as_bytes()[..len]);
        self.position += len;
        Ok(())
    }
}

pub struct BufferedLogger {
    buffer: Mutex<FixedBuffer<BUFFER_SIZE>>,
    sink: OnceCell<&'static dyn ConsoleSink>,
    level: LevelFilter,
}

impl BufferedLogger {
    pub const fn new(level: LevelFilter) -> Self {
        Self {
            buffer: Mutex::new(FixedBuffer::new()),
            sink: OnceCell::uninit(),
            level,
        }
    }

    /// Attach the console. Buffered messages are replayed to it first.
    /// Later calls are ignored.
    pub fn attach(&self, sink: &'static dyn ConsoleSink) {
        // Hold the buffer while publishing the sink so no record can land
        // in the buffer after the replay.
        let mut buffer = self.buffer.lock();
        if self.sink.try_init_once(|| sink).is_err() {
            return;
        }
        if !buffer.is_empty() {
            sink.write_str("=== Buffered Boot Messages ===\n");
            sink.write_str(buffer.as_str());
            sink.write_str("=== End Buffered Messages ===\n");
            buffer.clear();
        }
    }

    /// Bytes waiting for a sink.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }
}

fn format_record(out: &mut impl Write, record: &Record) {
    let _ = writeln!(out, "[{:>5}] {}: {}", record.level(), record.target(), record.args());
}

impl Log for BufferedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Some(sink) = self.sink.get() {
            let mut line = FixedBuffer::<LINE_SIZE>::new();
            format_record(&mut line, record);
            sink.write_str(line.as_str());
            return;
        }

        // Use try_lock: this may run from an exception context that
        // interrupted a holder of the buffer lock.
        if let Some(mut buffer) = self.buffer.try_lock() {
            match self.sink.get() {
                // Attached while we were waiting for the lock
                Some(sink) => {
                    drop(buffer);
                    let mut line = FixedBuffer::<LINE_SIZE>::new();
                    format_record(&mut line, record);
                    sink.write_str(line.as_str());
                }
                None => format_record(&mut *buffer, record),
            }
        }
    }

    fn flush(&self) {}
}

/// Install `logger` as the global `log` backend.
pub fn init(logger: &'static BufferedLogger) -> Result<(), log::SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(logger.level);
    Ok(())
}
