//! Boot logging with configurable log levels.
//!
//! There is no console this early, so records land in a fixed RAM ring
//! instead of a device. Whoever owns the board after `main` (a debugger,
//! or the application once it has a console) empties it with [`drain`].
//!
//! Log levels follow log4j:
//! - TRACE: Fine-grained debugging information
//! - DEBUG: Debugging information
//! - INFO: Informational messages
//! - WARN: Warning messages
//! - ERROR: Error messages

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use heapless::{Deque, String};
use spin::Mutex;

pub use bootabi::LogLevel;

/// Bytes of text kept per record; longer messages are cut.
pub const RECORD_TEXT: usize = 80;
/// Records kept before the oldest is evicted.
pub const RING_RECORDS: usize = 32;

/// Global log level filter. Messages below this level are suppressed.
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

static LOG: BootLog<RING_RECORDS> = BootLog::new();

/// Held by tests that drain the global ring, so one drain cannot swallow
/// records another test is waiting for.
#[cfg(test)]
pub(crate) static TEST_DRAIN: Mutex<()> = Mutex::new(());

/// Get the current log level threshold.
pub fn get_log_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set the log level threshold. Messages below this level will be suppressed.
pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Check if a message at the given level should be logged.
#[inline]
pub fn should_log(level: LogLevel) -> bool {
    level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

#[derive(Clone, Debug)]
pub struct Record {
    pub level: LogLevel,
    pub text: String<RECORD_TEXT>,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.level.tag())?;
        f.write_str(&self.text)
    }
}

/// `fmt::Write` into a fixed string that keeps the head and drops the rest.
struct Truncate<'a> {
    buf: &'a mut String<RECORD_TEXT>,
    full: bool,
}

impl Write for Truncate<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.full {
                break;
            }
            if self.buf.push(c).is_err() {
                self.full = true;
            }
        }
        Ok(())
    }
}

pub struct BootLog<const N: usize> {
    ring: Mutex<Deque<Record, N>>,
    dropped: AtomicUsize,
}

impl<const N: usize> BootLog<N> {
    pub const fn new() -> Self {
        BootLog {
            ring: Mutex::new(Deque::new()),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Append a record, evicting the oldest one when the ring is full.
    pub fn push(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        let mut text = String::new();
        let _ = Truncate { buf: &mut text, full: false }.write_fmt(args);

        let mut ring = self.ring.lock();
        if ring.is_full() {
            ring.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        let _ = ring.push_back(Record { level, text });
    }

    /// Hand every record to `f`, oldest first, and empty the ring.
    ///
    /// The lock is released before `f` runs, so `f` may log (or panic and
    /// have the panic handler log) without deadlocking. Records pushed by
    /// `f` stay in the ring for the next drain.
    pub fn drain<F: FnMut(&Record)>(&self, mut f: F) {
        let mut taken = core::mem::replace(&mut *self.ring.lock(), Deque::new());
        while let Some(rec) = taken.pop_front() {
            f(&rec);
        }
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records lost to eviction since boot.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for BootLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Record into the global boot log, ignoring the level filter.
pub fn log(level: LogLevel, args: fmt::Arguments<'_>) {
    LOG.push(level, args);
}

pub fn drain<F: FnMut(&Record)>(f: F) {
    LOG.drain(f);
}

pub fn len() -> usize {
    LOG.len()
}

pub fn dropped() -> usize {
    LOG.dropped()
}

/// Internal macro for boot logging with level filtering.
#[macro_export]
macro_rules! klog {
    ($level:expr, $($arg:tt)*) => {{
        let level = $level;
        if $crate::logging::should_log(level) {
            $crate::logging::log(level, format_args!($($arg)*));
        }
    }};
}

/// Log a trace-level message (finest granularity).
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {
        $crate::klog!($crate::logging::LogLevel::Trace, $($arg)*)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {
        $crate::klog!($crate::logging::LogLevel::Debug, $($arg)*)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {
        $crate::klog!($crate::logging::LogLevel::Info, $($arg)*)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {
        $crate::klog!($crate::logging::LogLevel::Warn, $($arg)*)
    };
}

/// Log an error-level message.
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {
        $crate::klog!($crate::logging::LogLevel::Error, $($arg)*)
    };
}
