//! Monotonic clock abstraction for the I/O core
//!
//! All cache timestamps and polling cadences run on a millisecond clock
//! anchored at process start. The trait separates time acquisition from the
//! cache and scheduler so tests can drive them with a fixed clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Millisecond clock used for source and server timestamps
///
/// Implementations must be monotonic: a later call never returns a smaller
/// value than an earlier one.
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds elapsed since the clock's origin (process start)
    fn now_ms(&self) -> u64;
}

/// Production clock: milliseconds since construction, `Instant`-backed
///
/// `Instant` is monotonic by contract, so timestamps taken from this clock
/// can never regress. Wall-clock time is deliberately not involved; the
/// adapter converts to the protocol epoch only at the wire boundary.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Settable clock for deterministic tests
#[derive(Debug, Default)]
pub struct FixedClock {
    now_ms: AtomicU64,
}

impl FixedClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    /// Move the clock to an absolute time
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Advance the clock by a delta
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
