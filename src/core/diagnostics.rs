//! Diagnostic variables
//!
//! A read counter and a software loopback pair used by conformance tests to
//! measure pure protocol round-trip time. Kept apart from the I/O cache:
//! nothing here touches the cache mutex or the hardware, and no operation
//! can suspend.

use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

/// Process-wide diagnostic state, one instance per core context
#[derive(Debug, Default)]
pub struct Diagnostics {
    counter: AtomicU16,
    // input in the high half, output in the low half; one word keeps the
    // mirror coherent without a lock
    loopback: AtomicU32,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the diagnostic counter and return the new value
    ///
    /// Exactly one increment per read; wraps modulo 2^16. Concurrent
    /// readers may observe values out of order but never lose an
    /// increment.
    pub fn bump_counter(&self) -> u16 {
        self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Store a loopback word, mirroring it to the output in the same store
    pub fn write_loopback(&self, value: u16) {
        let packed = u32::from(value) << 16 | u32::from(value);
        self.loopback.store(packed, Ordering::SeqCst);
    }

    /// Last word written to `loopback_input`
    pub fn loopback_input(&self) -> u16 {
        (self.loopback.load(Ordering::SeqCst) >> 16) as u16
    }

    /// Mirrored word, always equal to the last loopback write
    pub fn loopback_output(&self) -> u16 {
        self.loopback.load(Ordering::SeqCst) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counter_increments_by_one() {
        let diag = Diagnostics::new();
        let first = diag.bump_counter();
        let second = diag.bump_counter();

        assert_eq!(first, 1);
        assert_eq!(second, first.wrapping_add(1));
    }

    #[test]
    fn test_counter_wraps_modulo_u16() {
        let diag = Diagnostics::new();
        diag.counter.store(u16::MAX, Ordering::Relaxed);

        assert_eq!(diag.bump_counter(), 0);
        assert_eq!(diag.bump_counter(), 1);
    }

    #[test]
    fn test_counter_loses_no_increments_under_contention() {
        let diag = Arc::new(Diagnostics::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let diag = diag.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1_000 {
                    diag.bump_counter();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(diag.counter.load(Ordering::Relaxed), 8_000);
    }

    #[test]
    fn test_loopback_mirrors_every_write() {
        let diag = Diagnostics::new();

        for value in [0u16, 1, 0x00FF, 0xABCD, u16::MAX] {
            diag.write_loopback(value);
            assert_eq!(diag.loopback_input(), value);
            assert_eq!(diag.loopback_output(), value);
        }
    }

    #[test]
    fn test_loopback_pair_is_never_torn() {
        let diag = Arc::new(Diagnostics::new());

        let writer = {
            let diag = diag.clone();
            std::thread::spawn(move || {
                for value in 0..10_000u16 {
                    diag.write_loopback(value);
                }
            })
        };

        for _ in 0..10_000 {
            let packed = diag.loopback.load(Ordering::SeqCst);
            assert_eq!((packed >> 16) as u16, packed as u16);
        }

        writer.join().unwrap();
    }
}
