//! Real-time I/O cache
//!
//! The sole serialisation point between the polling side and the network
//! side. One mutex guards every entry; critical sections are field copies
//! only (no I/O, no logging, no allocation happens under the lock) and
//! every acquisition is bounded so a stalled writer can never wedge the
//! protocol path.
//!
//! Each entry carries two timestamps: the source timestamp (when the
//! hardware sample was taken) and the server timestamp (when the cache was
//! updated). Both come from the core's monotonic clock and are
//! non-decreasing per variable; a source-timestamp regression is refused as
//! a fatal clock condition.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use super::hal::NUM_ADC_CHANNELS;
use super::time::Clock;
use crate::error::{IoSrvError, Result};

/// Coherent value/timestamp triple for a discrete word
///
/// A zero `server_ts_ms` means "not yet valid": either nothing has been
/// published or the read timed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordSnapshot {
    pub value: u16,
    pub source_ts_ms: u64,
    pub server_ts_ms: u64,
}

/// Coherent value/timestamp triple for one analog channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcSnapshot {
    pub value: u16,
    pub source_ts_ms: u64,
    pub server_ts_ms: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct WordEntry {
    value: u16,
    source_ts_ms: u64,
    server_ts_ms: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct AdcEntry {
    value: u16,
    source_ts_ms: u64,
    server_ts_ms: u64,
    valid: bool,
}

#[derive(Debug, Default)]
struct CacheState {
    inputs: WordEntry,
    outputs: WordEntry,
    adc: [AdcEntry; NUM_ADC_CHANNELS],
}

/// Thread-safe store of last-known I/O values
pub struct IoCache {
    state: Mutex<CacheState>,
    read_timeout: Duration,
    write_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl IoCache {
    /// New cache with everything zeroed and all ADC channels invalid
    pub fn new(read_timeout: Duration, write_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            read_timeout,
            write_timeout,
            clock,
        }
    }

    /// Discrete inputs triple; zero snapshot if the lock wait times out
    pub fn get_inputs(&self) -> WordSnapshot {
        match self.state.try_lock_for(self.read_timeout) {
            Some(state) => WordSnapshot {
                value: state.inputs.value,
                source_ts_ms: state.inputs.source_ts_ms,
                server_ts_ms: state.inputs.server_ts_ms,
            },
            None => {
                info!("Input read hit the cache wait budget, returning zero snapshot");
                WordSnapshot::default()
            }
        }
    }

    /// Discrete outputs triple; zero snapshot if the lock wait times out
    pub fn get_outputs(&self) -> WordSnapshot {
        match self.state.try_lock_for(self.read_timeout) {
            Some(state) => WordSnapshot {
                value: state.outputs.value,
                source_ts_ms: state.outputs.source_ts_ms,
                server_ts_ms: state.outputs.server_ts_ms,
            },
            None => {
                info!("Output read hit the cache wait budget, returning zero snapshot");
                WordSnapshot::default()
            }
        }
    }

    /// Publish a fresh input word
    pub fn update_inputs(&self, value: u16, source_ts_ms: u64) -> Result<()> {
        let now = self.clock.now_ms();
        let mut state = self.state.try_lock_for(self.write_timeout).ok_or_else(|| {
            warn!("Input update dropped: cache wait budget exceeded");
            IoSrvError::CacheTimeout("discrete inputs update".into())
        })?;

        if source_ts_ms < state.inputs.source_ts_ms {
            let stored = state.inputs.source_ts_ms;
            drop(state);
            return Err(IoSrvError::ClockError(format!(
                "input source timestamp went backwards: {} < {}",
                source_ts_ms, stored
            )));
        }

        state.inputs.value = value;
        state.inputs.source_ts_ms = source_ts_ms;
        state.inputs.server_ts_ms = now.max(source_ts_ms);
        Ok(())
    }

    /// Publish a fresh output word (mirror of the last protocol write)
    pub fn update_outputs(&self, value: u16, source_ts_ms: u64) -> Result<()> {
        let now = self.clock.now_ms();
        let mut state = self.state.try_lock_for(self.write_timeout).ok_or_else(|| {
            warn!("Output update dropped: cache wait budget exceeded");
            IoSrvError::CacheTimeout("discrete outputs update".into())
        })?;

        if source_ts_ms < state.outputs.source_ts_ms {
            let stored = state.outputs.source_ts_ms;
            drop(state);
            return Err(IoSrvError::ClockError(format!(
                "output source timestamp went backwards: {} < {}",
                source_ts_ms, stored
            )));
        }

        state.outputs.value = value;
        state.outputs.source_ts_ms = source_ts_ms;
        state.outputs.server_ts_ms = now.max(source_ts_ms);
        Ok(())
    }

    /// One analog channel, or `None` while it has no valid sample
    ///
    /// `None` also covers an out-of-range channel and a timed-out lock
    /// wait; the protocol layer renders all three as "no value".
    pub fn get_adc(&self, channel: u8) -> Option<AdcSnapshot> {
        if usize::from(channel) >= NUM_ADC_CHANNELS {
            return None;
        }

        let state = self.state.try_lock_for(self.read_timeout)?;
        let entry = state.adc[usize::from(channel)];
        if !entry.valid {
            return None;
        }
        Some(AdcSnapshot {
            value: entry.value,
            source_ts_ms: entry.source_ts_ms,
            server_ts_ms: entry.server_ts_ms,
        })
    }

    /// Publish one analog channel and mark it valid
    pub fn update_adc(&self, channel: u8, value: u16, source_ts_ms: u64) -> Result<()> {
        if usize::from(channel) >= NUM_ADC_CHANNELS {
            return Err(IoSrvError::OutOfRange(format!(
                "ADC channel {} (valid: 0..{})",
                channel, NUM_ADC_CHANNELS
            )));
        }

        let now = self.clock.now_ms();
        let mut state = self.state.try_lock_for(self.write_timeout).ok_or_else(|| {
            warn!("ADC channel {} update dropped: cache wait budget exceeded", channel);
            IoSrvError::CacheTimeout(format!("ADC channel {} update", channel))
        })?;

        let entry = &mut state.adc[usize::from(channel)];
        if source_ts_ms < entry.source_ts_ms {
            let stored = entry.source_ts_ms;
            drop(state);
            return Err(IoSrvError::ClockError(format!(
                "ADC {} source timestamp went backwards: {} < {}",
                channel, source_ts_ms, stored
            )));
        }

        entry.value = value;
        entry.source_ts_ms = source_ts_ms;
        entry.server_ts_ms = now.max(source_ts_ms);
        entry.valid = true;
        Ok(())
    }

    /// Publish a whole ADC batch under one lock acquisition
    ///
    /// All four channels share the batch's source timestamp.
    pub fn update_all_adc(&self, values: [u16; NUM_ADC_CHANNELS], source_ts_ms: u64) -> Result<()> {
        let now = self.clock.now_ms();
        let mut state = self.state.try_lock_for(self.write_timeout).ok_or_else(|| {
            warn!("ADC batch update dropped: cache wait budget exceeded");
            IoSrvError::CacheTimeout("ADC batch update".into())
        })?;

        for channel in 0..NUM_ADC_CHANNELS {
            if source_ts_ms < state.adc[channel].source_ts_ms {
                let stored = state.adc[channel].source_ts_ms;
                drop(state);
                return Err(IoSrvError::ClockError(format!(
                    "ADC {} source timestamp went backwards: {} < {}",
                    channel, source_ts_ms, stored
                )));
            }
        }

        let server_ts_ms = now.max(source_ts_ms);
        for (channel, value) in values.iter().enumerate() {
            let entry = &mut state.adc[channel];
            entry.value = *value;
            entry.source_ts_ms = source_ts_ms;
            entry.server_ts_ms = server_ts_ms;
            entry.valid = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::FixedClock;

    const READ_TIMEOUT: Duration = Duration::from_millis(5);
    const WRITE_TIMEOUT: Duration = Duration::from_millis(20);

    fn cache_with_clock() -> (IoCache, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(1_000));
        let cache = IoCache::new(READ_TIMEOUT, WRITE_TIMEOUT, clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_fresh_cache_is_zeroed() {
        let (cache, _) = cache_with_clock();

        assert_eq!(cache.get_inputs(), WordSnapshot::default());
        assert_eq!(cache.get_outputs(), WordSnapshot::default());
        for channel in 0..NUM_ADC_CHANNELS as u8 {
            assert!(cache.get_adc(channel).is_none());
        }
    }

    #[test]
    fn test_update_sets_both_timestamps() {
        let (cache, clock) = cache_with_clock();

        clock.set(1_050);
        cache.update_inputs(0x00FF, 1_040).unwrap();

        let snap = cache.get_inputs();
        assert_eq!(snap.value, 0x00FF);
        assert_eq!(snap.source_ts_ms, 1_040);
        assert_eq!(snap.server_ts_ms, 1_050);
        assert!(snap.server_ts_ms >= snap.source_ts_ms);
    }

    #[test]
    fn test_server_timestamp_never_below_source() {
        let (cache, clock) = cache_with_clock();

        // Caller sampled "after" the clock we read internally
        clock.set(1_000);
        cache.update_outputs(0x0001, 1_005).unwrap();

        let snap = cache.get_outputs();
        assert_eq!(snap.source_ts_ms, 1_005);
        assert!(snap.server_ts_ms >= snap.source_ts_ms);
    }

    #[test]
    fn test_source_timestamp_regression_is_fatal() {
        let (cache, clock) = cache_with_clock();

        clock.set(2_000);
        cache.update_inputs(0x0001, 2_000).unwrap();

        let err = cache.update_inputs(0x0002, 1_999).unwrap_err();
        assert!(err.is_fatal());

        // The refused update left the entry untouched
        let snap = cache.get_inputs();
        assert_eq!(snap.value, 0x0001);
        assert_eq!(snap.source_ts_ms, 2_000);
    }

    #[test]
    fn test_adc_invalid_until_first_sample() {
        let (cache, clock) = cache_with_clock();

        assert!(cache.get_adc(1).is_none());

        clock.set(1_100);
        cache.update_adc(1, 2_048, 1_100).unwrap();

        let snap = cache.get_adc(1).unwrap();
        assert_eq!(snap.value, 2_048);
        assert_eq!(snap.source_ts_ms, 1_100);

        // Other channels stay invalid
        assert!(cache.get_adc(0).is_none());
        assert!(cache.get_adc(2).is_none());
    }

    #[test]
    fn test_adc_out_of_range() {
        let (cache, _) = cache_with_clock();

        assert!(cache.get_adc(4).is_none());
        assert!(matches!(
            cache.update_adc(4, 0, 1_000),
            Err(IoSrvError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_adc_batch_shares_source_timestamp() {
        let (cache, clock) = cache_with_clock();

        clock.set(1_200);
        cache.update_all_adc([10, 20, 30, 40], 1_195).unwrap();

        for channel in 0..NUM_ADC_CHANNELS as u8 {
            let snap = cache.get_adc(channel).unwrap();
            assert_eq!(snap.value, u16::from(channel + 1) * 10);
            assert_eq!(snap.source_ts_ms, 1_195);
            assert_eq!(snap.server_ts_ms, 1_200);
        }
    }

    #[test]
    fn test_read_during_held_lock_returns_zero_snapshot() {
        let (cache, clock) = cache_with_clock();
        clock.set(1_000);
        cache.update_inputs(0xBEEF, 1_000).unwrap();

        let guard = cache.state.lock();
        let snap = cache.get_inputs();
        drop(guard);

        assert_eq!(snap, WordSnapshot::default());

        // After release the stored triple is intact
        let snap = cache.get_inputs();
        assert_eq!(snap.value, 0xBEEF);
        assert_eq!(snap.source_ts_ms, 1_000);
    }

    #[test]
    fn test_write_during_held_lock_is_dropped() {
        let (cache, clock) = cache_with_clock();
        clock.set(1_000);
        cache.update_inputs(0x1111, 1_000).unwrap();

        let guard = cache.state.lock();
        let result = cache.update_inputs(0x2222, 1_050);
        drop(guard);

        assert!(matches!(result, Err(IoSrvError::CacheTimeout(_))));
        assert_eq!(cache.get_inputs().value, 0x1111);
    }

    #[test]
    fn test_snapshot_is_never_torn() {
        // Writer publishes words whose value equals the low bits of the
        // source timestamp; any torn read breaks that relation.
        let clock = Arc::new(FixedClock::new(0));
        let cache = Arc::new(IoCache::new(
            Duration::from_millis(100),
            Duration::from_millis(100),
            clock.clone(),
        ));

        let writer_cache = cache.clone();
        let writer_clock = clock.clone();
        let writer = std::thread::spawn(move || {
            for ts in 1..2_000u64 {
                writer_clock.set(ts);
                writer_cache
                    .update_inputs((ts & 0xFFFF) as u16, ts)
                    .unwrap();
            }
        });

        for _ in 0..2_000 {
            let snap = cache.get_inputs();
            assert_eq!(u64::from(snap.value), snap.source_ts_ms & 0xFFFF);
            assert!(snap.server_ts_ms >= snap.source_ts_ms);
        }

        writer.join().unwrap();
    }
}
