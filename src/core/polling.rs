//! Polling scheduler
//!
//! One long-running OS thread refreshes the cache at deterministic
//! cadences: discrete inputs on a fast interval, the four-channel ADC
//! batch on a slower one, with a short yield between iterations. The
//! thread owns the input side of the bus outright, so input and ADC
//! transactions never contend with anything.
//!
//! The scheduler makes no retry promises: a sentinel read or a dropped
//! cache update skips that cycle and the next cadence tick tries again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info};

use super::cache::IoCache;
use super::hal::{InputSide, INPUT_SENTINEL};
use super::time::Clock;
use crate::config::PollingSettings;
use crate::error::{IoSrvError, Result};

/// Low-priority yield between loop iterations
const YIELD_MS: u64 = 5;

/// Cycle counters for the polling loop
#[derive(Debug, Default)]
pub struct PollStats {
    input_cycles: AtomicU64,
    adc_cycles: AtomicU64,
    bus_faults: AtomicU64,
    dropped_updates: AtomicU64,
}

/// Point-in-time copy of [`PollStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStatsSnapshot {
    pub input_cycles: u64,
    pub adc_cycles: u64,
    pub bus_faults: u64,
    pub dropped_updates: u64,
}

impl PollStats {
    pub fn snapshot(&self) -> PollStatsSnapshot {
        PollStatsSnapshot {
            input_cycles: self.input_cycles.load(Ordering::Relaxed),
            adc_cycles: self.adc_cycles.load(Ordering::Relaxed),
            bus_faults: self.bus_faults.load(Ordering::Relaxed),
            dropped_updates: self.dropped_updates.load(Ordering::Relaxed),
        }
    }
}

/// Handle to the background polling thread
pub struct PollingScheduler {
    stop: Arc<AtomicBool>,
    stats: Arc<PollStats>,
    handle: Option<JoinHandle<()>>,
}

impl PollingScheduler {
    /// Start the polling thread
    ///
    /// Consumes the input side; from here on only this thread touches the
    /// input expanders and the ADC.
    pub fn spawn(
        settings: PollingSettings,
        inputs: InputSide,
        cache: Arc<IoCache>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(PollStats::default());

        let thread_stop = stop.clone();
        let thread_stats = stats.clone();
        let handle = std::thread::Builder::new()
            .name("io-poll".into())
            .spawn(move || {
                poll_loop(settings, inputs, cache, clock, thread_stop, thread_stats);
            })
            .map_err(|e| IoSrvError::Fatal(format!("failed to spawn polling thread: {}", e)))?;

        Ok(Self {
            stop,
            stats,
            handle: Some(handle),
        })
    }

    /// Shared cycle counters
    pub fn stats(&self) -> Arc<PollStats> {
        self.stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Cooperative stop: the loop observes the flag at its next top
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Polling thread panicked");
            }
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn poll_loop(
    settings: PollingSettings,
    mut inputs: InputSide,
    cache: Arc<IoCache>,
    clock: Arc<dyn Clock>,
    stop: Arc<AtomicBool>,
    stats: Arc<PollStats>,
) {
    info!(
        "I/O polling started (inputs every {} ms, ADC batch every {} ms, core_id={:?})",
        settings.inputs_poll_ms, settings.adc_poll_ms, settings.core_id
    );

    let mut last_inputs: u64 = 0;
    let mut last_adc: u64 = 0;

    while !stop.load(Ordering::SeqCst) {
        let now = clock.now_ms();

        if now.saturating_sub(last_inputs) >= settings.inputs_poll_ms {
            let word = inputs.read_discrete_inputs();
            if word == INPUT_SENTINEL {
                // Bus fault: keep the last valid word in the cache
                stats.bus_faults.fetch_add(1, Ordering::Relaxed);
            } else {
                match cache.update_inputs(word, now) {
                    Ok(()) => {
                        stats.input_cycles.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) if e.is_fatal() => {
                        error!("Polling aborted: {}", e);
                        return;
                    }
                    Err(_) => {
                        stats.dropped_updates.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            last_inputs = now;
        }

        if now.saturating_sub(last_adc) >= settings.adc_poll_ms {
            // One timestamp for the whole batch
            match inputs.read_adc_batch() {
                Ok(values) => match cache.update_all_adc(values, now) {
                    Ok(()) => {
                        stats.adc_cycles.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) if e.is_fatal() => {
                        error!("Polling aborted: {}", e);
                        return;
                    }
                    Err(_) => {
                        stats.dropped_updates.fetch_add(1, Ordering::Relaxed);
                    }
                },
                Err(e) => {
                    debug!("ADC batch read failed, cycle skipped: {}", e);
                    stats.bus_faults.fetch_add(1, Ordering::Relaxed);
                }
            }
            last_adc = now;
        }

        std::thread::sleep(Duration::from_millis(YIELD_MS));
    }

    info!("I/O polling stopped");
}
