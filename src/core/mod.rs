//! The I/O core
//!
//! Owns the cache, the clock, the diagnostic state and the output side of
//! the bus, and runs the polling scheduler over the input side. One
//! context value is constructed at start-up and shared by reference; there
//! are no module-level singletons.

pub mod adapter;
pub mod cache;
pub mod diagnostics;
pub mod hal;
pub mod polling;
pub mod time;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::config::IoSrvConfig;
use crate::error::Result;

use adapter::VariableAdapter;
use cache::IoCache;
use diagnostics::Diagnostics;
use hal::{DeviceSet, OutputSide};
use polling::{PollStatsSnapshot, PollingScheduler};
use time::{Clock, MonotonicClock};

/// Shared state behind the adapter, scheduler and diagnostic paths
pub(crate) struct IoContext {
    pub(crate) cache: Arc<IoCache>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) outputs: Mutex<OutputSide>,
}

/// Running core: cache, diagnostics and the polling thread
pub struct IoCore {
    ctx: Arc<IoContext>,
    scheduler: Option<PollingScheduler>,
}

impl std::fmt::Debug for IoCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoCore").finish_non_exhaustive()
    }
}

impl IoCore {
    /// Bring the core up over the given bus devices
    ///
    /// Validates the configuration, drives every relay to the safe state,
    /// creates the zeroed cache and starts the polling thread. Any failure
    /// here is fatal and nothing keeps running.
    pub fn start(config: IoSrvConfig, devices: DeviceSet) -> Result<Self> {
        Self::start_with_clock(config, devices, Arc::new(MonotonicClock::new()))
    }

    /// [`start`](Self::start) with an injected clock, for deterministic tests
    pub fn start_with_clock(
        config: IoSrvConfig,
        devices: DeviceSet,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let (input_side, mut output_side) = devices.split();

        // Relays first: the safe state must be on the bus before any
        // client or poll cycle can run.
        output_side.write_all_outputs_safe()?;

        let cache = Arc::new(IoCache::new(
            config.cache.read_timeout(),
            config.cache.write_timeout(),
            clock.clone(),
        ));

        let scheduler = PollingScheduler::spawn(
            config.polling.clone(),
            input_side,
            cache.clone(),
            clock.clone(),
        )?;

        let ctx = Arc::new(IoContext {
            cache,
            clock,
            diagnostics: Diagnostics::new(),
            outputs: Mutex::new(output_side),
        });

        info!("I/O core started");
        Ok(Self {
            ctx,
            scheduler: Some(scheduler),
        })
    }

    /// Adapter bound to this core's context
    pub fn adapter(&self) -> VariableAdapter {
        VariableAdapter::new(self.ctx.clone())
    }

    /// Direct cache handle (integration tests, staleness checks)
    pub fn cache(&self) -> Arc<IoCache> {
        self.ctx.cache.clone()
    }

    pub fn poll_stats(&self) -> PollStatsSnapshot {
        self.scheduler
            .as_ref()
            .map(|s| s.stats().snapshot())
            .unwrap_or_default()
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.as_ref().map(|s| s.is_running()).unwrap_or(false)
    }

    /// Cooperative shutdown: stop the polling thread and join it
    ///
    /// Adapter callbacks still in flight run to completion; the protocol
    /// server tears itself down separately.
    pub fn shutdown(mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }
        info!("I/O core stopped");
    }
}
