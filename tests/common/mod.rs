//! Shared harness for integration tests
//!
//! Runs the full core over the virtual bus backend. The fast profile
//! shortens the polling cadences to the configured minimums so the suites
//! finish quickly without weakening any semantics.

use iosrv::core::hal::virt::VirtBackend;
use iosrv::{IoCore, IoSrvConfig};

pub struct Harness {
    pub backend: VirtBackend,
    pub core: IoCore,
}

impl Harness {
    /// Start a core over a fresh virtual backend
    pub fn start(config: IoSrvConfig) -> Self {
        let backend = VirtBackend::new();
        let core = IoCore::start(config, backend.device_set()).expect("core start failed");
        Self { backend, core }
    }

    /// Start with the fastest legal cadences (5 ms inputs, 20 ms ADC)
    pub fn start_fast() -> Self {
        Self::start(fast_config())
    }
}

pub fn fast_config() -> IoSrvConfig {
    let mut config = IoSrvConfig::default();
    config.polling.inputs_poll_ms = 5;
    config.polling.adc_poll_ms = 20;
    config
}
