//! I/O Gateway Service Library
//!
//! Turns a 16-in/16-out/4-analog industrial I/O controller into the core
//! of an OPC UA server: a background polling loop keeps a thread-safe
//! cache of timestamped values fresh, and a variable adapter serves
//! protocol reads from the cache and routes protocol writes down to the
//! output bus. The protocol stack, network bring-up and vendor bus
//! drivers live outside this crate.

// Module declarations
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod server;

// Re-export commonly used types
pub use crate::config::IoSrvConfig;
pub use crate::core::adapter::{
    Access, DataValue, ValueStatus, Variant, VariableAdapter, VariableKind, WriteError,
};
pub use crate::core::hal::DeviceSet;
pub use crate::core::IoCore;
pub use crate::error::{IoSrvError, Result};

use tracing::error;

/// Wait for shutdown signal (Ctrl+C or SIGTERM on Unix)
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                error!(
                    "Failed to install SIGTERM handler: {}. Service will only respond to Ctrl+C",
                    e
                );
                None
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(mut sig) = term_signal {
                    sig.recv().await;
                } else {
                    std::future::pending::<()>().await
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
