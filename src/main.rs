use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use iosrv::core::adapter::{Variant, VariableKind, VARIABLES};
use iosrv::core::hal::virt::VirtBackend;
use iosrv::{logging, server, wait_for_shutdown, IoCore, IoSrvConfig};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[clap(short, long, value_parser, default_value = "config/iosrv.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match IoSrvConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            eprintln!("Using default configuration");
            IoSrvConfig::default()
        }
    };

    logging::init(&config.logging.level);

    info!("Starting I/O gateway service");
    info!(
        "Protocol endpoint {} ({}, {})",
        server::endpoint_url(config.server.port),
        server::APPLICATION_URI,
        server::APPLICATION_NAME
    );

    // Virtual bus backend so the service soaks without hardware; real
    // deployments hand `IoCore::start` trait objects over the vendor
    // drivers instead.
    let backend = VirtBackend::new();
    let core = IoCore::start(config, backend.device_set())?;
    let adapter = core.adapter();

    for def in &VARIABLES {
        info!(
            "Registered variable '{}' ({:?}, {:?})",
            def.node_id, def.kind, def.access
        );
    }
    info!("Variable adapter ready for protocol binding");

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                log_status(&core, &adapter);
            }
        }
    }

    core.shutdown();
    info!("Shutdown complete");
    Ok(())
}

fn log_status(core: &IoCore, adapter: &iosrv::VariableAdapter) {
    let word = |kind| match adapter.read(kind, false).value {
        Some(Variant::UInt16(v)) => v,
        _ => 0,
    };

    let stats = core.poll_stats();
    info!(
        "Status: inputs=0x{:04X} outputs=0x{:04X} cycles(inputs={}, adc={}) bus_faults={} dropped={}",
        word(VariableKind::InputWord),
        word(VariableKind::OutputWord),
        stats.input_cycles,
        stats.adc_cycles,
        stats.bus_faults,
        stats.dropped_updates,
    );
}
