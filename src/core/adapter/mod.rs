//! Variable adapter
//!
//! Binds the I/O cache and the device layer to the protocol server's
//! variable registry. Each exposed variable is one entry in a static
//! table; the protocol stack dispatches reads and writes here by the
//! entry's [`VariableKind`]. Reads never touch hardware; output writes go
//! device-first, then mirror into the cache, and no cache lock is ever
//! held across a bus call.
//!
//! Failure policy: hardware trouble surfaces as value statuses on the
//! attribute, never as a session error.

pub mod value;

pub use value::{DataValue, ValueStatus, Variant, WriteError};

use std::sync::Arc;

use tracing::{debug, error};

use super::IoContext;

/// Access level of a protocol node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Capability variant behind a protocol node
///
/// The ADC arm carries its channel index; everything else is addressed by
/// the variant alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    InputWord,
    OutputWord,
    AdcChannel(u8),
    Counter,
    LoopbackIn,
    LoopbackOut,
}

/// One row of the protocol-facing variable table
#[derive(Debug, Clone, Copy)]
pub struct VariableDef {
    /// Stable string node id
    pub node_id: &'static str,
    pub browse_name: &'static str,
    pub description: &'static str,
    pub access: Access,
    pub kind: VariableKind,
}

/// The complete variable surface, in registration order
pub const VARIABLES: [VariableDef; 9] = [
    VariableDef {
        node_id: "discrete_inputs",
        browse_name: "Discrete Inputs",
        description: "16 discrete inputs with caching",
        access: Access::ReadOnly,
        kind: VariableKind::InputWord,
    },
    VariableDef {
        node_id: "discrete_outputs",
        browse_name: "Discrete Outputs",
        description: "16 discrete outputs with caching",
        access: Access::ReadWrite,
        kind: VariableKind::OutputWord,
    },
    VariableDef {
        node_id: "adc_channel_1",
        browse_name: "ADC1",
        description: "Analog input 1 - raw ADC code",
        access: Access::ReadOnly,
        kind: VariableKind::AdcChannel(0),
    },
    VariableDef {
        node_id: "adc_channel_2",
        browse_name: "ADC2",
        description: "Analog input 2 - raw ADC code",
        access: Access::ReadOnly,
        kind: VariableKind::AdcChannel(1),
    },
    VariableDef {
        node_id: "adc_channel_3",
        browse_name: "ADC3",
        description: "Analog input 3 - raw ADC code",
        access: Access::ReadOnly,
        kind: VariableKind::AdcChannel(2),
    },
    VariableDef {
        node_id: "adc_channel_4",
        browse_name: "ADC4",
        description: "Analog input 4 - raw ADC code",
        access: Access::ReadOnly,
        kind: VariableKind::AdcChannel(3),
    },
    VariableDef {
        node_id: "diagnostic_counter",
        browse_name: "Diagnostic Counter",
        description: "Increments on every read",
        access: Access::ReadOnly,
        kind: VariableKind::Counter,
    },
    VariableDef {
        node_id: "loopback_input",
        browse_name: "Loopback Input",
        description: "Written word mirrors to loopback output",
        access: Access::ReadWrite,
        kind: VariableKind::LoopbackIn,
    },
    VariableDef {
        node_id: "loopback_output",
        browse_name: "Loopback Output",
        description: "Mirror of the last loopback write",
        access: Access::ReadOnly,
        kind: VariableKind::LoopbackOut,
    },
];

/// Find a table row by its node id
pub fn lookup(node_id: &str) -> Option<&'static VariableDef> {
    VARIABLES.iter().find(|def| def.node_id == node_id)
}

/// Read/write entry points the protocol stack binds its callbacks to
#[derive(Clone)]
pub struct VariableAdapter {
    ctx: Arc<IoContext>,
}

impl VariableAdapter {
    pub(crate) fn new(ctx: Arc<IoContext>) -> Self {
        Self { ctx }
    }

    /// Serve a read from the cache (or the diagnostic state)
    ///
    /// Never blocks on hardware; the only wait is the cache's bounded
    /// read acquisition.
    pub fn read(&self, kind: VariableKind, want_source_time: bool) -> DataValue {
        match kind {
            VariableKind::InputWord => {
                let snap = self.ctx.cache.get_inputs();
                DataValue::good(
                    Variant::UInt16(snap.value),
                    wire_source_time(want_source_time, snap.source_ts_ms),
                )
            }
            VariableKind::OutputWord => {
                let snap = self.ctx.cache.get_outputs();
                DataValue::good(
                    Variant::UInt16(snap.value),
                    wire_source_time(want_source_time, snap.source_ts_ms),
                )
            }
            VariableKind::AdcChannel(channel) => match self.ctx.cache.get_adc(channel) {
                Some(snap) => DataValue::good(
                    Variant::UInt16(snap.value),
                    wire_source_time(want_source_time, snap.source_ts_ms),
                ),
                None if usize::from(channel) >= super::hal::NUM_ADC_CHANNELS => {
                    DataValue::bad(ValueStatus::OutOfRange)
                }
                None => DataValue::bad(ValueStatus::NoValueYet),
            },
            VariableKind::Counter => {
                let value = self.ctx.diagnostics.bump_counter();
                DataValue::good(Variant::UInt16(value), Some(self.wire_now()))
            }
            VariableKind::LoopbackIn => DataValue::good(
                Variant::UInt16(self.ctx.diagnostics.loopback_input()),
                Some(self.wire_now()),
            ),
            VariableKind::LoopbackOut => DataValue::good(
                Variant::UInt16(self.ctx.diagnostics.loopback_output()),
                Some(self.wire_now()),
            ),
        }
    }

    /// Apply a protocol write
    ///
    /// A payload that is not a 16-bit unsigned scalar is rejected before
    /// any side effect. Output writes may block for a few milliseconds in
    /// the device layer; the rate is client-driven and low.
    pub fn write(&self, kind: VariableKind, value: &Variant) -> Result<(), WriteError> {
        match kind {
            VariableKind::OutputWord => {
                let word = value.as_u16().ok_or(WriteError::TypeMismatch)?;

                // Device first; the cache lock is only taken afterwards,
                // for the brief mirror update.
                self.ctx.outputs.lock().write_discrete_outputs(word);

                let now = self.ctx.clock.now_ms();
                if let Err(e) = self.ctx.cache.update_outputs(word, now) {
                    if e.is_fatal() {
                        error!("Output mirror update refused: {}", e);
                    } else {
                        debug!("Output mirror update dropped: {}", e);
                    }
                }
                Ok(())
            }
            VariableKind::LoopbackIn => {
                let word = value.as_u16().ok_or(WriteError::TypeMismatch)?;
                self.ctx.diagnostics.write_loopback(word);
                Ok(())
            }
            VariableKind::InputWord
            | VariableKind::AdcChannel(_)
            | VariableKind::Counter
            | VariableKind::LoopbackOut => Err(WriteError::NotWritable),
        }
    }

    fn wire_now(&self) -> i64 {
        (self.ctx.clock.now_ms() / 1_000) as i64
    }
}

/// Monotonic milliseconds to protocol-epoch seconds
///
/// Sub-second precision is lost on the wire; a zero stored timestamp means
/// "no sample yet" and attaches nothing.
fn wire_source_time(want: bool, source_ts_ms: u64) -> Option<i64> {
    (want && source_ts_ms > 0).then(|| (source_ts_ms / 1_000) as i64)
}
