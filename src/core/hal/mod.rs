//! Device abstraction layer
//!
//! The only place that knows about physical buses. The core consumes two
//! blocking trait seams, [`PortExpander`] for the quasi-bidirectional 8-bit
//! I2C expanders and [`AnalogReader`] for the ADC, and composes them into
//! an input side (discrete inputs + analog channels, owned by the polling
//! thread) and an output side (discrete outputs, used by bring-up and the
//! adapter write path). Vendor drivers implement the traits out of tree;
//! [`virt`] provides the in-memory backend used by tests and soak runs.
//!
//! All operations are blocking and may take a few milliseconds on real
//! hardware. They must never be called from the network-serving read path.

pub mod adc;
pub mod expander;
pub mod virt;

pub use adc::{AnalogInputs, ADC_MAX_CODE, NUM_ADC_CHANNELS};
pub use expander::{InputPair, OutputPair};

use tracing::{debug, info};

use crate::error::{IoSrvError, Result};

/// Bus-failure sentinel for discrete input reads
///
/// Indistinguishable in content from sixteen asserted inputs; the polling
/// scheduler discards sentinel cycles instead of publishing them.
pub const INPUT_SENTINEL: u16 = 0xFFFF;

/// Blocking access to one 8-bit quasi-bidirectional port expander
///
/// Bus polarity is active-low: a 0 bit on the wire means "signal present"
/// (input) or "relay energised" (output). The inversion to the logical
/// convention happens in [`InputPair`]/[`OutputPair`], never in drivers.
pub trait PortExpander: Send {
    /// Read the current port state (bus polarity)
    fn read(&mut self) -> Result<u8>;

    /// Drive the port (bus polarity)
    fn write(&mut self, bits: u8) -> Result<()>;
}

/// Blocking access to the analog-to-digital converter
///
/// `pin` is the electrical pin number, not the logical channel index; the
/// channel→pin lookup is owned by [`AnalogInputs`].
pub trait AnalogReader: Send {
    /// One-shot conversion: raw right-justified 12-bit code
    fn read_raw(&mut self, pin: u8) -> Result<u16>;
}

/// The full set of bus devices the core is constructed over
pub struct DeviceSet {
    /// Input expander 1 (low byte, channels 0-7)
    pub in_low: Box<dyn PortExpander>,
    /// Input expander 2 (high byte, channels 8-15)
    pub in_high: Box<dyn PortExpander>,
    /// Output expander 1 (low byte, channels 0-7)
    pub out_low: Box<dyn PortExpander>,
    /// Output expander 2 (high byte, channels 8-15)
    pub out_high: Box<dyn PortExpander>,
    /// ADC unit serving the four analog channels
    pub adc: Box<dyn AnalogReader>,
}

impl DeviceSet {
    /// Split into the two single-writer sides
    ///
    /// The input side moves into the polling thread; the output side goes
    /// behind the core's output mutex. This split is what makes the bus
    /// single-writer per path without a bus-level lock.
    pub fn split(self) -> (InputSide, OutputSide) {
        (
            InputSide {
                inputs: InputPair::new(self.in_low, self.in_high),
                analog: AnalogInputs::new(self.adc),
            },
            OutputSide {
                outputs: OutputPair::new(self.out_low, self.out_high),
            },
        )
    }
}

/// Input expanders and ADC, owned exclusively by the polling thread
pub struct InputSide {
    inputs: InputPair,
    analog: AnalogInputs,
}

impl InputSide {
    /// Read all 16 discrete inputs
    ///
    /// Returns the logical word (bit=1 means signal present) or
    /// [`INPUT_SENTINEL`] when any byte transaction failed.
    pub fn read_discrete_inputs(&mut self) -> u16 {
        match self.inputs.read_word() {
            Ok(word) => word,
            Err(e) => {
                debug!("Discrete input read failed: {}", e);
                INPUT_SENTINEL
            }
        }
    }

    /// Read all four analog channels sequentially
    ///
    /// Any channel failure fails the whole batch; the caller skips the
    /// cycle and retries at the next cadence.
    pub fn read_adc_batch(&mut self) -> Result<[u16; NUM_ADC_CHANNELS]> {
        self.analog.read_batch()
    }
}

/// Output expanders, used by bring-up and the adapter write path
pub struct OutputSide {
    outputs: OutputPair,
}

impl OutputSide {
    /// Write all 16 discrete outputs (bit=1 means relay energised)
    ///
    /// Per-byte failures are logged inside the pair; no retry is attempted
    /// and the cache is still updated by the caller so a later write can
    /// recover the bus.
    pub fn write_discrete_outputs(&mut self, word: u16) {
        if let Err(e) = self.outputs.write_word(word) {
            debug!("Discrete output write incomplete: {}", e);
        }
    }

    /// Drive every relay to the de-energised state
    ///
    /// Called exactly once at bring-up, before the polling scheduler or any
    /// protocol client can observe the outputs. Failure here is fatal.
    pub fn write_all_outputs_safe(&mut self) -> Result<()> {
        self.outputs.write_word(0x0000).map_err(|e| {
            IoSrvError::Fatal(format!("safe-state output write failed: {}", e))
        })?;
        info!("Outputs driven to safe state");
        Ok(())
    }
}
