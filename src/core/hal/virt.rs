//! Virtual bus devices
//!
//! In-memory implementations of the HAL traits for integration tests and
//! soak runs without hardware. Each virtual device is a cheap cloneable
//! handle; the test (or the binary) keeps one end to set input bits, inject
//! bus faults and observe written bytes, while the device end moves into
//! the core as a boxed trait object.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AnalogReader, PortExpander};
use crate::error::{IoSrvError, Result};

#[derive(Debug)]
struct PortState {
    bits: AtomicU8,
    faulted: AtomicBool,
}

/// Handle to one virtual 8-bit expander port
///
/// `bits` holds the bus-level byte (active-low polarity, idle high).
#[derive(Clone, Debug)]
pub struct VirtPort {
    state: Arc<PortState>,
}

impl VirtPort {
    /// New port with the given bus-level byte (0xFF = electrically idle)
    pub fn new(bits: u8) -> Self {
        Self {
            state: Arc::new(PortState {
                bits: AtomicU8::new(bits),
                faulted: AtomicBool::new(false),
            }),
        }
    }

    /// Set the bus-level byte (what a read will observe)
    pub fn set_bits(&self, bits: u8) {
        self.state.bits.store(bits, Ordering::SeqCst);
    }

    /// Current bus-level byte (what a write last drove, or set_bits set)
    pub fn bits(&self) -> u8 {
        self.state.bits.load(Ordering::SeqCst)
    }

    /// Make every transaction on this port fail until cleared
    pub fn set_faulted(&self, faulted: bool) {
        self.state.faulted.store(faulted, Ordering::SeqCst);
    }

    /// Device-side endpoint implementing [`PortExpander`]
    pub fn expander(&self) -> VirtExpander {
        VirtExpander {
            state: self.state.clone(),
        }
    }
}

/// Device end of a [`VirtPort`]
pub struct VirtExpander {
    state: Arc<PortState>,
}

impl PortExpander for VirtExpander {
    fn read(&mut self) -> Result<u8> {
        if self.state.faulted.load(Ordering::SeqCst) {
            return Err(IoSrvError::BusError("virtual expander fault".into()));
        }
        Ok(self.state.bits.load(Ordering::SeqCst))
    }

    fn write(&mut self, bits: u8) -> Result<()> {
        if self.state.faulted.load(Ordering::SeqCst) {
            return Err(IoSrvError::BusError("virtual expander fault".into()));
        }
        self.state.bits.store(bits, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AdcState {
    codes: Mutex<HashMap<u8, u16>>,
    faulted: AtomicBool,
}

/// Handle to a virtual ADC unit
///
/// Unset pins convert to 0; codes are stored per electrical pin.
#[derive(Clone, Debug, Default)]
pub struct VirtAdc {
    state: Arc<AdcState>,
}

impl VirtAdc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw code a pin converts to
    pub fn set_code(&self, pin: u8, code: u16) {
        self.state.codes.lock().insert(pin, code);
    }

    /// Make every conversion fail until cleared
    pub fn set_faulted(&self, faulted: bool) {
        self.state.faulted.store(faulted, Ordering::SeqCst);
    }

    /// Device-side endpoint implementing [`AnalogReader`]
    pub fn reader(&self) -> VirtAnalogReader {
        VirtAnalogReader {
            state: self.state.clone(),
        }
    }
}

/// Device end of a [`VirtAdc`]
pub struct VirtAnalogReader {
    state: Arc<AdcState>,
}

impl AnalogReader for VirtAnalogReader {
    fn read_raw(&mut self, pin: u8) -> Result<u16> {
        if self.state.faulted.load(Ordering::SeqCst) {
            return Err(IoSrvError::BusError("virtual ADC fault".into()));
        }
        Ok(self.state.codes.lock().get(&pin).copied().unwrap_or(0))
    }
}

/// A complete virtual controller: four expander ports plus the ADC
///
/// Input ports start electrically idle (0xFF on the bus, 0x0000 at the
/// boundary); output ports start de-energised.
#[derive(Clone, Debug)]
pub struct VirtBackend {
    pub in_low: VirtPort,
    pub in_high: VirtPort,
    pub out_low: VirtPort,
    pub out_high: VirtPort,
    pub adc: VirtAdc,
}

impl VirtBackend {
    pub fn new() -> Self {
        Self {
            in_low: VirtPort::new(0xFF),
            in_high: VirtPort::new(0xFF),
            out_low: VirtPort::new(0xFF),
            out_high: VirtPort::new(0xFF),
            adc: VirtAdc::new(),
        }
    }

    /// Device set over this backend, for [`IoCore::start`]
    ///
    /// [`IoCore::start`]: crate::core::IoCore::start
    pub fn device_set(&self) -> super::DeviceSet {
        super::DeviceSet {
            in_low: Box::new(self.in_low.expander()),
            in_high: Box::new(self.in_high.expander()),
            out_low: Box::new(self.out_low.expander()),
            out_high: Box::new(self.out_high.expander()),
            adc: Box::new(self.adc.reader()),
        }
    }

    /// Drive the 16 input channels from a logical word (bit=1 = asserted)
    pub fn set_input_word(&self, word: u16) {
        self.in_low.set_bits(!(word & 0x00FF) as u8);
        self.in_high.set_bits(!((word >> 8) & 0x00FF) as u8);
    }

    /// Decode the last written output bytes back to the logical word
    pub fn output_word(&self) -> u16 {
        u16::from(!self.out_high.bits()) << 8 | u16::from(!self.out_low.bits())
    }

    /// Fault or recover both input expanders at once
    pub fn fail_inputs(&self, faulted: bool) {
        self.in_low.set_faulted(faulted);
        self.in_high.set_faulted(faulted);
    }
}

impl Default for VirtBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_word_round_trip() {
        let backend = VirtBackend::new();

        backend.set_input_word(0xA5C3);
        assert_eq!(backend.in_low.bits(), !0xC3u8);
        assert_eq!(backend.in_high.bits(), !0xA5u8);
    }

    #[test]
    fn test_output_word_decoding() {
        let backend = VirtBackend::new();

        // Nothing written yet: bus idle decodes to all de-energised
        assert_eq!(backend.output_word(), 0x0000);

        backend.out_low.set_bits(0xF7);
        assert_eq!(backend.output_word(), 0x0008);
    }

    #[test]
    fn test_fault_injection() {
        let backend = VirtBackend::new();
        let mut expander = backend.in_low.expander();

        assert!(expander.read().is_ok());
        backend.fail_inputs(true);
        assert!(expander.read().is_err());
        backend.fail_inputs(false);
        assert!(expander.read().is_ok());
    }
}
