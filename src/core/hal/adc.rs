//! Analog input channels
//!
//! Four logical channels over one ADC unit. The channel→pin lookup table is
//! owned here; callers use indices 0..3 only and never see electrical pin
//! numbers.

use super::AnalogReader;
use crate::error::{IoSrvError, Result};

/// Number of analog input channels
pub const NUM_ADC_CHANNELS: usize = 4;

/// Largest raw code the 12-bit converter can produce
pub const ADC_MAX_CODE: u16 = 4095;

/// Channel index → electrical pin, fixed by the controller's wiring
const ADC_PIN_MAP: [u8; NUM_ADC_CHANNELS] = [4, 6, 7, 5];

/// The four analog channels, owned by the polling thread
pub struct AnalogInputs {
    reader: Box<dyn AnalogReader>,
}

impl AnalogInputs {
    pub fn new(reader: Box<dyn AnalogReader>) -> Self {
        Self { reader }
    }

    /// Read one channel, clamped to the 12-bit range
    pub fn read_channel(&mut self, channel: u8) -> Result<u16> {
        let pin = ADC_PIN_MAP
            .get(usize::from(channel))
            .copied()
            .ok_or_else(|| {
                IoSrvError::OutOfRange(format!("ADC channel {} (valid: 0..{})", channel, NUM_ADC_CHANNELS))
            })?;

        let raw = self.reader.read_raw(pin)?;
        Ok(raw.min(ADC_MAX_CODE))
    }

    /// Read all channels sequentially into one batch
    ///
    /// The caller captures a single timestamp for the whole batch; any
    /// channel failure fails the batch.
    pub fn read_batch(&mut self) -> Result<[u16; NUM_ADC_CHANNELS]> {
        let mut values = [0u16; NUM_ADC_CHANNELS];
        for (channel, slot) in values.iter_mut().enumerate() {
            *slot = self.read_channel(channel as u8)?;
        }
        Ok(values)
    }
}
