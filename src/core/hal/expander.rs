//! 16-bit word composition over paired port expanders
//!
//! Two 8-bit expanders make one 16-bit direction: expander 1 is the low
//! byte, expander 2 the high byte. The expanders are wired active-low, so
//! both directions invert every byte; at the cache and protocol boundary
//! bit=1 always means "signal present" / "relay energised".

use tracing::debug;

use super::PortExpander;
use crate::error::Result;

/// Paired input expanders composing the 16 discrete inputs
pub struct InputPair {
    low: Box<dyn PortExpander>,
    high: Box<dyn PortExpander>,
}

impl InputPair {
    pub fn new(low: Box<dyn PortExpander>, high: Box<dyn PortExpander>) -> Self {
        Self { low, high }
    }

    /// Read and invert both bytes, expander 1 in the low byte
    ///
    /// Fails as a whole if either transaction fails; partial words are
    /// never produced.
    pub fn read_word(&mut self) -> Result<u16> {
        let low = self.low.read()?;
        let high = self.high.read()?;

        // Bus: 0 = signal present. Logical: 1 = signal present.
        Ok(u16::from(!high) << 8 | u16::from(!low))
    }
}

/// Paired output expanders composing the 16 discrete outputs
pub struct OutputPair {
    low: Box<dyn PortExpander>,
    high: Box<dyn PortExpander>,
}

impl OutputPair {
    pub fn new(low: Box<dyn PortExpander>, high: Box<dyn PortExpander>) -> Self {
        Self { low, high }
    }

    /// Split, invert and write both bytes
    ///
    /// Both bytes are always attempted; a failed byte is logged and the
    /// first failure is returned after the second attempt. No retry.
    pub fn write_word(&mut self, word: u16) -> Result<()> {
        // Logical: 1 = energise. Bus: 0 = energise.
        let low = !(word & 0x00FF) as u8;
        let high = !((word >> 8) & 0x00FF) as u8;

        let mut first_err = None;

        if let Err(e) = self.low.write(low) {
            debug!("Output expander 1 write failed: {}", e);
            first_err = Some(e);
        }
        if let Err(e) = self.high.write(high) {
            debug!("Output expander 2 write failed: {}", e);
            first_err.get_or_insert(e);
        }

        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}
