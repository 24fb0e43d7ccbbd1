//! I2C target abstractions
//!
//! The controller is the bus master; the display answers at a fixed 7-bit
//! address and receives write transactions.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default 7-bit target address of the display on the controller bus
pub const DEFAULT_TARGET_ADDRESS: u8 = 0x55;

/// I2C target receiving write transactions from the controller
///
/// Implementations hand out the bytes of the transaction currently being
/// received, one at a time, the way a peripheral FIFO drains.
pub trait BusTarget {
    /// Error type for receive operations
    type Error;

    /// Read the next byte of the current write transaction
    ///
    /// Returns `Ok(None)` once the transaction has been fully drained.
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error>;
}

impl<T: BusTarget + ?Sized> BusTarget for &mut T {
    type Error = T::Error;

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        (**self).read_byte()
    }
}

/// I2C target configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BusConfig {
    /// 7-bit address the display listens on
    pub address: u8,
    /// Clock frequency in Hz
    pub frequency: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_TARGET_ADDRESS,
            frequency: 1_000_000,
        }
    }
}

impl BusConfig {
    /// Standard mode (100 kHz)
    pub const STANDARD: u32 = 100_000;

    /// Fast mode (400 kHz)
    pub const FAST: u32 = 400_000;

    /// Fast mode plus (1 MHz), what the controller drives by default
    pub const FAST_PLUS: u32 = 1_000_000;

    /// Check that the address fits in 7 bits and is not a reserved address
    pub fn is_valid_address(&self) -> bool {
        (0x08..=0x77).contains(&self.address)
    }

    /// Check that the frequency is one of the supported bus speeds
    pub fn is_supported_frequency(&self) -> bool {
        matches!(
            self.frequency,
            Self::STANDARD | Self::FAST | Self::FAST_PLUS
        )
    }
}
