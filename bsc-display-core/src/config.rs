//! Receive path configuration
//!
//! Stored in flash as postcard-serialized binary data when the `serde`
//! feature is enabled. Telemetry itself is never persisted.

use bsc_display_hal::BusConfig;
use bsc_display_protocol::MAX_FRAME_SIZE;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::queue::OverflowPolicy;
use crate::rx::RX_BUFFER_SIZE;

/// Default renderer poll interval
pub const DEFAULT_RENDER_INTERVAL_MS: u32 = 5;

/// Default age after which a slot's data is considered stale
pub const DEFAULT_STALE_AFTER_MS: u32 = 10_000;

/// Default time without a completed batch before the link is reported down
pub const DEFAULT_BATCH_TIMEOUT_MS: u32 = 30_000;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Bus address outside the 7-bit non-reserved range
    InvalidAddress(u8),
    /// Bus frequency not one of the standard modes
    UnsupportedFrequency(u32),
    /// Receive buffer cannot hold the largest frame, or exceeds the maximum
    RxBufferLen(usize),
    /// Render interval is zero
    RenderInterval,
    /// Stale threshold not above the render interval
    StaleThreshold,
    /// Batch timeout not above the render interval
    BatchTimeout,
    /// Serialized config does not fit the buffer
    Serialize,
    /// Stored bytes are not a valid config
    Deserialize,
}

/// Complete receive path configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TelemetryConfig {
    /// Bus target settings
    pub bus: BusConfig,
    /// Bytes retained per transaction
    pub rx_buffer_len: usize,
    /// Decode the retained prefix of overflowed transactions
    pub decode_overflowed: bool,
    /// Frame queue overflow handling
    pub queue_policy: OverflowPolicy,
    /// Renderer poll interval (ms), paced by `LinkMonitor::render_due`
    pub render_interval_ms: u32,
    /// Slot data older than this is stale (ms)
    pub stale_after_ms: u32,
    /// Link is down after this long without a batch (ms)
    pub batch_timeout_ms: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            rx_buffer_len: RX_BUFFER_SIZE,
            decode_overflowed: false,
            queue_policy: OverflowPolicy::default(),
            render_interval_ms: DEFAULT_RENDER_INTERVAL_MS,
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
            batch_timeout_ms: DEFAULT_BATCH_TIMEOUT_MS,
        }
    }
}

impl TelemetryConfig {
    /// Check every value is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.bus.is_valid_address() {
            return Err(ConfigError::InvalidAddress(self.bus.address));
        }
        if !self.bus.is_supported_frequency() {
            return Err(ConfigError::UnsupportedFrequency(self.bus.frequency));
        }
        if !(MAX_FRAME_SIZE..=RX_BUFFER_SIZE).contains(&self.rx_buffer_len) {
            return Err(ConfigError::RxBufferLen(self.rx_buffer_len));
        }
        if self.render_interval_ms == 0 {
            return Err(ConfigError::RenderInterval);
        }
        if self.stale_after_ms <= self.render_interval_ms {
            return Err(ConfigError::StaleThreshold);
        }
        if self.batch_timeout_ms <= self.render_interval_ms {
            return Err(ConfigError::BatchTimeout);
        }
        Ok(())
    }

    /// Serialize into `buffer`, returning the used prefix
    #[cfg(feature = "serde")]
    pub fn to_bytes<'a>(&self, buffer: &'a mut [u8]) -> Result<&'a mut [u8], ConfigError> {
        postcard::to_slice(self, buffer).map_err(|_| ConfigError::Serialize)
    }

    /// Deserialize and validate a stored config
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;
        config.validate()?;
        Ok(config)
    }
}
