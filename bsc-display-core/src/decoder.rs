//! Frame decoder
//!
//! Turns one received transaction into one field write against the store.
//! Malformed frames are dropped whole; nothing is ever partially applied.
//! There is no error channel back to the controller, so every drop is
//! counted in [`DecodeStats`] for the renderer or a debug probe to inspect.

use portable_atomic::{AtomicU32, Ordering};

use bsc_display_protocol::{FieldWrite, FrameError, Selector};

use crate::signal::UpdateReady;
use crate::store::{SlotOutOfRange, TelemetryStore, DEVICE_COUNT};

/// Why a frame was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Header or payload did not parse
    Frame(FrameError),
    /// BMS frame addressed a slot the store does not have
    SlotOutOfRange { slot: u8, capacity: usize },
}

impl From<FrameError> for DecodeError {
    fn from(e: FrameError) -> Self {
        DecodeError::Frame(e)
    }
}

impl From<SlotOutOfRange> for DecodeError {
    fn from(e: SlotOutOfRange) -> Self {
        DecodeError::SlotOutOfRange {
            slot: e.slot,
            capacity: e.capacity,
        }
    }
}

/// Frame counters, shared between the receive path and readers
#[derive(Debug, Default)]
pub struct DecodeStats {
    accepted: AtomicU32,
    batches: AtomicU32,
    too_short: AtomicU32,
    unknown_category: AtomicU32,
    unknown_field: AtomicU32,
    truncated: AtomicU32,
    slot_out_of_range: AtomicU32,
}

/// Point-in-time copy of [`DecodeStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodeCounts {
    /// Frames applied to the store
    pub accepted: u32,
    /// Batch marker frames among the accepted ones
    pub batches: u32,
    pub too_short: u32,
    pub unknown_category: u32,
    pub unknown_field: u32,
    pub truncated: u32,
    pub slot_out_of_range: u32,
}

impl DecodeCounts {
    /// Frames dropped for any reason
    pub fn malformed(&self) -> u32 {
        self.too_short
            .wrapping_add(self.unknown_category)
            .wrapping_add(self.unknown_field)
            .wrapping_add(self.truncated)
            .wrapping_add(self.slot_out_of_range)
    }
}

impl DecodeStats {
    pub const fn new() -> Self {
        Self {
            accepted: AtomicU32::new(0),
            batches: AtomicU32::new(0),
            too_short: AtomicU32::new(0),
            unknown_category: AtomicU32::new(0),
            unknown_field: AtomicU32::new(0),
            truncated: AtomicU32::new(0),
            slot_out_of_range: AtomicU32::new(0),
        }
    }

    fn record_drop(&self, error: &DecodeError) {
        let counter = match error {
            DecodeError::Frame(FrameError::TooShort) => &self.too_short,
            DecodeError::Frame(FrameError::UnknownCategory(_)) => &self.unknown_category,
            DecodeError::Frame(FrameError::UnknownField { .. }) => &self.unknown_field,
            DecodeError::Frame(FrameError::Truncated { .. })
            | DecodeError::Frame(FrameError::BufferTooSmall) => &self.truncated,
            DecodeError::SlotOutOfRange { .. } => &self.slot_out_of_range,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self) -> DecodeCounts {
        DecodeCounts {
            accepted: self.accepted.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            too_short: self.too_short.load(Ordering::Relaxed),
            unknown_category: self.unknown_category.load(Ordering::Relaxed),
            unknown_field: self.unknown_field.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            slot_out_of_range: self.slot_out_of_range.load(Ordering::Relaxed),
        }
    }
}

/// Applies received frames to a [`TelemetryStore`]
///
/// Holds references only; `decode` takes `&self`, so the decoder itself can
/// be shared with whoever reads its counters.
pub struct Decoder<'a, const N: usize = DEVICE_COUNT> {
    store: &'a TelemetryStore<N>,
    ready: &'a UpdateReady,
    stats: DecodeStats,
}

impl<'a, const N: usize> Decoder<'a, N> {
    pub const fn new(store: &'a TelemetryStore<N>, ready: &'a UpdateReady) -> Self {
        Self {
            store,
            ready,
            stats: DecodeStats::new(),
        }
    }

    /// Decode one transaction and apply it
    ///
    /// `now_ms` is the monotonic receive time, stored as the slot's update
    /// time on BMS writes. Returns the field that was written.
    pub fn decode(&self, bytes: &[u8], now_ms: u64) -> Result<Selector, DecodeError> {
        match self.apply(bytes, now_ms) {
            Ok(selector) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "defmt")]
                defmt::trace!("frame applied: {:?}", selector);
                Ok(selector)
            }
            Err(e) => {
                self.stats.record_drop(&e);
                #[cfg(feature = "defmt")]
                defmt::debug!("frame dropped ({} bytes): {:?}", bytes.len(), e);
                Err(e)
            }
        }
    }

    fn apply(&self, bytes: &[u8], now_ms: u64) -> Result<Selector, DecodeError> {
        let write = FieldWrite::parse(bytes)?;
        self.store.apply(&write, now_ms)?;

        let selector = write.selector();
        // Field first, then the flag: a renderer that sees the flag sees the field
        if selector.is_batch_marker() {
            self.stats.batches.fetch_add(1, Ordering::Relaxed);
            self.ready.signal_ready();
        }
        Ok(selector)
    }

    pub fn stats(&self) -> DecodeCounts {
        self.stats.counts()
    }

    pub fn store(&self) -> &'a TelemetryStore<N> {
        self.store
    }
}
