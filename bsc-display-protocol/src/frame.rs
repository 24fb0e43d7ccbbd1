//! Frame header parsing
//!
//! Frame format:
//! - CATEGORY (1 byte): BMS, inverter or controller
//! - SELECTOR (1 byte): field within the category
//! - SLOT (1 byte, BMS only): device slot the field belongs to
//! - PAYLOAD: exactly the field's width, little-endian
//!
//! A received transaction may be longer than the frame it carries; trailing
//! bytes are ignored. It may never be shorter.

use crate::fields::{BmsField, Category, Selector};

/// Shortest transaction that can be a frame
pub const MIN_FRAME_LEN: usize = 4;

/// Widest payload (24 cell voltages)
pub const MAX_PAYLOAD_SIZE: usize = BmsField::CellVoltages.width();

/// Longest frame (BMS header + cell voltages)
pub const MAX_FRAME_SIZE: usize = 3 + MAX_PAYLOAD_SIZE;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Fewer than [`MIN_FRAME_LEN`] bytes
    TooShort,
    /// Category byte not recognised
    UnknownCategory(u8),
    /// Selector byte not recognised within a known category
    UnknownField { category: u8, selector: u8 },
    /// Transaction ends before the field's payload does
    Truncated { needed: usize, received: usize },
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// A frame with a validated header
///
/// `payload` is exactly `selector.width()` bytes long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Category and field
    pub selector: Selector,
    /// Device slot byte, BMS frames only. Not range checked here.
    pub slot: Option<u8>,
    /// Field payload
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Parse the header of a received transaction
    pub fn parse(bytes: &'a [u8]) -> Result<Self, FrameError> {
        if bytes.len() < MIN_FRAME_LEN {
            return Err(FrameError::TooShort);
        }

        let category = Category::from_byte(bytes[0]).ok_or(FrameError::UnknownCategory(bytes[0]))?;
        let selector =
            Selector::from_bytes(category, bytes[1]).ok_or(FrameError::UnknownField {
                category: bytes[0],
                selector: bytes[1],
            })?;

        let slot = match category {
            Category::Bms => Some(bytes[2]),
            Category::Inverter | Category::Controller => None,
        };

        let start = category.header_len();
        let end = start + selector.width();
        let payload = bytes.get(start..end).ok_or(FrameError::Truncated {
            needed: end,
            received: bytes.len(),
        })?;

        Ok(Self {
            selector,
            slot,
            payload,
        })
    }
}
