//! BSC Display Telemetry Protocol
//!
//! This crate defines the frames the battery safety controller (BSC) writes
//! to its display over the shared bus. Every bus transaction carries exactly
//! one frame and every frame updates exactly one telemetry field.
//!
//! # Protocol Overview
//!
//! ```text
//! BMS frames:
//! ┌──────────┬──────────┬──────┬──────────────────┐
//! │ CATEGORY │ SELECTOR │ SLOT │ PAYLOAD          │
//! │ 1B       │ 1B       │ 1B   │ 1–48B            │
//! └──────────┴──────────┴──────┴──────────────────┘
//!
//! Inverter / controller frames:
//! ┌──────────┬──────────┬──────────────────┐
//! │ CATEGORY │ SELECTOR │ PAYLOAD          │
//! │ 1B       │ 1B       │ 1–16B            │
//! └──────────┴──────────┴──────────────────┘
//! ```
//!
//! All integers are little-endian. A transaction shorter than
//! [`MIN_FRAME_LEN`] bytes is never a frame.
//!
//! The controller sends the display-timeout field last in every refresh
//! cycle, so it doubles as the batch-complete marker (see [`BATCH_MARKER`]).

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

pub mod fields;
pub mod frame;
pub mod values;

pub use fields::{BmsField, Category, ControllerField, InverterField, Selector, BATCH_MARKER};
pub use frame::{Frame, FrameError, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, MIN_FRAME_LEN};
pub use values::{
    BmsValue, ControllerValue, FieldWrite, InverterValue, CELL_COUNT, IP_ADDRESS_LEN,
    TEMPERATURE_COUNT,
};
