//! BSC Display Hardware Abstraction Layer
//!
//! The display is a bus *target*: the battery safety controller writes one
//! telemetry frame per bus transaction and the display only ever listens.
//! This crate defines the trait a chip-specific bus peripheral implements so
//! the receive path in `bsc-display-core` can stay board-agnostic.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  bsc-display-core (receive adapter)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  bsc-display-hal (this crate - traits)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!          chip-specific I2C target driver
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod i2c;

pub use i2c::{BusConfig, BusTarget};
