//! Telemetry ingestion core for the BSC display
//!
//! This crate contains everything between the bus peripheral and the
//! renderer that does not depend on specific hardware:
//!
//! - Telemetry store with per-field atomic updates and torn-read free arrays
//! - Frame decoder applying one field write per frame
//! - Update-ready signal marking the end of a refresh batch
//! - Bounded receive adapter and frame queue
//! - Read-only view and link health monitoring for the renderer
//! - Configuration type definitions
//!
//! # Producer / consumer
//!
//! The bus receive path (producer) runs in interrupt or callback context and
//! owns the [`ReceiveAdapter`]. The render task (consumer) polls a
//! [`TelemetryView`] on a fixed interval. Both reach the same
//! [`TelemetryStore`] and [`UpdateReady`] by reference; neither takes a lock
//! that the other could hold for long.
//!
//! # Targets
//!
//! Every field atomic is 32 bits or narrower, so the crate builds for cores
//! without 64-bit atomics:
//!
//! ```text
//! cargo build -p bsc-display-core --target thumbv7em-none-eabihf --features defmt,serde
//! cargo build -p bsc-display-core --target thumbv6m-none-eabi
//! ```
//!
//! Record timestamps keep the low 32 bits of `now_ms` and wrap after about
//! 49.7 days; ages are taken with wrapping subtraction.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod decoder;
pub mod monitor;
pub mod queue;
pub mod rx;
pub mod seqlock;
pub mod signal;
pub mod snapshot;
pub mod store;
pub mod view;

pub use config::{ConfigError, TelemetryConfig};
pub use decoder::{DecodeCounts, DecodeError, DecodeStats, Decoder};
pub use monitor::{LinkMonitor, SlotStatus};
pub use queue::{FrameQueue, OverflowPolicy, PushOutcome, QueueError, DEFAULT_QUEUE_DEPTH};
pub use rx::{ReceiveAdapter, RxBuffer, RxError, RxStats, RxTransaction, RX_BUFFER_SIZE};
pub use signal::UpdateReady;
pub use snapshot::{
    ControllerSnapshot, DeviceSnapshot, InverterSnapshot, ALARM_COUNT, RELAY_COUNT,
};
pub use store::{
    DeviceRecord, SlotOutOfRange, TelemetryStore, DEVICE_COUNT, SENTINEL_UNSET,
    WIRED_DEVICE_COUNT, WIRELESS_DEVICE_COUNT,
};
pub use view::TelemetryView;
