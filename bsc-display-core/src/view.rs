//! Read-only access for the renderer

use bsc_display_protocol::{FieldWrite, Selector};

use crate::signal::UpdateReady;
use crate::snapshot::{ControllerSnapshot, DeviceSnapshot, InverterSnapshot};
use crate::store::{TelemetryStore, DEVICE_COUNT};

/// Consumer side of the store and the update-ready signal
///
/// Reads are unsynchronized with the receive path. Every array comes back
/// whole, but two fields of one snapshot may come from different batches.
#[derive(Clone, Copy)]
pub struct TelemetryView<'a, const N: usize = DEVICE_COUNT> {
    store: &'a TelemetryStore<N>,
    ready: &'a UpdateReady,
}

impl<'a, const N: usize> TelemetryView<'a, N> {
    pub const fn new(store: &'a TelemetryStore<N>, ready: &'a UpdateReady) -> Self {
        Self { store, ready }
    }

    pub const fn device_count(&self) -> usize {
        N
    }

    /// Snapshot of one slot, `None` past the last slot
    pub fn device(&self, slot: usize) -> Option<DeviceSnapshot> {
        self.store.device(slot).map(|record| record.snapshot())
    }

    pub fn devices(&self) -> impl Iterator<Item = DeviceSnapshot> + 'a {
        self.store.devices().map(|record| record.snapshot())
    }

    /// Slots with a device connected, with their index
    pub fn populated_devices(&self) -> impl Iterator<Item = (usize, DeviceSnapshot)> + 'a {
        self.devices()
            .enumerate()
            .filter(|(_, device)| device.is_populated())
    }

    pub fn inverter(&self) -> InverterSnapshot {
        self.store.inverter()
    }

    pub fn controller(&self) -> ControllerSnapshot {
        self.store.controller()
    }

    /// Any connected device reports an error
    pub fn any_device_error(&self) -> bool {
        self.devices()
            .any(|device| device.is_populated() && device.has_error())
    }

    /// Current value of a single field
    pub fn read(&self, selector: Selector, slot: u8) -> Option<FieldWrite> {
        self.store.read(selector, slot)
    }

    /// Take the update-ready flag; `true` at most once per completed batch
    pub fn take_ready(&self) -> bool {
        self.ready.take_ready()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    /// Wait for the next completed batch
    pub async fn wait_ready(&self) {
        self.ready.wait().await
    }
}
