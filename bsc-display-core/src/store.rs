//! Telemetry store
//!
//! Latest known value of every field, per device slot plus the inverter and
//! controller scalars. Scalars live in one atomic each; arrays live in a
//! [`SeqArray`]. There is no cross-field atomicity: a reader may see some
//! fields of a record from before a write burst and some from after it.
//!
//! Writes are crate-private and only reachable through the
//! [`Decoder`](crate::Decoder). The renderer gets snapshots.

use portable_atomic::{AtomicBool, AtomicI16, AtomicU16, AtomicU32, AtomicU8, Ordering};

use bsc_display_protocol::{
    BmsField, BmsValue, ControllerField, ControllerValue, FieldWrite, InverterField,
    InverterValue, Selector, CELL_COUNT, IP_ADDRESS_LEN, TEMPERATURE_COUNT,
};

use crate::seqlock::{bytes_to_words, words_to_bytes, SeqArray};
use crate::snapshot::{ControllerSnapshot, DeviceSnapshot, InverterSnapshot};

/// Value of a field that has never been written
pub const SENTINEL_UNSET: u16 = u16::MAX;

/// BMS devices connected over Bluetooth
pub const WIRELESS_DEVICE_COUNT: usize = 5;

/// BMS devices connected over serial
pub const WIRED_DEVICE_COUNT: usize = 3;

/// Device slots on a stock controller
pub const DEVICE_COUNT: usize = WIRELESS_DEVICE_COUNT + WIRED_DEVICE_COUNT;

const IP_WORDS: usize = IP_ADDRESS_LEN / 2;

/// Slot index outside the store's capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotOutOfRange {
    pub slot: u8,
    pub capacity: usize,
}

/// Telemetry of one BMS device slot
#[derive(Debug)]
pub struct DeviceRecord {
    cell_voltages: SeqArray<CELL_COUNT>,
    total_voltage: AtomicI16,
    max_cell_diff_voltage: AtomicU16,
    avg_voltage: AtomicU16,
    total_current: AtomicI16,
    max_cell_voltage: AtomicU16,
    min_cell_voltage: AtomicU16,
    max_voltage_cell_number: AtomicU8,
    min_voltage_cell_number: AtomicU8,
    is_balancing_active: AtomicU8,
    balancing_current: AtomicI16,
    temperatures: SeqArray<TEMPERATURE_COUNT>,
    charge_percentage: AtomicU8,
    error_flags: AtomicU32,
    /// Low 32 bits of the receive time, valid once `updated` is set
    last_update_ms: AtomicU32,
    updated: AtomicBool,
}

impl DeviceRecord {
    /// Empty slot: cell and max cell voltages unset, everything else zero
    pub const fn new() -> Self {
        Self {
            cell_voltages: SeqArray::unset(),
            total_voltage: AtomicI16::new(0),
            max_cell_diff_voltage: AtomicU16::new(0),
            avg_voltage: AtomicU16::new(0),
            total_current: AtomicI16::new(0),
            max_cell_voltage: AtomicU16::new(SENTINEL_UNSET),
            min_cell_voltage: AtomicU16::new(0),
            max_voltage_cell_number: AtomicU8::new(0),
            min_voltage_cell_number: AtomicU8::new(0),
            is_balancing_active: AtomicU8::new(0),
            balancing_current: AtomicI16::new(0),
            temperatures: SeqArray::zeroed(),
            charge_percentage: AtomicU8::new(0),
            error_flags: AtomicU32::new(0),
            last_update_ms: AtomicU32::new(0),
            updated: AtomicBool::new(false),
        }
    }

    fn apply(&self, value: &BmsValue, now_ms: u64) {
        const W: Ordering = Ordering::Release;

        match *value {
            BmsValue::CellVoltages(ref cells) => self.cell_voltages.write(cells),
            BmsValue::TotalVoltage(v) => self.total_voltage.store(v, W),
            BmsValue::MaxCellDiffVoltage(v) => self.max_cell_diff_voltage.store(v, W),
            BmsValue::AvgVoltage(v) => self.avg_voltage.store(v, W),
            BmsValue::TotalCurrent(v) => self.total_current.store(v, W),
            BmsValue::MaxCellVoltage(v) => self.max_cell_voltage.store(v, W),
            BmsValue::MinCellVoltage(v) => self.min_cell_voltage.store(v, W),
            BmsValue::MaxVoltageCellNumber(v) => self.max_voltage_cell_number.store(v, W),
            BmsValue::MinVoltageCellNumber(v) => self.min_voltage_cell_number.store(v, W),
            BmsValue::IsBalancingActive(v) => self.is_balancing_active.store(v, W),
            BmsValue::BalancingCurrent(v) => self.balancing_current.store(v, W),
            BmsValue::Temperature(temps) => self.temperatures.write(&temps.map(|t| t as u16)),
            BmsValue::ChargePercentage(v) => self.charge_percentage.store(v, W),
            BmsValue::ErrorFlags(v) => self.error_flags.store(v, W),
        }

        // Wrapping milliseconds: ages are taken with wrapping_sub
        self.last_update_ms.store(now_ms as u32, W);
        self.updated.store(true, W);
    }

    /// Current value of one field
    pub fn read(&self, field: BmsField) -> BmsValue {
        const R: Ordering = Ordering::Acquire;

        match field {
            BmsField::CellVoltages => BmsValue::CellVoltages(self.cell_voltages.read()),
            BmsField::TotalVoltage => BmsValue::TotalVoltage(self.total_voltage.load(R)),
            BmsField::MaxCellDiffVoltage => {
                BmsValue::MaxCellDiffVoltage(self.max_cell_diff_voltage.load(R))
            }
            BmsField::AvgVoltage => BmsValue::AvgVoltage(self.avg_voltage.load(R)),
            BmsField::TotalCurrent => BmsValue::TotalCurrent(self.total_current.load(R)),
            BmsField::MaxCellVoltage => BmsValue::MaxCellVoltage(self.max_cell_voltage.load(R)),
            BmsField::MinCellVoltage => BmsValue::MinCellVoltage(self.min_cell_voltage.load(R)),
            BmsField::MaxVoltageCellNumber => {
                BmsValue::MaxVoltageCellNumber(self.max_voltage_cell_number.load(R))
            }
            BmsField::MinVoltageCellNumber => {
                BmsValue::MinVoltageCellNumber(self.min_voltage_cell_number.load(R))
            }
            BmsField::IsBalancingActive => {
                BmsValue::IsBalancingActive(self.is_balancing_active.load(R))
            }
            BmsField::BalancingCurrent => {
                BmsValue::BalancingCurrent(self.balancing_current.load(R))
            }
            BmsField::Temperature => {
                BmsValue::Temperature(self.temperatures.read().map(|t| t as i16))
            }
            BmsField::ChargePercentage => {
                BmsValue::ChargePercentage(self.charge_percentage.load(R))
            }
            BmsField::ErrorFlags => BmsValue::ErrorFlags(self.error_flags.load(R)),
        }
    }

    pub fn max_cell_voltage(&self) -> u16 {
        self.max_cell_voltage.load(Ordering::Acquire)
    }

    pub fn error_flags(&self) -> u32 {
        self.error_flags.load(Ordering::Acquire)
    }

    /// Time of the last write to any field of this record
    ///
    /// Low 32 bits of the `now_ms` passed to the decoder; wraps after about
    /// 49.7 days.
    pub fn last_update_ms(&self) -> Option<u32> {
        self.updated
            .load(Ordering::Acquire)
            .then(|| self.last_update_ms.load(Ordering::Acquire))
    }

    /// Copy every field
    pub fn snapshot(&self) -> DeviceSnapshot {
        const R: Ordering = Ordering::Acquire;

        DeviceSnapshot {
            cell_voltages: self.cell_voltages.read(),
            total_voltage: self.total_voltage.load(R),
            max_cell_diff_voltage: self.max_cell_diff_voltage.load(R),
            avg_voltage: self.avg_voltage.load(R),
            total_current: self.total_current.load(R),
            max_cell_voltage: self.max_cell_voltage.load(R),
            min_cell_voltage: self.min_cell_voltage.load(R),
            max_voltage_cell_number: self.max_voltage_cell_number.load(R),
            min_voltage_cell_number: self.min_voltage_cell_number.load(R),
            is_balancing_active: self.is_balancing_active.load(R),
            balancing_current: self.balancing_current.load(R),
            temperatures: self.temperatures.read().map(|t| t as i16),
            charge_percentage: self.charge_percentage.load(R),
            error_flags: self.error_flags.load(R),
            last_update_ms: self.last_update_ms(),
        }
    }
}

impl Default for DeviceRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Inverter scalars
#[derive(Debug)]
struct InverterScalars {
    voltage: AtomicI16,
    current: AtomicI16,
    soc: AtomicU16,
    charge_current: AtomicI16,
    discharge_current: AtomicI16,
}

impl InverterScalars {
    const fn new() -> Self {
        Self {
            voltage: AtomicI16::new(0),
            current: AtomicI16::new(0),
            soc: AtomicU16::new(0),
            charge_current: AtomicI16::new(0),
            discharge_current: AtomicI16::new(0),
        }
    }
}

/// Controller scalars
#[derive(Debug)]
struct ControllerScalars {
    alarms: AtomicU16,
    ip_address: SeqArray<IP_WORDS>,
    relays: AtomicU8,
    display_timeout: AtomicU8,
}

impl ControllerScalars {
    const fn new() -> Self {
        Self {
            alarms: AtomicU16::new(0),
            ip_address: SeqArray::zeroed(),
            relays: AtomicU8::new(0),
            display_timeout: AtomicU8::new(0),
        }
    }
}

/// Shared telemetry for `N` device slots
///
/// Created once and shared by reference between the receive path and the
/// renderer, e.g. from a `static` or a `StaticCell`.
#[derive(Debug)]
pub struct TelemetryStore<const N: usize = DEVICE_COUNT> {
    devices: [DeviceRecord; N],
    inverter: InverterScalars,
    controller: ControllerScalars,
}

impl<const N: usize> Default for TelemetryStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TelemetryStore<N> {
    pub const fn new() -> Self {
        Self {
            devices: [const { DeviceRecord::new() }; N],
            inverter: InverterScalars::new(),
            controller: ControllerScalars::new(),
        }
    }

    /// Number of device slots
    pub const fn device_count(&self) -> usize {
        N
    }

    /// Record of one device slot
    pub fn device(&self, slot: usize) -> Option<&DeviceRecord> {
        self.devices.get(slot)
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.iter()
    }

    /// Apply one decoded frame
    ///
    /// Slot bounds are the only thing left to check: the value itself was
    /// read from a payload of exactly the field's width.
    pub(crate) fn apply(&self, write: &FieldWrite, now_ms: u64) -> Result<(), SlotOutOfRange> {
        const W: Ordering = Ordering::Release;

        match write {
            FieldWrite::Bms { slot, value } => {
                let record = self.devices.get(*slot as usize).ok_or(SlotOutOfRange {
                    slot: *slot,
                    capacity: N,
                })?;
                record.apply(value, now_ms);
            }
            FieldWrite::Inverter(value) => {
                let inv = &self.inverter;
                match *value {
                    InverterValue::Voltage(v) => inv.voltage.store(v, W),
                    InverterValue::Current(v) => inv.current.store(v, W),
                    InverterValue::Soc(v) => inv.soc.store(v, W),
                    InverterValue::ChargeCurrent(v) => inv.charge_current.store(v, W),
                    InverterValue::DischargeCurrent(v) => inv.discharge_current.store(v, W),
                }
            }
            FieldWrite::Controller(value) => {
                let ctl = &self.controller;
                match *value {
                    ControllerValue::Alarms(v) => ctl.alarms.store(v, W),
                    ControllerValue::IpAddress(ref text) => {
                        ctl.ip_address.write(&bytes_to_words::<IP_ADDRESS_LEN, IP_WORDS>(text))
                    }
                    ControllerValue::Relays(v) => ctl.relays.store(v, W),
                    ControllerValue::DisplayTimeout(v) => ctl.display_timeout.store(v, W),
                }
            }
        }
        Ok(())
    }

    /// Current value of any field, in the same shape a frame would carry it
    ///
    /// Returns `None` for a BMS field of a slot outside the store.
    pub fn read(&self, selector: Selector, slot: u8) -> Option<FieldWrite> {
        match selector {
            Selector::Bms(field) => {
                let record = self.devices.get(slot as usize)?;
                Some(FieldWrite::Bms {
                    slot,
                    value: record.read(field),
                })
            }
            Selector::Inverter(field) => Some(FieldWrite::Inverter(self.read_inverter(field))),
            Selector::Controller(field) => {
                Some(FieldWrite::Controller(self.read_controller(field)))
            }
        }
    }

    fn read_inverter(&self, field: InverterField) -> InverterValue {
        const R: Ordering = Ordering::Acquire;
        let inv = &self.inverter;

        match field {
            InverterField::Voltage => InverterValue::Voltage(inv.voltage.load(R)),
            InverterField::Current => InverterValue::Current(inv.current.load(R)),
            InverterField::Soc => InverterValue::Soc(inv.soc.load(R)),
            InverterField::ChargeCurrent => InverterValue::ChargeCurrent(inv.charge_current.load(R)),
            InverterField::DischargeCurrent => {
                InverterValue::DischargeCurrent(inv.discharge_current.load(R))
            }
        }
    }

    fn read_controller(&self, field: ControllerField) -> ControllerValue {
        const R: Ordering = Ordering::Acquire;
        let ctl = &self.controller;

        match field {
            ControllerField::Alarms => ControllerValue::Alarms(ctl.alarms.load(R)),
            ControllerField::IpAddress => ControllerValue::IpAddress(self.ip_address()),
            ControllerField::Relays => ControllerValue::Relays(ctl.relays.load(R)),
            ControllerField::DisplayTimeout => {
                ControllerValue::DisplayTimeout(ctl.display_timeout.load(R))
            }
        }
    }

    fn ip_address(&self) -> [u8; IP_ADDRESS_LEN] {
        words_to_bytes::<IP_WORDS, IP_ADDRESS_LEN>(&self.controller.ip_address.read())
    }

    pub fn inverter(&self) -> InverterSnapshot {
        const R: Ordering = Ordering::Acquire;
        let inv = &self.inverter;

        InverterSnapshot {
            voltage: inv.voltage.load(R),
            current: inv.current.load(R),
            soc: inv.soc.load(R),
            charge_current: inv.charge_current.load(R),
            discharge_current: inv.discharge_current.load(R),
        }
    }

    pub fn controller(&self) -> ControllerSnapshot {
        const R: Ordering = Ordering::Acquire;
        let ctl = &self.controller;

        ControllerSnapshot {
            alarms: ctl.alarms.load(R),
            ip_address: self.ip_address(),
            relays: ctl.relays.load(R),
            display_timeout: ctl.display_timeout.load(R),
        }
    }
}
