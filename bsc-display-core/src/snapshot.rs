//! Plain copies of store contents handed to the renderer
//!
//! Raw values keep their wire units. The helpers convert to the units the
//! display shows and answer the questions the screens ask (is this slot in
//! use, does it report an error, which alarms are set).

use bsc_display_protocol::{CELL_COUNT, IP_ADDRESS_LEN, TEMPERATURE_COUNT};

use crate::store::SENTINEL_UNSET;

/// Number of alarm bits the controller reports
pub const ALARM_COUNT: u8 = 10;

/// Number of relays the controller drives
pub const RELAY_COUNT: u8 = 6;

/// One BMS device slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceSnapshot {
    /// mV, [`SENTINEL_UNSET`] until first written
    pub cell_voltages: [u16; CELL_COUNT],
    /// 10 mV units
    pub total_voltage: i16,
    /// mV
    pub max_cell_diff_voltage: u16,
    /// mV
    pub avg_voltage: u16,
    /// 10 mA units
    pub total_current: i16,
    /// mV, [`SENTINEL_UNSET`] until first written
    pub max_cell_voltage: u16,
    /// mV
    pub min_cell_voltage: u16,
    pub max_voltage_cell_number: u8,
    pub min_voltage_cell_number: u8,
    pub is_balancing_active: u8,
    pub balancing_current: i16,
    /// 0.01 °C units
    pub temperatures: [i16; TEMPERATURE_COUNT],
    /// Percent
    pub charge_percentage: u8,
    pub error_flags: u32,
    /// Time of the last write to any field of the slot, wrapping
    /// milliseconds
    pub last_update_ms: Option<u32>,
}

impl DeviceSnapshot {
    /// A device is connected to this slot
    ///
    /// The controller reports a max cell voltage of 0 or [`SENTINEL_UNSET`]
    /// for empty slots.
    pub fn is_populated(&self) -> bool {
        self.max_cell_voltage != 0 && self.max_cell_voltage != SENTINEL_UNSET
    }

    /// The slot carries per-cell voltages
    pub fn has_cell_data(&self) -> bool {
        let first = self.cell_voltages[0];
        first != 0 && first != SENTINEL_UNSET
    }

    pub fn has_error(&self) -> bool {
        self.error_flags != 0
    }

    pub fn is_balancing(&self) -> bool {
        self.is_balancing_active > 0
    }

    /// Leading cells that carry a reading
    pub fn cell_voltages(&self) -> &[u16] {
        let count = self
            .cell_voltages
            .iter()
            .position(|v| *v == 0 || *v == SENTINEL_UNSET)
            .unwrap_or(CELL_COUNT);
        &self.cell_voltages[..count]
    }

    pub fn total_voltage_v(&self) -> f32 {
        self.total_voltage as f32 / 100.0
    }

    pub fn total_current_a(&self) -> f32 {
        self.total_current as f32 / 100.0
    }

    /// Sensor reading in °C, `None` for an index past the last sensor
    pub fn temperature_c(&self, sensor: usize) -> Option<f32> {
        self.temperatures.get(sensor).map(|t| *t as f32 / 100.0)
    }
}

/// Inverter scalars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InverterSnapshot {
    /// 10 mV units
    pub voltage: i16,
    /// 100 mA units
    pub current: i16,
    /// Percent
    pub soc: u16,
    /// Amps
    pub charge_current: i16,
    /// Amps
    pub discharge_current: i16,
}

impl InverterSnapshot {
    pub fn voltage_v(&self) -> f32 {
        self.voltage as f32 / 100.0
    }

    pub fn current_a(&self) -> f32 {
        self.current as f32 / 10.0
    }
}

/// Controller scalars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerSnapshot {
    pub alarms: u16,
    /// NUL padded text
    pub ip_address: [u8; IP_ADDRESS_LEN],
    pub relays: u8,
    /// Minutes
    pub display_timeout: u8,
}

impl ControllerSnapshot {
    /// Alarm `n` (0-based) is raised
    pub fn alarm_active(&self, n: u8) -> bool {
        n < ALARM_COUNT && self.alarms & (1 << n) != 0
    }

    /// Relay `n` (0-based) is energized
    pub fn relay_active(&self, n: u8) -> bool {
        n < RELAY_COUNT && self.relays & (1 << n) != 0
    }

    /// Address text up to the first NUL
    ///
    /// `None` if the controller sent bytes that are not UTF-8.
    pub fn ip_address_str(&self) -> Option<&str> {
        let end = self
            .ip_address
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(IP_ADDRESS_LEN);
        core::str::from_utf8(&self.ip_address[..end]).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceSnapshot {
        DeviceSnapshot {
            cell_voltages: [SENTINEL_UNSET; CELL_COUNT],
            total_voltage: 0,
            max_cell_diff_voltage: 0,
            avg_voltage: 0,
            total_current: 0,
            max_cell_voltage: SENTINEL_UNSET,
            min_cell_voltage: 0,
            max_voltage_cell_number: 0,
            min_voltage_cell_number: 0,
            is_balancing_active: 0,
            balancing_current: 0,
            temperatures: [0; TEMPERATURE_COUNT],
            charge_percentage: 0,
            error_flags: 0,
            last_update_ms: None,
        }
    }

    #[test]
    fn test_population_sentinels() {
        let mut snap = device();
        assert!(!snap.is_populated());

        snap.max_cell_voltage = 0;
        assert!(!snap.is_populated());

        snap.max_cell_voltage = 3412;
        assert!(snap.is_populated());
    }

    #[test]
    fn test_cell_data_and_populated_cells() {
        let mut snap = device();
        assert!(!snap.has_cell_data());
        assert!(snap.cell_voltages().is_empty());

        snap.cell_voltages[..4].copy_from_slice(&[3301, 3302, 3303, 3304]);
        snap.cell_voltages[4] = 0;
        assert!(snap.has_cell_data());
        assert_eq!(snap.cell_voltages(), &[3301, 3302, 3303, 3304]);
    }

    #[test]
    fn test_scaled_units() {
        let mut snap = device();
        snap.total_voltage = 5312;
        snap.total_current = -1250;
        snap.temperatures = [2150, -300, 0];

        assert!((snap.total_voltage_v() - 53.12).abs() < 1e-4);
        assert!((snap.total_current_a() + 12.5).abs() < 1e-4);
        assert_eq!(snap.temperature_c(1), Some(-3.0));
        assert_eq!(snap.temperature_c(3), None);
    }

    #[test]
    fn test_error_and_balancing_flags() {
        let mut snap = device();
        assert!(!snap.has_error());
        assert!(!snap.is_balancing());

        snap.error_flags = 0x10;
        snap.is_balancing_active = 1;
        assert!(snap.has_error());
        assert!(snap.is_balancing());
    }

    #[test]
    fn test_inverter_units() {
        let inv = InverterSnapshot {
            voltage: 5400,
            current: -125,
            ..Default::default()
        };
        assert!((inv.voltage_v() - 54.0).abs() < 1e-4);
        assert!((inv.current_a() + 12.5).abs() < 1e-4);
    }

    #[test]
    fn test_alarm_and_relay_bits() {
        let ctl = ControllerSnapshot {
            alarms: 0b10_0000_0001 | 1 << 12,
            relays: 0b10_0001 | 1 << 7,
            ..Default::default()
        };

        assert!(ctl.alarm_active(0));
        assert!(ctl.alarm_active(9));
        assert!(!ctl.alarm_active(1));
        // Bits past the tenth alarm are not alarms
        assert!(!ctl.alarm_active(12));

        assert!(ctl.relay_active(0));
        assert!(ctl.relay_active(5));
        assert!(!ctl.relay_active(7));
    }

    #[test]
    fn test_ip_address_text() {
        let mut ctl = ControllerSnapshot::default();
        assert_eq!(ctl.ip_address_str(), Some(""));

        ctl.ip_address[..8].copy_from_slice(b"10.0.0.7");
        assert_eq!(ctl.ip_address_str(), Some("10.0.0.7"));

        ctl.ip_address = [b'1'; IP_ADDRESS_LEN];
        assert_eq!(ctl.ip_address_str(), Some("1111111111111111"));

        ctl.ip_address[0] = 0xFF;
        assert_eq!(ctl.ip_address_str(), None);
    }
}
