//! Frame categories and field selectors
//!
//! Byte 0 of a frame picks the category, byte 1 the field inside it. Each
//! field has a fixed payload width on the wire.

use crate::values::{CELL_COUNT, IP_ADDRESS_LEN, TEMPERATURE_COUNT};

// Category IDs
pub const CATEGORY_BMS: u8 = 0x01;
pub const CATEGORY_INVERTER: u8 = 0x02;
pub const CATEGORY_CONTROLLER: u8 = 0x03;

// BMS field IDs
pub const BMS_CELL_VOLTAGES: u8 = 0x01;
pub const BMS_TOTAL_VOLTAGE: u8 = 0x02;
pub const BMS_MAX_CELL_DIFF_VOLTAGE: u8 = 0x03;
pub const BMS_AVG_VOLTAGE: u8 = 0x04;
pub const BMS_TOTAL_CURRENT: u8 = 0x05;
pub const BMS_MAX_CELL_VOLTAGE: u8 = 0x06;
pub const BMS_MIN_CELL_VOLTAGE: u8 = 0x07;
pub const BMS_MAX_VOLTAGE_CELL_NUMBER: u8 = 0x08;
pub const BMS_MIN_VOLTAGE_CELL_NUMBER: u8 = 0x09;
pub const BMS_IS_BALANCING_ACTIVE: u8 = 0x0A;
pub const BMS_BALANCING_CURRENT: u8 = 0x0B;
pub const BMS_TEMPERATURE: u8 = 0x0C;
pub const BMS_CHARGE_PERCENTAGE: u8 = 0x0D;
pub const BMS_ERROR_FLAGS: u8 = 0x0E;

// Inverter field IDs
pub const INVERTER_VOLTAGE: u8 = 0x01;
pub const INVERTER_CURRENT: u8 = 0x02;
pub const INVERTER_SOC: u8 = 0x03;
pub const INVERTER_CHARGE_CURRENT: u8 = 0x04;
pub const INVERTER_DISCHARGE_CURRENT: u8 = 0x05;

// Controller field IDs
pub const CONTROLLER_ALARMS: u8 = 0x01;
pub const CONTROLLER_IP_ADDRESS: u8 = 0x02;
pub const CONTROLLER_RELAYS: u8 = 0x03;
pub const CONTROLLER_DISPLAY_TIMEOUT: u8 = 0x04;

/// Field whose arrival closes a refresh batch
///
/// The controller transmits it after every other field of a cycle. Nothing on
/// the wire enforces that order; the display relies on it.
pub const BATCH_MARKER: Selector = Selector::Controller(ControllerField::DisplayTimeout);

/// Top-level frame classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Category {
    /// Per-device battery management data
    Bms,
    /// Inverter scalars
    Inverter,
    /// Controller scalars
    Controller,
}

impl Category {
    /// Parse a category from its wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            CATEGORY_BMS => Some(Category::Bms),
            CATEGORY_INVERTER => Some(Category::Inverter),
            CATEGORY_CONTROLLER => Some(Category::Controller),
            _ => None,
        }
    }

    /// Convert to wire byte
    pub fn to_byte(self) -> u8 {
        match self {
            Category::Bms => CATEGORY_BMS,
            Category::Inverter => CATEGORY_INVERTER,
            Category::Controller => CATEGORY_CONTROLLER,
        }
    }

    /// Number of header bytes before the payload
    ///
    /// BMS frames carry an extra device slot byte.
    pub fn header_len(self) -> usize {
        match self {
            Category::Bms => 3,
            Category::Inverter | Category::Controller => 2,
        }
    }
}

/// BMS record fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BmsField {
    CellVoltages,
    TotalVoltage,
    MaxCellDiffVoltage,
    AvgVoltage,
    TotalCurrent,
    MaxCellVoltage,
    MinCellVoltage,
    MaxVoltageCellNumber,
    MinVoltageCellNumber,
    IsBalancingActive,
    BalancingCurrent,
    Temperature,
    ChargePercentage,
    ErrorFlags,
}

impl BmsField {
    /// Every BMS field, in wire order
    pub const ALL: [BmsField; 14] = [
        BmsField::CellVoltages,
        BmsField::TotalVoltage,
        BmsField::MaxCellDiffVoltage,
        BmsField::AvgVoltage,
        BmsField::TotalCurrent,
        BmsField::MaxCellVoltage,
        BmsField::MinCellVoltage,
        BmsField::MaxVoltageCellNumber,
        BmsField::MinVoltageCellNumber,
        BmsField::IsBalancingActive,
        BmsField::BalancingCurrent,
        BmsField::Temperature,
        BmsField::ChargePercentage,
        BmsField::ErrorFlags,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            BMS_CELL_VOLTAGES => Some(BmsField::CellVoltages),
            BMS_TOTAL_VOLTAGE => Some(BmsField::TotalVoltage),
            BMS_MAX_CELL_DIFF_VOLTAGE => Some(BmsField::MaxCellDiffVoltage),
            BMS_AVG_VOLTAGE => Some(BmsField::AvgVoltage),
            BMS_TOTAL_CURRENT => Some(BmsField::TotalCurrent),
            BMS_MAX_CELL_VOLTAGE => Some(BmsField::MaxCellVoltage),
            BMS_MIN_CELL_VOLTAGE => Some(BmsField::MinCellVoltage),
            BMS_MAX_VOLTAGE_CELL_NUMBER => Some(BmsField::MaxVoltageCellNumber),
            BMS_MIN_VOLTAGE_CELL_NUMBER => Some(BmsField::MinVoltageCellNumber),
            BMS_IS_BALANCING_ACTIVE => Some(BmsField::IsBalancingActive),
            BMS_BALANCING_CURRENT => Some(BmsField::BalancingCurrent),
            BMS_TEMPERATURE => Some(BmsField::Temperature),
            BMS_CHARGE_PERCENTAGE => Some(BmsField::ChargePercentage),
            BMS_ERROR_FLAGS => Some(BmsField::ErrorFlags),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            BmsField::CellVoltages => BMS_CELL_VOLTAGES,
            BmsField::TotalVoltage => BMS_TOTAL_VOLTAGE,
            BmsField::MaxCellDiffVoltage => BMS_MAX_CELL_DIFF_VOLTAGE,
            BmsField::AvgVoltage => BMS_AVG_VOLTAGE,
            BmsField::TotalCurrent => BMS_TOTAL_CURRENT,
            BmsField::MaxCellVoltage => BMS_MAX_CELL_VOLTAGE,
            BmsField::MinCellVoltage => BMS_MIN_CELL_VOLTAGE,
            BmsField::MaxVoltageCellNumber => BMS_MAX_VOLTAGE_CELL_NUMBER,
            BmsField::MinVoltageCellNumber => BMS_MIN_VOLTAGE_CELL_NUMBER,
            BmsField::IsBalancingActive => BMS_IS_BALANCING_ACTIVE,
            BmsField::BalancingCurrent => BMS_BALANCING_CURRENT,
            BmsField::Temperature => BMS_TEMPERATURE,
            BmsField::ChargePercentage => BMS_CHARGE_PERCENTAGE,
            BmsField::ErrorFlags => BMS_ERROR_FLAGS,
        }
    }

    /// Payload width in bytes
    pub const fn width(self) -> usize {
        match self {
            BmsField::CellVoltages => CELL_COUNT * 2,
            BmsField::Temperature => TEMPERATURE_COUNT * 2,
            BmsField::ErrorFlags => 4,
            BmsField::MaxVoltageCellNumber
            | BmsField::MinVoltageCellNumber
            | BmsField::IsBalancingActive
            | BmsField::ChargePercentage => 1,
            BmsField::TotalVoltage
            | BmsField::MaxCellDiffVoltage
            | BmsField::AvgVoltage
            | BmsField::TotalCurrent
            | BmsField::MaxCellVoltage
            | BmsField::MinCellVoltage
            | BmsField::BalancingCurrent => 2,
        }
    }
}

/// Inverter scalar fields (all 2 bytes wide)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InverterField {
    Voltage,
    Current,
    Soc,
    ChargeCurrent,
    DischargeCurrent,
}

impl InverterField {
    pub const ALL: [InverterField; 5] = [
        InverterField::Voltage,
        InverterField::Current,
        InverterField::Soc,
        InverterField::ChargeCurrent,
        InverterField::DischargeCurrent,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            INVERTER_VOLTAGE => Some(InverterField::Voltage),
            INVERTER_CURRENT => Some(InverterField::Current),
            INVERTER_SOC => Some(InverterField::Soc),
            INVERTER_CHARGE_CURRENT => Some(InverterField::ChargeCurrent),
            INVERTER_DISCHARGE_CURRENT => Some(InverterField::DischargeCurrent),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            InverterField::Voltage => INVERTER_VOLTAGE,
            InverterField::Current => INVERTER_CURRENT,
            InverterField::Soc => INVERTER_SOC,
            InverterField::ChargeCurrent => INVERTER_CHARGE_CURRENT,
            InverterField::DischargeCurrent => INVERTER_DISCHARGE_CURRENT,
        }
    }

    pub fn width(self) -> usize {
        2
    }
}

/// Controller scalar fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerField {
    Alarms,
    IpAddress,
    Relays,
    /// Display power-save timeout in minutes; closes a refresh batch
    DisplayTimeout,
}

impl ControllerField {
    pub const ALL: [ControllerField; 4] = [
        ControllerField::Alarms,
        ControllerField::IpAddress,
        ControllerField::Relays,
        ControllerField::DisplayTimeout,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            CONTROLLER_ALARMS => Some(ControllerField::Alarms),
            CONTROLLER_IP_ADDRESS => Some(ControllerField::IpAddress),
            CONTROLLER_RELAYS => Some(ControllerField::Relays),
            CONTROLLER_DISPLAY_TIMEOUT => Some(ControllerField::DisplayTimeout),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ControllerField::Alarms => CONTROLLER_ALARMS,
            ControllerField::IpAddress => CONTROLLER_IP_ADDRESS,
            ControllerField::Relays => CONTROLLER_RELAYS,
            ControllerField::DisplayTimeout => CONTROLLER_DISPLAY_TIMEOUT,
        }
    }

    pub fn width(self) -> usize {
        match self {
            ControllerField::Alarms => 2,
            ControllerField::IpAddress => IP_ADDRESS_LEN,
            ControllerField::Relays | ControllerField::DisplayTimeout => 1,
        }
    }
}

/// A (category, field) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Selector {
    Bms(BmsField),
    Inverter(InverterField),
    Controller(ControllerField),
}

impl Selector {
    /// Resolve a selector byte within a category
    pub fn from_bytes(category: Category, selector: u8) -> Option<Self> {
        match category {
            Category::Bms => BmsField::from_byte(selector).map(Selector::Bms),
            Category::Inverter => InverterField::from_byte(selector).map(Selector::Inverter),
            Category::Controller => ControllerField::from_byte(selector).map(Selector::Controller),
        }
    }

    pub fn category(self) -> Category {
        match self {
            Selector::Bms(_) => Category::Bms,
            Selector::Inverter(_) => Category::Inverter,
            Selector::Controller(_) => Category::Controller,
        }
    }

    /// Field selector byte (offset 1)
    pub fn field_byte(self) -> u8 {
        match self {
            Selector::Bms(field) => field.to_byte(),
            Selector::Inverter(field) => field.to_byte(),
            Selector::Controller(field) => field.to_byte(),
        }
    }

    /// Payload width in bytes
    pub fn width(self) -> usize {
        match self {
            Selector::Bms(field) => field.width(),
            Selector::Inverter(field) => field.width(),
            Selector::Controller(field) => field.width(),
        }
    }

    /// Header plus payload length
    pub fn frame_len(self) -> usize {
        self.category().header_len() + self.width()
    }

    /// Returns true if this field closes a refresh batch
    pub fn is_batch_marker(self) -> bool {
        self == BATCH_MARKER
    }
}
