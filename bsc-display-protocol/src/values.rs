//! Typed field writes
//!
//! A [`FieldWrite`] is the decoded meaning of one frame: which field changes
//! and its new value. Decoding goes through [`Frame::parse`], so every value
//! here was read from a payload of exactly the declared width.

use heapless::Vec;

use crate::fields::{BmsField, Category, ControllerField, InverterField, Selector};
use crate::frame::{Frame, FrameError, MAX_FRAME_SIZE, MIN_FRAME_LEN};

/// Cell voltages per BMS record
pub const CELL_COUNT: usize = 24;

/// Temperature sensors per BMS record
pub const TEMPERATURE_COUNT: usize = 3;

/// Length of the controller IP address text (NUL padded)
pub const IP_ADDRESS_LEN: usize = 16;

/// New value for a BMS record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BmsValue {
    /// Cell voltages in mV
    CellVoltages([u16; CELL_COUNT]),
    /// Pack voltage in 10 mV units
    TotalVoltage(i16),
    MaxCellDiffVoltage(u16),
    AvgVoltage(u16),
    /// Pack current in 10 mA units
    TotalCurrent(i16),
    MaxCellVoltage(u16),
    MinCellVoltage(u16),
    /// 1-based cell index
    MaxVoltageCellNumber(u8),
    /// 1-based cell index
    MinVoltageCellNumber(u8),
    IsBalancingActive(u8),
    BalancingCurrent(i16),
    /// Sensor readings in 0.01 °C units
    Temperature([i16; TEMPERATURE_COUNT]),
    ChargePercentage(u8),
    ErrorFlags(u32),
}

impl BmsValue {
    pub fn field(&self) -> BmsField {
        match self {
            BmsValue::CellVoltages(_) => BmsField::CellVoltages,
            BmsValue::TotalVoltage(_) => BmsField::TotalVoltage,
            BmsValue::MaxCellDiffVoltage(_) => BmsField::MaxCellDiffVoltage,
            BmsValue::AvgVoltage(_) => BmsField::AvgVoltage,
            BmsValue::TotalCurrent(_) => BmsField::TotalCurrent,
            BmsValue::MaxCellVoltage(_) => BmsField::MaxCellVoltage,
            BmsValue::MinCellVoltage(_) => BmsField::MinCellVoltage,
            BmsValue::MaxVoltageCellNumber(_) => BmsField::MaxVoltageCellNumber,
            BmsValue::MinVoltageCellNumber(_) => BmsField::MinVoltageCellNumber,
            BmsValue::IsBalancingActive(_) => BmsField::IsBalancingActive,
            BmsValue::BalancingCurrent(_) => BmsField::BalancingCurrent,
            BmsValue::Temperature(_) => BmsField::Temperature,
            BmsValue::ChargePercentage(_) => BmsField::ChargePercentage,
            BmsValue::ErrorFlags(_) => BmsField::ErrorFlags,
        }
    }

    fn decode(field: BmsField, payload: &[u8]) -> Self {
        match field {
            BmsField::CellVoltages => BmsValue::CellVoltages(read_u16_array(payload)),
            BmsField::TotalVoltage => BmsValue::TotalVoltage(read_i16(payload)),
            BmsField::MaxCellDiffVoltage => BmsValue::MaxCellDiffVoltage(read_u16(payload)),
            BmsField::AvgVoltage => BmsValue::AvgVoltage(read_u16(payload)),
            BmsField::TotalCurrent => BmsValue::TotalCurrent(read_i16(payload)),
            BmsField::MaxCellVoltage => BmsValue::MaxCellVoltage(read_u16(payload)),
            BmsField::MinCellVoltage => BmsValue::MinCellVoltage(read_u16(payload)),
            BmsField::MaxVoltageCellNumber => BmsValue::MaxVoltageCellNumber(payload[0]),
            BmsField::MinVoltageCellNumber => BmsValue::MinVoltageCellNumber(payload[0]),
            BmsField::IsBalancingActive => BmsValue::IsBalancingActive(payload[0]),
            BmsField::BalancingCurrent => BmsValue::BalancingCurrent(read_i16(payload)),
            BmsField::Temperature => {
                let raw: [u16; TEMPERATURE_COUNT] = read_u16_array(payload);
                BmsValue::Temperature(raw.map(|t| t as i16))
            }
            BmsField::ChargePercentage => BmsValue::ChargePercentage(payload[0]),
            BmsField::ErrorFlags => {
                BmsValue::ErrorFlags(u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]))
            }
        }
    }

    fn encode(&self, out: &mut Vec<u8, MAX_FRAME_SIZE>) -> Result<(), FrameError> {
        match self {
            BmsValue::CellVoltages(cells) => {
                for cell in cells {
                    push(out, &cell.to_le_bytes())?;
                }
                Ok(())
            }
            BmsValue::Temperature(temps) => {
                for temp in temps {
                    push(out, &temp.to_le_bytes())?;
                }
                Ok(())
            }
            BmsValue::TotalVoltage(v) | BmsValue::TotalCurrent(v) | BmsValue::BalancingCurrent(v) => {
                push(out, &v.to_le_bytes())
            }
            BmsValue::MaxCellDiffVoltage(v)
            | BmsValue::AvgVoltage(v)
            | BmsValue::MaxCellVoltage(v)
            | BmsValue::MinCellVoltage(v) => push(out, &v.to_le_bytes()),
            BmsValue::MaxVoltageCellNumber(v)
            | BmsValue::MinVoltageCellNumber(v)
            | BmsValue::IsBalancingActive(v)
            | BmsValue::ChargePercentage(v) => push(out, &[*v]),
            BmsValue::ErrorFlags(v) => push(out, &v.to_le_bytes()),
        }
    }
}

/// New value for an inverter scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InverterValue {
    /// 10 mV units
    Voltage(i16),
    /// 100 mA units
    Current(i16),
    /// Percent
    Soc(u16),
    /// Amps
    ChargeCurrent(i16),
    /// Amps
    DischargeCurrent(i16),
}

impl InverterValue {
    pub fn field(&self) -> InverterField {
        match self {
            InverterValue::Voltage(_) => InverterField::Voltage,
            InverterValue::Current(_) => InverterField::Current,
            InverterValue::Soc(_) => InverterField::Soc,
            InverterValue::ChargeCurrent(_) => InverterField::ChargeCurrent,
            InverterValue::DischargeCurrent(_) => InverterField::DischargeCurrent,
        }
    }

    fn decode(field: InverterField, payload: &[u8]) -> Self {
        match field {
            InverterField::Voltage => InverterValue::Voltage(read_i16(payload)),
            InverterField::Current => InverterValue::Current(read_i16(payload)),
            InverterField::Soc => InverterValue::Soc(read_u16(payload)),
            InverterField::ChargeCurrent => InverterValue::ChargeCurrent(read_i16(payload)),
            InverterField::DischargeCurrent => InverterValue::DischargeCurrent(read_i16(payload)),
        }
    }

    fn encode(&self, out: &mut Vec<u8, MAX_FRAME_SIZE>) -> Result<(), FrameError> {
        match self {
            InverterValue::Voltage(v)
            | InverterValue::Current(v)
            | InverterValue::ChargeCurrent(v)
            | InverterValue::DischargeCurrent(v) => push(out, &v.to_le_bytes()),
            InverterValue::Soc(v) => push(out, &v.to_le_bytes()),
        }
    }
}

/// New value for a controller scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerValue {
    /// One bit per alarm
    Alarms(u16),
    /// NUL padded ASCII text
    IpAddress([u8; IP_ADDRESS_LEN]),
    /// One bit per relay
    Relays(u8),
    /// Minutes until the display powers down
    DisplayTimeout(u8),
}

impl ControllerValue {
    pub fn field(&self) -> ControllerField {
        match self {
            ControllerValue::Alarms(_) => ControllerField::Alarms,
            ControllerValue::IpAddress(_) => ControllerField::IpAddress,
            ControllerValue::Relays(_) => ControllerField::Relays,
            ControllerValue::DisplayTimeout(_) => ControllerField::DisplayTimeout,
        }
    }

    fn decode(field: ControllerField, payload: &[u8]) -> Self {
        match field {
            ControllerField::Alarms => ControllerValue::Alarms(read_u16(payload)),
            ControllerField::IpAddress => {
                let mut text = [0u8; IP_ADDRESS_LEN];
                text.copy_from_slice(&payload[..IP_ADDRESS_LEN]);
                ControllerValue::IpAddress(text)
            }
            ControllerField::Relays => ControllerValue::Relays(payload[0]),
            ControllerField::DisplayTimeout => ControllerValue::DisplayTimeout(payload[0]),
        }
    }

    fn encode(&self, out: &mut Vec<u8, MAX_FRAME_SIZE>) -> Result<(), FrameError> {
        match self {
            ControllerValue::Alarms(v) => push(out, &v.to_le_bytes()),
            ControllerValue::IpAddress(text) => push(out, text),
            ControllerValue::Relays(v) | ControllerValue::DisplayTimeout(v) => push(out, &[*v]),
        }
    }
}

/// One decoded frame: a single field and its new value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldWrite {
    /// Field of the BMS record in `slot`
    Bms { slot: u8, value: BmsValue },
    Inverter(InverterValue),
    Controller(ControllerValue),
}

impl FieldWrite {
    /// Decode a received transaction
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        Frame::parse(bytes).map(|frame| Self::from_frame(&frame))
    }

    /// Decode the payload of a header-validated frame
    pub fn from_frame(frame: &Frame<'_>) -> Self {
        match frame.selector {
            Selector::Bms(field) => FieldWrite::Bms {
                slot: frame.slot.unwrap_or_default(),
                value: BmsValue::decode(field, frame.payload),
            },
            Selector::Inverter(field) => {
                FieldWrite::Inverter(InverterValue::decode(field, frame.payload))
            }
            Selector::Controller(field) => {
                FieldWrite::Controller(ControllerValue::decode(field, frame.payload))
            }
        }
    }

    pub fn selector(&self) -> Selector {
        match self {
            FieldWrite::Bms { value, .. } => Selector::Bms(value.field()),
            FieldWrite::Inverter(value) => Selector::Inverter(value.field()),
            FieldWrite::Controller(value) => Selector::Controller(value.field()),
        }
    }

    /// Encode this write as the controller would send it
    ///
    /// Frames shorter than [`MIN_FRAME_LEN`] are zero padded so the display
    /// accepts them. Returns the number of bytes written.
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let frame = self.encode_to_vec()?;
        if buffer.len() < frame.len() {
            return Err(FrameError::BufferTooSmall);
        }
        buffer[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }

    /// Encode this write into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let selector = self.selector();
        let mut out = Vec::new();

        push(&mut out, &[selector.category().to_byte(), selector.field_byte()])?;
        match self {
            FieldWrite::Bms { slot, value } => {
                push(&mut out, &[*slot])?;
                value.encode(&mut out)?;
            }
            FieldWrite::Inverter(value) => value.encode(&mut out)?,
            FieldWrite::Controller(value) => value.encode(&mut out)?,
        }

        while out.len() < MIN_FRAME_LEN {
            push(&mut out, &[0])?;
        }

        Ok(out)
    }

    pub fn category(&self) -> Category {
        self.selector().category()
    }
}

fn push(out: &mut Vec<u8, MAX_FRAME_SIZE>, bytes: &[u8]) -> Result<(), FrameError> {
    out.extend_from_slice(bytes)
        .map_err(|_| FrameError::BufferTooSmall)
}

fn read_u16(payload: &[u8]) -> u16 {
    u16::from_le_bytes([payload[0], payload[1]])
}

fn read_i16(payload: &[u8]) -> i16 {
    i16::from_le_bytes([payload[0], payload[1]])
}

fn read_u16_array<const N: usize>(payload: &[u8]) -> [u16; N] {
    let mut values = [0u16; N];
    for (value, chunk) in values.iter_mut().zip(payload.chunks_exact(2)) {
        *value = u16::from_le_bytes([chunk[0], chunk[1]]);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cell_frame(slot: u8, cells: &[u16; CELL_COUNT]) -> [u8; 51] {
        let mut bytes = [0u8; 51];
        bytes[0] = 0x01;
        bytes[1] = 0x01;
        bytes[2] = slot;
        for (i, cell) in cells.iter().enumerate() {
            bytes[3 + 2 * i..5 + 2 * i].copy_from_slice(&cell.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_parse_cell_voltages() {
        let mut cells = [0u16; CELL_COUNT];
        for (i, cell) in cells.iter_mut().enumerate() {
            *cell = 3200 + i as u16;
        }

        let write = FieldWrite::parse(&cell_frame(2, &cells)).unwrap();
        assert_eq!(
            write,
            FieldWrite::Bms {
                slot: 2,
                value: BmsValue::CellVoltages(cells)
            }
        );
    }

    #[test]
    fn test_parse_signed_total_current() {
        // -1234 little-endian
        let bytes = [0x01, 0x05, 0x00, 0x2E, 0xFB];
        let write = FieldWrite::parse(&bytes).unwrap();
        assert_eq!(
            write,
            FieldWrite::Bms {
                slot: 0,
                value: BmsValue::TotalCurrent(-1234)
            }
        );
    }

    #[test]
    fn test_parse_temperatures() {
        let bytes = [0x01, 0x0C, 0x01, 0xC4, 0x09, 0x18, 0xFC, 0x00, 0x00];
        let write = FieldWrite::parse(&bytes).unwrap();
        assert_eq!(
            write,
            FieldWrite::Bms {
                slot: 1,
                value: BmsValue::Temperature([2500, -1000, 0])
            }
        );
    }

    #[test]
    fn test_parse_error_flags() {
        let bytes = [0x01, 0x0E, 0x07, 0x01, 0x00, 0x00, 0x80];
        let write = FieldWrite::parse(&bytes).unwrap();
        assert_eq!(
            write,
            FieldWrite::Bms {
                slot: 7,
                value: BmsValue::ErrorFlags(0x8000_0001)
            }
        );
    }

    #[test]
    fn test_parse_ip_address() {
        let mut bytes = [0u8; 18];
        bytes[0] = 0x03;
        bytes[1] = 0x02;
        bytes[2..14].copy_from_slice(b"192.168.0.10");

        let mut expected = [0u8; IP_ADDRESS_LEN];
        expected[..12].copy_from_slice(b"192.168.0.10");

        assert_eq!(
            FieldWrite::parse(&bytes),
            Ok(FieldWrite::Controller(ControllerValue::IpAddress(expected)))
        );
    }

    #[test]
    fn test_parse_display_timeout_with_padding() {
        let write = FieldWrite::parse(&[0x03, 0x04, 10, 0x00]).unwrap();
        assert_eq!(write, FieldWrite::Controller(ControllerValue::DisplayTimeout(10)));
        assert!(write.selector().is_batch_marker());
    }

    #[test]
    fn test_encode_pads_short_frames() {
        let write = FieldWrite::Controller(ControllerValue::Relays(0b10_0101));
        let encoded = write.encode_to_vec().unwrap();
        assert_eq!(encoded.as_slice(), &[0x03, 0x03, 0b10_0101, 0x00]);
    }

    #[test]
    fn test_encode_inverter_soc() {
        let write = FieldWrite::Inverter(InverterValue::Soc(87));
        let mut buffer = [0u8; 8];
        let len = write.encode(&mut buffer).unwrap();
        assert_eq!(&buffer[..len], &[0x02, 0x03, 87, 0]);
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let write = FieldWrite::Bms {
            slot: 0,
            value: BmsValue::CellVoltages([0; CELL_COUNT]),
        };
        let mut buffer = [0u8; 10];
        assert_eq!(write.encode(&mut buffer), Err(FrameError::BufferTooSmall));
    }

    #[test]
    fn test_encoded_lengths_match_selector() {
        let writes = [
            FieldWrite::Bms {
                slot: 3,
                value: BmsValue::Temperature([1, 2, 3]),
            },
            FieldWrite::Bms {
                slot: 3,
                value: BmsValue::ErrorFlags(1),
            },
            FieldWrite::Controller(ControllerValue::IpAddress([b'x'; IP_ADDRESS_LEN])),
            FieldWrite::Inverter(InverterValue::DischargeCurrent(-40)),
        ];
        for write in writes {
            let encoded = write.encode_to_vec().unwrap();
            assert_eq!(encoded.len(), write.selector().frame_len());
        }
    }

    proptest! {
        #[test]
        fn parse_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
            let _ = FieldWrite::parse(&bytes);
        }

        #[test]
        fn short_transactions_rejected(bytes in proptest::collection::vec(any::<u8>(), 0..MIN_FRAME_LEN)) {
            prop_assert_eq!(FieldWrite::parse(&bytes), Err(FrameError::TooShort));
        }

        #[test]
        fn cell_voltages_survive_encoding(slot in any::<u8>(), cells in any::<[u16; CELL_COUNT]>()) {
            let write = FieldWrite::Bms { slot, value: BmsValue::CellVoltages(cells) };
            let encoded = write.encode_to_vec().unwrap();
            prop_assert_eq!(FieldWrite::parse(&encoded), Ok(write));
        }
    }
}
