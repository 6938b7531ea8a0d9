//! Registers and command register encoding of the HID-over-I2C protocol.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use packed_struct::prelude::*;

/// Register ids, sent little endian as the first two bytes of a write
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Register {
    HidDescriptor = 1,
    Input = 2,
    ReportDescriptor = 3,
    Output = 4,
    Command = 5,
    Data = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PrimitiveEnum, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OpCode {
    Reset = 1,
    GetReport = 2,
    SetReport = 3,
    GetIdle = 4,
    SetIdle = 5,
    GetProtocol = 6,
    SetProtocol = 7,
    SetPower = 8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PrimitiveEnum, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReportType {
    Input = 1,
    Output = 2,
    Feature = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PrimitiveEnum, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PowerState {
    On = 0,
    Sleep = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PrimitiveEnum, IntoPrimitive)]
#[repr(u8)]
pub enum Protocol {
    Boot = 0,
    Report = 1,
}

const OP_CODE_MASK: u8 = 0x0F;
const REPORT_TYPE_MASK: u8 = 0x03;
const REPORT_TYPE_LSB: u8 = 4;
const POWER_STATE_MASK: u8 = 0x03;

/// Bytes of a command register write before the optional data register payload
const COMMAND_HEADER_LEN: usize = 6;

/// A decoded command register write.
///
/// `data` holds what follows the data register id and the 16 bit length field, it is empty
/// unless the write carried at least that header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command<'a> {
    /// `None` for op codes outside the protocol
    pub op_code: Option<OpCode>,
    pub report_type: Option<ReportType>,
    /// Low bits of the first byte, the power state of SET_POWER
    pub argument: u8,
    pub data_len: u16,
    pub data: &'a [u8],
}

impl<'a> Command<'a> {
    /// `None` when fewer than the two command bytes are present
    pub fn parse(bytes: &'a [u8]) -> Option<Self> {
        let (&low, &high) = (bytes.first()?, bytes.get(1)?);

        let (data_len, data) = if bytes.len() >= COMMAND_HEADER_LEN {
            (
                u16::from_le_bytes([bytes[4], bytes[5]]),
                &bytes[COMMAND_HEADER_LEN..],
            )
        } else {
            (0, &[][..])
        };

        Some(Self {
            op_code: OpCode::from_primitive(high & OP_CODE_MASK),
            report_type: ReportType::from_primitive((low >> REPORT_TYPE_LSB) & REPORT_TYPE_MASK),
            argument: low & POWER_STATE_MASK,
            data_len,
            data,
        })
    }

    pub fn power_state(&self) -> Option<PowerState> {
        PowerState::from_primitive(self.argument)
    }
}
