//! Descriptors served over I2C.

use packed_struct::prelude::*;

use super::command::Register;
use crate::config::BridgeConfig;
use crate::hid::BOOT_KEYBOARD_REPORT_SIZE;
use crate::BridgeError;

pub const HID_DESCRIPTOR_LEN: usize = 30;
/// bcdVersion 1.00
pub const HID_OVER_I2C_VERSION: u16 = 0x0100;
/// wMaxOutputLength, the LED byte
pub const OUTPUT_REPORT_SIZE: u16 = 1;

/// Boot keyboard report descriptor: 8 modifier bits, a reserved byte, 5 LED outputs padded to a
/// byte and 6 key array slots.
#[rustfmt::skip]
pub const REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01,        // Usage Page (Generic Desktop),
    0x09, 0x06,        // Usage (Keyboard),
    0xA1, 0x01,        // Collection (Application),
    0x05, 0x07,        //   Usage Page (Key Codes),
    0x19, 0xE0,        //   Usage Minimum (224),
    0x29, 0xE7,        //   Usage Maximum (231),
    0x15, 0x00,        //   Logical Minimum (0),
    0x25, 0x01,        //   Logical Maximum (1),
    0x75, 0x01,        //   Report Size (1),
    0x95, 0x08,        //   Report Count (8),
    0x81, 0x02,        //   Input (Data, Variable, Absolute), ;Modifier byte
    0x95, 0x01,        //   Report Count (1),
    0x75, 0x08,        //   Report Size (8),
    0x81, 0x01,        //   Input (Constant), ;Reserved byte
    0x95, 0x05,        //   Report Count (5),
    0x75, 0x01,        //   Report Size (1),
    0x05, 0x08,        //   Usage Page (LEDs),
    0x19, 0x01,        //   Usage Minimum (1),
    0x29, 0x05,        //   Usage Maximum (5),
    0x91, 0x02,        //   Output (Data, Variable, Absolute), ;LED report
    0x95, 0x01,        //   Report Count (1),
    0x75, 0x03,        //   Report Size (3),
    0x91, 0x01,        //   Output (Constant), ;LED report padding
    0x95, 0x06,        //   Report Count (6),
    0x75, 0x08,        //   Report Size (8),
    0x15, 0x00,        //   Logical Minimum (0),
    0x25, 0x65,        //   Logical Maximum(101),
    0x05, 0x07,        //   Usage Page (Key Codes),
    0x19, 0x00,        //   Usage Minimum (0),
    0x29, 0x65,        //   Usage Maximum (101),
    0x81, 0x00,        //   Input (Data, Array), ;Key arrays (6 bytes)
    0xC0,              // End Collection
];

/// HID descriptor of the HID-over-I2C protocol, all fields little endian
#[derive(Clone, Copy, Debug, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "lsb", size_bytes = "30")]
pub struct HidI2cDescriptor {
    pub hid_desc_length: u16,
    pub bcd_version: u16,
    pub report_desc_length: u16,
    pub report_desc_register: u16,
    pub input_register: u16,
    pub max_input_length: u16,
    pub output_register: u16,
    pub max_output_length: u16,
    pub command_register: u16,
    pub data_register: u16,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version_id: u16,
    pub reserved: u32,
}

impl HidI2cDescriptor {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            hid_desc_length: HID_DESCRIPTOR_LEN as u16,
            bcd_version: HID_OVER_I2C_VERSION,
            report_desc_length: REPORT_DESCRIPTOR.len() as u16,
            report_desc_register: Register::ReportDescriptor.into(),
            input_register: Register::Input.into(),
            max_input_length: BOOT_KEYBOARD_REPORT_SIZE as u16,
            output_register: Register::Output.into(),
            max_output_length: OUTPUT_REPORT_SIZE,
            command_register: Register::Command.into(),
            data_register: Register::Data.into(),
            vendor_id: config.vendor_id,
            product_id: config.product_id,
            version_id: config.version_id,
            reserved: 0,
        }
    }

    pub fn to_bytes(&self) -> Result<[u8; HID_DESCRIPTOR_LEN], BridgeError> {
        Ok(self.pack()?)
    }
}
