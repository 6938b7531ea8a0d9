use num_enum::IntoPrimitive;
use packed_struct::prelude::*;
use usb_device::control::{Recipient, Request, RequestType};
use usb_device::descriptor::descriptor_type;
use usb_device::UsbDirection;

use crate::BridgeError;

const HID_REPORT_TYPE_OUTPUT: u8 = 0x02;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PrimitiveEnum, IntoPrimitive)]
#[repr(u8)]
pub enum HidRequest {
    GetReport = 0x01,
    GetIdle = 0x02,
    GetProtocol = 0x03,
    SetReport = 0x09,
    SetIdle = 0x0A,
    SetProtocol = 0x0B,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PrimitiveEnum, IntoPrimitive)]
#[repr(u8)]
pub enum HidProtocol {
    Boot = 0x00,
    Report = 0x01,
}

/// The 8 byte SETUP stage of a control transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, PackedStruct)]
#[packed_struct(endian = "lsb", bit_numbering = "msb0", size_bytes = "8")]
pub struct SetupPacket {
    /// Set for device to host
    #[packed_field(bits = "0")]
    pub device_to_host: bool,
    #[packed_field(bits = "1:2")]
    pub request_type: u8,
    #[packed_field(bits = "3:7")]
    pub recipient: u8,
    #[packed_field(bytes = "1")]
    pub request: u8,
    #[packed_field(bytes = "2..=3")]
    pub value: u16,
    #[packed_field(bytes = "4..=5")]
    pub index: u16,
    #[packed_field(bytes = "6..=7")]
    pub length: u16,
}

impl SetupPacket {
    pub fn new(
        direction: UsbDirection,
        request_type: RequestType,
        recipient: Recipient,
        request: u8,
        value: u16,
        index: u16,
        length: u16,
    ) -> Self {
        Self {
            device_to_host: direction == UsbDirection::In,
            request_type: request_type as u8,
            recipient: recipient as u8,
            request,
            value,
            index,
            length,
        }
    }

    pub fn direction(&self) -> UsbDirection {
        if self.device_to_host {
            UsbDirection::In
        } else {
            UsbDirection::Out
        }
    }

    pub fn to_bytes(&self) -> Result<[u8; 8], BridgeError> {
        Ok(self.pack()?)
    }

    pub fn get_descriptor(descriptor: u8, index: u8, length: u16) -> Self {
        Self::new(
            UsbDirection::In,
            RequestType::Standard,
            Recipient::Device,
            Request::GET_DESCRIPTOR,
            (u16::from(descriptor) << 8) | u16::from(index),
            0,
            length,
        )
    }

    pub fn get_device_descriptor(length: u16) -> Self {
        Self::get_descriptor(descriptor_type::DEVICE, 0, length)
    }

    pub fn get_configuration_descriptor(index: u8, length: u16) -> Self {
        Self::get_descriptor(descriptor_type::CONFIGURATION, index, length)
    }

    pub fn set_address(address: u8) -> Self {
        Self::new(
            UsbDirection::Out,
            RequestType::Standard,
            Recipient::Device,
            Request::SET_ADDRESS,
            u16::from(address),
            0,
            0,
        )
    }

    pub fn set_configuration(configuration: u8) -> Self {
        Self::new(
            UsbDirection::Out,
            RequestType::Standard,
            Recipient::Device,
            Request::SET_CONFIGURATION,
            u16::from(configuration),
            0,
            0,
        )
    }

    pub fn set_protocol(interface: u8, protocol: HidProtocol) -> Self {
        Self::new(
            UsbDirection::Out,
            RequestType::Class,
            Recipient::Interface,
            HidRequest::SetProtocol.into(),
            u16::from(u8::from(protocol)),
            u16::from(interface),
            0,
        )
    }

    /// HID SET_REPORT for output report 0, the data stage carries `length` bytes
    pub fn set_output_report(interface: u8, length: u16) -> Self {
        Self::new(
            UsbDirection::Out,
            RequestType::Class,
            Recipient::Interface,
            HidRequest::SetReport.into(),
            u16::from(HID_REPORT_TYPE_OUTPUT) << 8,
            u16::from(interface),
            length,
        )
    }
}
