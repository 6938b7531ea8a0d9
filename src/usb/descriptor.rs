//! Standard descriptors read during enumeration.
//!
//! Each `from_bytes` accepts a prefix of the descriptor, missing trailing fields read as zero.
//! That covers the first 8 byte read of the device descriptor made before the control endpoint
//! size is known.

use log::warn;
use packed_struct::prelude::*;
use usb_device::descriptor::descriptor_type;
use usb_device::endpoint::EndpointType;
use usb_device::UsbDirection;

use crate::BridgeError;

pub const USB_CLASS_HID: u8 = 0x03;

pub const DEVICE_DESCRIPTOR_LEN: usize = 18;
pub const CONFIGURATION_DESCRIPTOR_LEN: usize = 9;
pub const INTERFACE_DESCRIPTOR_LEN: usize = 9;
pub const ENDPOINT_DESCRIPTOR_LEN: usize = 7;

/// wMaxPacketSize bits holding the packet size
const MAX_PACKET_SIZE_MASK: u16 = 0x07FF;

fn padded<const N: usize>(bytes: &[u8], min: usize) -> Result<[u8; N], BridgeError> {
    if bytes.len() < min {
        return Err(BridgeError::InvalidDescriptor);
    }
    let mut buffer = [0; N];
    let len = bytes.len().min(N);
    buffer[..len].copy_from_slice(&bytes[..len]);
    Ok(buffer)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, PackedStruct)]
#[packed_struct(endian = "lsb", bit_numbering = "msb0", size_bytes = "18")]
pub struct DeviceDescriptor {
    #[packed_field(bytes = "0")]
    pub length: u8,
    #[packed_field(bytes = "1")]
    pub descriptor_type: u8,
    #[packed_field(bytes = "2..=3")]
    pub usb_version: u16,
    #[packed_field(bytes = "4")]
    pub device_class: u8,
    #[packed_field(bytes = "5")]
    pub device_sub_class: u8,
    #[packed_field(bytes = "6")]
    pub device_protocol: u8,
    #[packed_field(bytes = "7")]
    pub max_packet_size_0: u8,
    #[packed_field(bytes = "8..=9")]
    pub vendor_id: u16,
    #[packed_field(bytes = "10..=11")]
    pub product_id: u16,
    #[packed_field(bytes = "12..=13")]
    pub device_version: u16,
    #[packed_field(bytes = "14")]
    pub manufacturer_index: u8,
    #[packed_field(bytes = "15")]
    pub product_index: u8,
    #[packed_field(bytes = "16")]
    pub serial_number_index: u8,
    #[packed_field(bytes = "17")]
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    /// Needs at least the first 8 bytes, up to `bMaxPacketSize0`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BridgeError> {
        let descriptor = Self::unpack(&padded(bytes, 8)?)?;
        if descriptor.max_packet_size_0 == 0 {
            return Err(BridgeError::InvalidDescriptor);
        }
        Ok(descriptor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, PackedStruct)]
#[packed_struct(endian = "lsb", bit_numbering = "msb0", size_bytes = "9")]
pub struct ConfigurationDescriptor {
    #[packed_field(bytes = "0")]
    pub length: u8,
    #[packed_field(bytes = "1")]
    pub descriptor_type: u8,
    #[packed_field(bytes = "2..=3")]
    pub total_length: u16,
    #[packed_field(bytes = "4")]
    pub num_interfaces: u8,
    #[packed_field(bytes = "5")]
    pub configuration_value: u8,
    #[packed_field(bytes = "6")]
    pub configuration_index: u8,
    #[packed_field(bytes = "7")]
    pub attributes: u8,
    #[packed_field(bytes = "8")]
    pub max_power: u8,
}

impl ConfigurationDescriptor {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BridgeError> {
        let descriptor = Self::unpack(&padded(bytes, CONFIGURATION_DESCRIPTOR_LEN)?)?;
        if usize::from(descriptor.total_length) < CONFIGURATION_DESCRIPTOR_LEN {
            return Err(BridgeError::InvalidDescriptor);
        }
        Ok(descriptor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, PackedStruct)]
#[packed_struct(endian = "lsb", bit_numbering = "msb0", size_bytes = "9")]
pub struct InterfaceDescriptor {
    #[packed_field(bytes = "0")]
    pub length: u8,
    #[packed_field(bytes = "1")]
    pub descriptor_type: u8,
    #[packed_field(bytes = "2")]
    pub interface_number: u8,
    #[packed_field(bytes = "3")]
    pub alternate_setting: u8,
    #[packed_field(bytes = "4")]
    pub num_endpoints: u8,
    #[packed_field(bytes = "5")]
    pub interface_class: u8,
    #[packed_field(bytes = "6")]
    pub interface_sub_class: u8,
    #[packed_field(bytes = "7")]
    pub interface_protocol: u8,
    #[packed_field(bytes = "8")]
    pub interface_index: u8,
}

impl InterfaceDescriptor {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BridgeError> {
        Ok(Self::unpack(&padded(bytes, INTERFACE_DESCRIPTOR_LEN)?)?)
    }

    pub fn is_hid(&self) -> bool {
        self.interface_class == USB_CLASS_HID
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, PackedStruct)]
#[packed_struct(endian = "lsb", bit_numbering = "msb0", size_bytes = "7")]
pub struct EndpointDescriptor {
    #[packed_field(bytes = "0")]
    pub length: u8,
    #[packed_field(bytes = "1")]
    pub descriptor_type: u8,
    #[packed_field(bytes = "2")]
    pub endpoint_address: u8,
    #[packed_field(bytes = "3")]
    pub attributes: u8,
    #[packed_field(bytes = "4..=5")]
    pub max_packet_size: u16,
    #[packed_field(bytes = "6")]
    pub interval: u8,
}

impl EndpointDescriptor {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BridgeError> {
        Ok(Self::unpack(&padded(bytes, ENDPOINT_DESCRIPTOR_LEN)?)?)
    }

    pub fn number(&self) -> u8 {
        self.endpoint_address & 0x0F
    }

    pub fn direction(&self) -> UsbDirection {
        if self.endpoint_address & 0x80 != 0 {
            UsbDirection::In
        } else {
            UsbDirection::Out
        }
    }

    pub fn transfer_type(&self) -> EndpointType {
        match self.attributes & 0b11 {
            0 => EndpointType::Control,
            1 => EndpointType::Isochronous,
            2 => EndpointType::Bulk,
            _ => EndpointType::Interrupt,
        }
    }

    pub fn packet_size(&self) -> u16 {
        self.max_packet_size & MAX_PACKET_SIZE_MASK
    }
}

/// Interrupt endpoint found while scanning a configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptEndpoint {
    pub number: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl From<&EndpointDescriptor> for InterruptEndpoint {
    fn from(descriptor: &EndpointDescriptor) -> Self {
        Self {
            number: descriptor.number(),
            max_packet_size: descriptor.packet_size(),
            interval: descriptor.interval,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ConfigurationScan {
    pub hid_interface: Option<u8>,
    pub interrupt_in: Option<InterruptEndpoint>,
    pub interrupt_out: Option<InterruptEndpoint>,
}

/// Walks the descriptors following the configuration descriptor at the start of `block`.
///
/// Records the first HID interface and the first interrupt endpoint of each direction. The walk
/// stops once the HID interface and an interrupt IN endpoint are known, at the end of the block
/// or at a descriptor claiming zero length.
pub fn scan_configuration(block: &[u8]) -> ConfigurationScan {
    let mut scan = ConfigurationScan::default();
    let mut offset = CONFIGURATION_DESCRIPTOR_LEN;

    while offset + 1 < block.len() {
        let len = usize::from(block[offset]);
        if len == 0 {
            warn!("Zero length descriptor at offset {}", offset);
            break;
        }
        let descriptor = &block[offset..(offset + len).min(block.len())];

        match block[offset + 1] {
            descriptor_type::INTERFACE if scan.hid_interface.is_none() => {
                match InterfaceDescriptor::from_bytes(descriptor) {
                    Ok(interface) if interface.is_hid() => {
                        scan.hid_interface = Some(interface.interface_number);
                    }
                    Ok(_) => {}
                    Err(_) => warn!("Truncated interface descriptor at offset {}", offset),
                }
            }
            descriptor_type::ENDPOINT => match EndpointDescriptor::from_bytes(descriptor) {
                Ok(endpoint) if endpoint.transfer_type() == EndpointType::Interrupt => {
                    let found = match endpoint.direction() {
                        UsbDirection::In => &mut scan.interrupt_in,
                        UsbDirection::Out => &mut scan.interrupt_out,
                    };
                    if found.is_none() {
                        *found = Some(InterruptEndpoint::from(&endpoint));
                    }
                }
                Ok(_) => {}
                Err(_) => warn!("Truncated endpoint descriptor at offset {}", offset),
            },
            _ => {}
        }

        if scan.hid_interface.is_some() && scan.interrupt_in.is_some() {
            break;
        }
        offset += len;
    }

    scan
}
