//! Boot protocol keyboard reports and the relay that carries them from the USB side to the I2C
//! side.

use packed_struct::prelude::*;

use crate::BridgeError;

pub mod relay;

#[cfg(test)]
mod test;

pub use relay::ReportRelay;

/// Size in bytes of a boot keyboard input report
pub const BOOT_KEYBOARD_REPORT_SIZE: usize = 8;

/// Modifier bits of byte 0 of a boot keyboard input report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Modifier {
    LeftControl = 0x01,
    LeftShift = 0x02,
    LeftAlt = 0x04,
    LeftGui = 0x08,
    RightControl = 0x10,
    RightShift = 0x20,
    RightAlt = 0x40,
    RightGui = 0x80,
}

/// Report implementing the HID boot keyboard specification, as sent by the keyboard.
///
/// Two reports are equal when all 8 bytes are equal, so the same keys pressed in a different
/// slot order are different reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default, PackedStruct)]
#[packed_struct(endian = "lsb", bit_numbering = "msb0", size_bytes = "8")]
pub struct BootKeyboardInputReport {
    #[packed_field(bytes = "0")]
    pub modifiers: u8,
    #[packed_field(bytes = "1")]
    pub reserved: u8,
    #[packed_field(bytes = "2..8", element_size_bytes = "1")]
    pub keycodes: [u8; 6],
}

impl BootKeyboardInputReport {
    pub fn new(modifiers: u8, keycodes: [u8; 6]) -> Self {
        Self {
            modifiers,
            reserved: 0,
            keycodes,
        }
    }

    pub fn from_bytes(bytes: &[u8; BOOT_KEYBOARD_REPORT_SIZE]) -> Result<Self, BridgeError> {
        Ok(Self::unpack(bytes)?)
    }

    pub fn to_bytes(&self) -> Result<[u8; BOOT_KEYBOARD_REPORT_SIZE], BridgeError> {
        Ok(self.pack()?)
    }

    pub fn is_pressed(&self, modifier: Modifier) -> bool {
        self.modifiers & modifier as u8 != 0
    }

    /// Keycodes of the pressed non-modifier keys, empty slots skipped
    pub fn keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.keycodes.iter().copied().filter(|&k| k != 0)
    }
}

/// Report indicating the currently lit keyboard LEDs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, PackedStruct)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[packed_struct(endian = "lsb", bit_numbering = "lsb0", size_bytes = "1")]
pub struct BootKeyboardOutputReport {
    #[packed_field(bits = "0")]
    pub num_lock: bool,
    #[packed_field(bits = "1")]
    pub caps_lock: bool,
    #[packed_field(bits = "2")]
    pub scroll_lock: bool,
    #[packed_field(bits = "3")]
    pub compose: bool,
    #[packed_field(bits = "4")]
    pub kana: bool,
}

impl BootKeyboardOutputReport {
    pub fn from_byte(byte: u8) -> Result<Self, BridgeError> {
        Ok(Self::unpack(&[byte])?)
    }

    pub fn to_byte(&self) -> Result<u8, BridgeError> {
        let [byte] = self.pack()?;
        Ok(byte)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BootKeyboardInputReport {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=u8:#04x} {=[u8]:02x}", self.modifiers, self.keycodes);
    }
}
