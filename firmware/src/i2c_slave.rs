//! [`I2cSlave`] over the hal I2C block in peripheral mode.

use hid_i2c_bridge::bridge::{I2cSlave, I2cSlaveEvent};
use rp_pico::hal::gpio::bank0::{Gpio2, Gpio3};
use rp_pico::hal::gpio::{FunctionI2C, Pin, PullUp};
use rp_pico::hal::i2c::peripheral::Event;
use rp_pico::hal::i2c::Peripheral;
use rp_pico::hal::{pac, I2C};

pub type SdaPin = Pin<Gpio2, FunctionI2C, PullUp>;
pub type SclPin = Pin<Gpio3, FunctionI2C, PullUp>;

pub struct PeripheralI2c {
    i2c: I2C<pac::I2C1, (SdaPin, SclPin), Peripheral>,
}

impl PeripheralI2c {
    pub fn new(
        block: pac::I2C1,
        sda: SdaPin,
        scl: SclPin,
        resets: &mut pac::RESETS,
        address: u8,
    ) -> Self {
        Self {
            i2c: I2C::new_peripheral_event_iterator(block, sda, scl, resets, u16::from(address)),
        }
    }

    /// Next bus condition the bridge has to act on, `None` once the block is idle
    pub fn next_event(&mut self) -> Option<I2cSlaveEvent> {
        loop {
            return match self.i2c.next()? {
                // the register id arrives with the first TransferWrite
                Event::Start => continue,
                Event::TransferWrite => Some(I2cSlaveEvent::Receive),
                Event::TransferRead => Some(I2cSlaveEvent::Request),
                Event::Restart | Event::Stop => Some(I2cSlaveEvent::Finish),
            };
        }
    }
}

impl I2cSlave for PeripheralI2c {
    fn read(&mut self, buffer: &mut [u8]) -> usize {
        self.i2c.read(buffer)
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        self.i2c.write(bytes)
    }
}
