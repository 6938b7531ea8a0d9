use embedded_hal::digital::OutputPin;
use log::warn;

use super::{HidI2cBridge, I2cSlave, I2cSlaveEvent};
use crate::BridgeError;

pub const I2C_CONTROLLER_COUNT: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum I2cController {
    I2c0 = 0,
    I2c1 = 1,
}

impl I2cController {
    fn index(self) -> usize {
        self as usize
    }
}

/// At most one bridge per I2C controller, looked up by the controller an interrupt came from
pub struct BridgeRegistry<I, P> {
    bridges: [Option<HidI2cBridge<I, P>>; I2C_CONTROLLER_COUNT],
}

impl<I: I2cSlave, P: OutputPin> BridgeRegistry<I, P> {
    pub const fn new() -> Self {
        Self {
            bridges: [None, None],
        }
    }

    /// Binds `bridge` to `controller`, returning the bridge it replaces
    pub fn insert(
        &mut self,
        controller: I2cController,
        bridge: HidI2cBridge<I, P>,
    ) -> Option<HidI2cBridge<I, P>> {
        self.bridges[controller.index()].replace(bridge)
    }

    pub fn remove(&mut self, controller: I2cController) -> Option<HidI2cBridge<I, P>> {
        self.bridges[controller.index()].take()
    }

    pub fn get(&self, controller: I2cController) -> Option<&HidI2cBridge<I, P>> {
        self.bridges[controller.index()].as_ref()
    }

    pub fn get_mut(&mut self, controller: I2cController) -> Option<&mut HidI2cBridge<I, P>> {
        self.bridges[controller.index()].as_mut()
    }

    /// Routes a slave event to the bridge bound to `controller`
    pub fn on_event(
        &mut self,
        controller: I2cController,
        event: I2cSlaveEvent,
    ) -> Result<(), BridgeError> {
        match self.get_mut(controller) {
            Some(bridge) => {
                bridge.on_event(event);
                Ok(())
            }
            None => {
                warn!("{:?} event on {:?} without a bridge", event, controller);
                Err(BridgeError::NotConnected)
            }
        }
    }
}

impl<I: I2cSlave, P: OutputPin> Default for BridgeRegistry<I, P> {
    fn default() -> Self {
        Self::new()
    }
}
