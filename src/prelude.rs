//! The bridge prelude.
//!
//! The purpose of this module is to alleviate imports of the structs and enums needed to wire
//! the host engine, the I2C bridge and the event queue together:
//!
//! ```
//! # #![allow(unused_imports)]
//! use hid_i2c_bridge::prelude::*;
//! ```

pub use crate::bridge::{BridgeRegistry, HidI2cBridge, I2cController, I2cSlaveEvent};
pub use crate::config::{BridgeConfig, BridgeConfigBuilder, HostConfig, HostConfigBuilder};
pub use crate::events::{EventHandlers, EventKind, EventQueue};
pub use crate::hid::{BootKeyboardInputReport, BootKeyboardOutputReport};
pub use crate::spin::SpinBound;
pub use crate::usb::UsbHost;
pub use crate::BridgeError;
