//! USB keyboard to HID-over-I2C bridge for the RP2040.
//!
//! The crate enumerates a USB boot keyboard with a from-scratch host transfer engine
//! ([`usb::UsbHost`]) and replays its reports to a downstream I2C master through an emulated
//! FT260 HID-over-I2C device ([`bridge::HidI2cBridge`]). Interrupt handlers only record what
//! happened; follow-up work runs from the main loop through the [`events::EventQueue`].
//!
//! All hardware is consumed through traits, so the same code runs against the RP2040 registers
//! in the `firmware` crate and against mocks in the unit tests:
//!
//! * [`usb::HostController`] - the USB controller registers and DPSRAM
//! * [`bridge::I2cSlave`] - the I2C controller FIFOs in slave mode
//! * [`embedded_hal::digital::OutputPin`] - the HID-over-I2C interrupt line
//! * [`embedded_hal::delay::DelayNs`] - the settle delay after `SET_ADDRESS`
//!
//! ```rust, no_run
//! # use hid_i2c_bridge::prelude::*;
//! # use hid_i2c_bridge::usb::HostController;
//! # use hid_i2c_bridge::bridge::I2cSlave;
//! # fn main_loop<H: HostController, I: I2cSlave, P: embedded_hal::digital::OutputPin, D: embedded_hal::delay::DelayNs>(
//! #     host: &mut UsbHost<H>, bridge: &mut HidI2cBridge<I, P>, events: &mut EventQueue, delay: &mut D) {
//! loop {
//!     while let Some(event) = events.pop() {
//!         match event {
//!             EventKind::UsbDeviceAttached => host.attach(events, delay).ok(),
//!             EventKind::UsbDeviceDetached => Some(host.detach()),
//!             EventKind::HidDriverLoad => host.load_hid_driver(events).ok(),
//!             EventKind::HidReportAvailable => {
//!                 while let Some(report) = host.next_report() {
//!                     bridge.submit_input_report(report).ok();
//!                 }
//!                 Some(())
//!             }
//!         };
//!     }
//!
//!     if let Some(leds) = bridge.take_output_report() {
//!         host.send_output_report(events, leds).ok();
//!     }
//! }
//! # }
//! ```

#![no_std]

//Allow the use of std in tests
#[cfg(test)]
#[macro_use]
extern crate std;

use packed_struct::PackingError;

pub mod bridge;
pub mod config;
pub mod events;
pub mod hid;
pub mod prelude;
pub mod queue;
pub mod spin;
pub mod usb;

pub use usb::TransferFault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeError {
    /// A bounded queue rejected the item, the newest item is dropped
    QueueFull,
    /// The operation cannot start until an earlier transfer completes
    WouldBlock,
    /// The device answered with STALL
    Stall,
    /// The controller flagged a bus level error and the transfer was abandoned
    Transaction(TransferFault),
    /// A bounded spin gave up before its condition became true
    SpinExhausted,
    InvalidDescriptor,
    /// No device is attached or the HID driver is not loaded
    NotConnected,
    HandlerAlreadyRegistered,
    SerializationError,
}

impl From<PackingError> for BridgeError {
    fn from(_: PackingError) -> Self {
        BridgeError::SerializationError
    }
}
