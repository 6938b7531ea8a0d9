//! HID-over-I2C device side, emulating an FT260 in I2C slave mode.
//!
//! The downstream I2C master talks to [`HidI2cBridge`] through the register protocol of the
//! HID-over-I2C specification: a write starts with a 16 bit register id, a read without a
//! preceding register id fetches the oldest pending input report. Pending input reports are
//! signalled on the interrupt line.
//!
//! Everything here runs from the I2C interrupt through [`HidI2cBridge::on_event`], except
//! [`HidI2cBridge::submit_input_report`] and [`HidI2cBridge::take_output_report`] which the main
//! loop calls.

use embedded_hal::digital::OutputPin;
use log::{debug, info, trace, warn};

use crate::config::{BridgeConfig, InterruptPolarity};
use crate::hid::{BootKeyboardInputReport, BootKeyboardOutputReport, BOOT_KEYBOARD_REPORT_SIZE};
use crate::queue::RingQueue;
use crate::spin::{spin_until, SpinBound};
use crate::BridgeError;

pub mod command;
pub mod descriptor;
pub mod registry;

#[cfg(test)]
mod test;

pub use command::{Command, OpCode, PowerState, Protocol, Register, ReportType};
pub use descriptor::{HidI2cDescriptor, REPORT_DESCRIPTOR};
pub use registry::{BridgeRegistry, I2cController};

/// Bytes of a register write kept after the register id
pub const INBOUND_BUFFER_SIZE: usize = 16;
pub const DATA_REGISTER_SIZE: usize = 16;
/// Slots in the input report queue, one fewer reports can be pending
pub const INPUT_REPORT_QUEUE_SIZE: usize = 5;

/// Length field of an input report read: the report plus the length field itself
const INPUT_REPORT_LEN: u16 = BOOT_KEYBOARD_REPORT_SIZE as u16 + 2;
const REGISTER_ID_LEN: usize = 2;
/// The output register and SET_REPORT both frame the LED byte with a 16 bit length
const OUTPUT_REPORT_LEN: u16 = 3;

/// The I2C controller FIFOs in slave mode
pub trait I2cSlave {
    /// Moves bytes the master wrote from the RX FIFO into `buffer`, returns how many were moved
    fn read(&mut self, buffer: &mut [u8]) -> usize;
    /// Queues as many of `bytes` as the TX FIFO has room for, returns how many were queued
    fn write(&mut self, bytes: &[u8]) -> usize;
}

/// Slave side conditions the I2C interrupt reports
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cSlaveEvent {
    /// The master wrote bytes that are waiting in the RX FIFO
    Receive,
    /// The master is reading and the TX FIFO needs data
    Request,
    /// STOP or repeated START
    Finish,
}

/// Writes all of `bytes`, waiting for room in the TX FIFO
fn stream<I: I2cSlave>(i2c: &mut I, bound: SpinBound, bytes: &[u8]) {
    let mut sent = 0;
    let result = spin_until(bound, || {
        sent += i2c.write(&bytes[sent..]);
        sent >= bytes.len()
    });
    if result.is_err() {
        warn!("TX FIFO stuck, {} of {} bytes sent", sent, bytes.len());
    }
}

pub struct HidI2cBridge<I, P> {
    i2c: I,
    interrupt: P,
    config: BridgeConfig,
    descriptor: HidI2cDescriptor,

    selected: Option<u16>,
    register_id: [u8; REGISTER_ID_LEN],
    register_id_len: usize,
    inbound: [u8; INBOUND_BUFFER_SIZE],
    inbound_len: usize,

    data: heapless::Vec<u8, DATA_REGISTER_SIZE>,
    input: BootKeyboardInputReport,
    reset_pending: bool,
    power: PowerState,
    output: Option<BootKeyboardOutputReport>,
    reports: RingQueue<BootKeyboardInputReport, INPUT_REPORT_QUEUE_SIZE>,
    asserted: bool,
}

impl<I: I2cSlave, P: OutputPin> HidI2cBridge<I, P> {
    /// Takes an I2C controller already set up as a slave on `config.slave_address` and the
    /// interrupt line, which is de-asserted.
    pub fn new(i2c: I, interrupt: P, config: BridgeConfig) -> Self {
        let mut bridge = Self {
            i2c,
            interrupt,
            config,
            descriptor: HidI2cDescriptor::new(&config),
            selected: None,
            register_id: [0; REGISTER_ID_LEN],
            register_id_len: 0,
            inbound: [0; INBOUND_BUFFER_SIZE],
            inbound_len: 0,
            data: heapless::Vec::new(),
            input: BootKeyboardInputReport::default(),
            reset_pending: false,
            power: PowerState::On,
            output: None,
            reports: RingQueue::new(),
            asserted: false,
        };
        bridge.set_interrupt(false);
        bridge
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn i2c(&self) -> &I {
        &self.i2c
    }

    pub fn i2c_mut(&mut self) -> &mut I {
        &mut self.i2c
    }

    pub fn interrupt_pin(&self) -> &P {
        &self.interrupt
    }

    pub fn is_interrupt_asserted(&self) -> bool {
        self.asserted
    }

    pub fn is_reset_pending(&self) -> bool {
        self.reset_pending
    }

    pub fn power_state(&self) -> PowerState {
        self.power
    }

    pub fn selected_register(&self) -> Option<u16> {
        self.selected
    }

    pub fn pending_input_reports(&self) -> usize {
        self.reports.len()
    }

    /// Queues a report for the master and asserts the interrupt line. A full queue drops the
    /// report and leaves the line as it is.
    pub fn submit_input_report(
        &mut self,
        report: BootKeyboardInputReport,
    ) -> Result<(), BridgeError> {
        if self.reports.push(report).is_err() {
            warn!("Input report queue full, dropping report");
            return Err(BridgeError::QueueFull);
        }
        self.set_interrupt(true);
        Ok(())
    }

    pub fn has_output_report(&self) -> bool {
        self.output.is_some()
    }

    /// Returns the LED report last written by the master, once
    pub fn take_output_report(&mut self) -> Option<BootKeyboardOutputReport> {
        self.output.take()
    }

    pub fn on_event(&mut self, event: I2cSlaveEvent) {
        match event {
            I2cSlaveEvent::Receive => self.receive(),
            I2cSlaveEvent::Request => {
                if self.selected.is_some() {
                    self.reply();
                } else {
                    self.read_input_register();
                }
            }
            I2cSlaveEvent::Finish => {
                if self.selected.is_none() && self.register_id_len != 0 {
                    debug!("Transaction ended inside a register id, dropping it");
                    self.register_id_len = 0;
                }
                if self.inbound_len != 0 {
                    self.reply();
                }
            }
        }
    }

    fn receive(&mut self) {
        if self.selected.is_none() {
            self.register_id_len += self
                .i2c
                .read(&mut self.register_id[self.register_id_len..]);
            if self.register_id_len < REGISTER_ID_LEN {
                return;
            }

            let register = u16::from_le_bytes(self.register_id);
            trace!("Register {:#06x} selected", register);
            self.selected = Some(register);
            self.register_id_len = 0;
            self.inbound_len = 0;
        }

        self.inbound_len += self.i2c.read(&mut self.inbound[self.inbound_len..]);

        if self.inbound_len == INBOUND_BUFFER_SIZE {
            let mut discard = [0; INBOUND_BUFFER_SIZE];
            loop {
                let dropped = self.i2c.read(&mut discard);
                if dropped == 0 {
                    break;
                }
                debug!("Inbound buffer full, discarded {} bytes", dropped);
            }
        }
    }

    /// Answers a read of the input register, which the master does without selecting a register
    fn read_input_register(&mut self) {
        if self.reset_pending {
            stream(&mut self.i2c, self.config.spin, &[0, 0]);
            self.reset_pending = false;
            self.set_interrupt(false);
            return;
        }

        match self.reports.pop() {
            Some(report) => match report.to_bytes() {
                Ok(bytes) => {
                    let mut frame = [0; INPUT_REPORT_LEN as usize];
                    frame[..2].copy_from_slice(&INPUT_REPORT_LEN.to_le_bytes());
                    frame[2..].copy_from_slice(&bytes);
                    stream(&mut self.i2c, self.config.spin, &frame);
                    self.input = report;
                }
                Err(e) => warn!("Failed to serialize input report: {:?}", e),
            },
            // a zero length read tells the master there is nothing to fetch
            None => stream(&mut self.i2c, self.config.spin, &[0, 0]),
        }

        if self.reports.is_empty() {
            self.set_interrupt(false);
        }
    }

    /// Acts on the bytes written to the selected register, or sends its contents if nothing was
    /// written. Consumes the selection.
    fn reply(&mut self) {
        let Some(register) = self.selected.take() else {
            return;
        };
        let len = self.inbound_len;
        self.inbound_len = 0;

        if len != 0 {
            let inbound = self.inbound;
            match Register::try_from(register) {
                Ok(Register::Command) => {
                    if let Some(command) = Command::parse(&inbound[..len]) {
                        self.execute(&command);
                    }
                }
                Ok(Register::Output) if len >= 3 => {
                    let data_len = u16::from_le_bytes([inbound[0], inbound[1]]);
                    self.set_report(Some(ReportType::Output), data_len, &inbound[2..len]);
                }
                _ => trace!("Ignoring {} bytes written to register {:#06x}", len, register),
            }
            return;
        }

        let spin = self.config.spin;
        match Register::try_from(register) {
            Ok(Register::HidDescriptor) => match self.descriptor.to_bytes() {
                Ok(bytes) => stream(&mut self.i2c, spin, &bytes),
                Err(e) => warn!("Failed to serialize HID descriptor: {:?}", e),
            },
            Ok(Register::ReportDescriptor) => stream(&mut self.i2c, spin, REPORT_DESCRIPTOR),
            Ok(Register::Data) => stream(&mut self.i2c, spin, &self.data),
            _ => trace!("Nothing to read from register {:#06x}", register),
        }
    }

    fn execute(&mut self, command: &Command) {
        trace!("Command {:?}", command.op_code);
        match command.op_code {
            Some(OpCode::Reset) => {
                info!("Reset requested by the host");
                self.reset();
                self.reset_pending = true;
                self.set_interrupt(true);
            }
            Some(OpCode::GetReport) => {
                if command.report_type == Some(ReportType::Input) {
                    let contents = self.input_bytes();
                    self.fill_data_register(&contents);
                } else {
                    debug!("Unsupported GET_REPORT {:?}", command.report_type);
                }
            }
            Some(OpCode::SetReport) => {
                self.set_report(command.report_type, command.data_len, command.data);
            }
            Some(OpCode::GetProtocol) => {
                let [len_lo, len_hi] = 4u16.to_le_bytes();
                self.fill_data_register(&[len_lo, len_hi, Protocol::Report.into(), 0]);
            }
            Some(OpCode::SetPower) => match command.power_state() {
                Some(PowerState::On) => {
                    self.power = PowerState::On;
                    if !self.reports.is_empty() {
                        self.set_interrupt(true);
                    }
                }
                Some(PowerState::Sleep) => {
                    self.power = PowerState::Sleep;
                    self.set_interrupt(false);
                }
                None => debug!("Unknown power state {}", command.argument),
            },
            Some(OpCode::GetIdle | OpCode::SetIdle | OpCode::SetProtocol) | None => {}
        }
    }

    fn input_bytes(&self) -> [u8; INPUT_REPORT_LEN as usize] {
        let mut bytes = [0; INPUT_REPORT_LEN as usize];
        bytes[..2].copy_from_slice(&INPUT_REPORT_LEN.to_le_bytes());
        if let Ok(report) = self.input.to_bytes() {
            bytes[2..].copy_from_slice(&report);
        }
        bytes
    }

    /// Stages `contents` in the data register and selects it for the next read
    fn fill_data_register(&mut self, contents: &[u8]) {
        self.data.clear();
        let len = contents.len().min(DATA_REGISTER_SIZE);
        // cannot fail, the length is clamped to the capacity
        let _ = self.data.extend_from_slice(&contents[..len]);
        self.selected = Some(Register::Data.into());
    }

    fn set_report(&mut self, report_type: Option<ReportType>, data_len: u16, data: &[u8]) {
        match (report_type, data_len, data.first()) {
            (Some(ReportType::Output), OUTPUT_REPORT_LEN, Some(&byte)) => {
                match BootKeyboardOutputReport::from_byte(byte) {
                    Ok(report) => {
                        trace!("Output report {:?}", report);
                        self.output = Some(report);
                    }
                    Err(e) => warn!("Failed to parse output report: {:?}", e),
                }
            }
            _ => debug!(
                "Ignoring SET_REPORT {:?} with length {}",
                report_type, data_len
            ),
        }
    }

    fn reset(&mut self) {
        self.selected = None;
        self.register_id_len = 0;
        self.inbound_len = 0;
        self.data.clear();
        self.input = BootKeyboardInputReport::default();
        self.power = PowerState::On;
        self.reports.clear();
        self.output = None;
    }

    fn set_interrupt(&mut self, asserted: bool) {
        let high = asserted == (self.config.interrupt_polarity == InterruptPolarity::ActiveHigh);
        let result = if high {
            self.interrupt.set_high()
        } else {
            self.interrupt.set_low()
        };
        if result.is_err() {
            warn!("Failed to drive the interrupt line");
        }
        self.asserted = asserted;
    }
}
