//! USB host transfer engine.
//!
//! Drives the RP2040 USB controller in host mode for a single boot keyboard: detects attach and
//! detach, enumerates the device with blocking control transfers and keeps an interrupt IN
//! transfer armed on the keyboard's report endpoint. Reports end up in a [`ReportRelay`] the main
//! loop drains with [`UsbHost::next_report`].
//!
//! [`UsbHost::on_interrupt`] is the controller interrupt handler. The enumeration and driver load
//! steps run from the main loop; while they wait on a control transfer stage they call
//! [`UsbHost::on_interrupt`] themselves, so they also make progress when the controller
//! interrupt is masked.

use delegate::delegate;
use embedded_hal::delay::DelayNs;
use log::{debug, error, info, trace, warn};
use usb_device::endpoint::EndpointType;
use usb_device::UsbDirection;

use crate::config::HostConfig;
use crate::events::{EventKind, EventQueue};
use crate::hid::{
    BootKeyboardInputReport, BootKeyboardOutputReport, ReportRelay, BOOT_KEYBOARD_REPORT_SIZE,
};
use crate::spin::spin_until;
use crate::BridgeError;

pub mod descriptor;
pub mod endpoint;
pub mod regs;
pub mod setup;


use descriptor::{
    scan_configuration, ConfigurationDescriptor, DeviceDescriptor, InterruptEndpoint,
    DEVICE_DESCRIPTOR_LEN,
};
pub use endpoint::Endpoint;
use endpoint::{DEFAULT_MAX_PACKET_SIZE, TRANSFER_BUFFER_SIZE};
use regs::{ints, sie_ctrl, sie_status};
pub use regs::HostController;
use setup::HidProtocol;
pub use setup::SetupPacket;

pub const ENDPOINT_SLOTS: usize = 16;
/// EPX, used for every control transfer
pub const CONTROL_SLOT: usize = 0;
/// Interrupt slot polling the keyboard's report endpoint
pub const HID_IN_SLOT: usize = 1;
/// Interrupt slot carrying LED reports, when the keyboard has an interrupt OUT endpoint
pub const HID_OUT_SLOT: usize = 2;

/// Bus level errors reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferFault {
    RxTimeout,
    DataSequence,
    Crc,
    BitStuff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    #[default]
    Absent,
    Attached,
    Enumerating,
    Enumerated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    #[default]
    Disconnected,
    Low,
    Full,
}

impl Speed {
    fn from_sie_status(status: u32) -> Self {
        match (status & sie_status::SPEED) >> sie_status::SPEED_LSB {
            1 => Speed::Low,
            2 => Speed::Full,
            _ => Speed::Disconnected,
        }
    }
}

/// What is known about the attached device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbDevice {
    pub state: DeviceState,
    pub hid_driver_loaded: bool,
    pub address: u8,
    pub speed: Speed,
    pub max_packet_size_0: u16,
    pub vendor_id: u16,
    pub product_id: u16,
    pub configuration_count: u8,
    pub interface_count: u8,
    pub hid_interface: Option<u8>,
    pub interrupt_in: Option<InterruptEndpoint>,
    pub interrupt_out: Option<InterruptEndpoint>,
}

impl Default for UsbDevice {
    fn default() -> Self {
        Self {
            state: DeviceState::Absent,
            hid_driver_loaded: false,
            address: 0,
            speed: Speed::Disconnected,
            max_packet_size_0: DEFAULT_MAX_PACKET_SIZE,
            vendor_id: 0,
            product_id: 0,
            configuration_count: 0,
            interface_count: 0,
            hid_interface: None,
            interrupt_in: None,
            interrupt_out: None,
        }
    }
}

pub struct UsbHost<H: HostController> {
    controller: H,
    config: HostConfig,
    device: UsbDevice,
    endpoints: [Endpoint; ENDPOINT_SLOTS],
    relay: ReportRelay,
    /// INT_EP_CTRL, one bit per armed interrupt slot
    interrupt_slots: u32,
    /// Error latched while EPX was busy, returned by the waiting control transfer
    fault: Option<BridgeError>,
    /// Length of the data stage of the last control transfer
    control_len: u16,
}

impl<H: HostController> UsbHost<H> {
    pub fn new(controller: H, config: HostConfig) -> Self {
        Self {
            controller,
            config,
            device: UsbDevice::default(),
            endpoints: core::array::from_fn(Endpoint::new),
            relay: ReportRelay::new(),
            interrupt_slots: 0,
            fault: None,
            control_len: 0,
        }
    }

    /// Puts the controller in host mode and enables its interrupts
    pub fn init(&mut self) {
        self.device = UsbDevice::default();
        self.endpoints.iter_mut().for_each(Endpoint::clear);
        self.interrupt_slots = 0;
        self.fault = None;

        self.controller.enable_host_mode(sie_ctrl::BASE, ints::ENABLED);
        info!("USB host mode enabled");
    }

    pub fn device(&self) -> &UsbDevice {
        &self.device
    }

    pub fn endpoint(&self, slot: usize) -> Option<&Endpoint> {
        self.endpoints.get(slot)
    }

    pub fn controller(&self) -> &H {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut H {
        &mut self.controller
    }

    delegate! {
        to self.relay {
            pub fn has_report(&self) -> bool;
            pub fn next_report(&mut self) -> Option<BootKeyboardInputReport>;
        }
    }

    /// Data stage of the last control transfer
    pub fn control_data(&self) -> &[u8] {
        &self.endpoints[CONTROL_SLOT].buffer()[..usize::from(self.control_len)]
    }

    /// Services the controller status. Call from the USBCTRL interrupt.
    pub fn on_interrupt(&mut self, events: &mut EventQueue) {
        let status = self.controller.interrupt_status();

        if status & ints::HOST_CONN_DIS != 0 {
            let speed = Speed::from_sie_status(self.controller.sie_status());
            debug!("Connection change, speed {:?}", speed);
            if speed == Speed::Disconnected {
                self.abandon_control(BridgeError::NotConnected);
                events.push(EventKind::UsbDeviceDetached).ok();
            } else {
                self.device.speed = speed;
                events.push(EventKind::UsbDeviceAttached).ok();
            }
            self.controller.clear_sie_status(sie_status::SPEED);
        }

        if status & ints::HOST_RESUME != 0 {
            debug!("Resume signalled");
            self.controller.clear_sie_status(sie_status::RESUME);
        }

        if status & ints::TRANS_COMPLETE != 0 {
            self.endpoints[CONTROL_SLOT].finish_setup();
            self.controller.clear_sie_status(sie_status::TRANS_COMPLETE);
        }

        if status & ints::BUFF_STATUS != 0 {
            self.handle_buff_status(events);
        }

        if status & ints::STALL != 0 {
            warn!("STALL received");
            self.controller.clear_sie_status(sie_status::STALL_REC);
            self.abandon_control(BridgeError::Stall);
        }

        let faults = [
            (ints::ERROR_RX_TIMEOUT, sie_status::RX_TIMEOUT, TransferFault::RxTimeout),
            (ints::ERROR_DATA_SEQ, sie_status::DATA_SEQ_ERROR, TransferFault::DataSequence),
            (ints::ERROR_CRC, sie_status::CRC_ERROR, TransferFault::Crc),
            (ints::ERROR_BIT_STUFF, sie_status::BIT_STUFF_ERROR, TransferFault::BitStuff),
        ];
        for (mask, sie, fault) in faults {
            if status & mask != 0 {
                warn!("Transaction error {:?}", fault);
                self.controller.clear_sie_status(sie);
                self.abandon_control(BridgeError::Transaction(fault));
            }
        }
    }

    fn abandon_control(&mut self, error: BridgeError) {
        let endpoint = &mut self.endpoints[CONTROL_SLOT];
        if endpoint.is_active() {
            endpoint.finish();
            self.fault = Some(error);
        }
    }

    fn handle_buff_status(&mut self, events: &mut EventQueue) {
        let completed = self.controller.buff_status();

        for slot in 0..ENDPOINT_SLOTS {
            // IN and OUT completion bits of the slot
            let bits = completed & (0b11 << (slot * 2));
            if bits == 0 {
                continue;
            }
            self.controller.clear_buff_status(bits);

            let endpoint = &mut self.endpoints[slot];
            if !endpoint.is_active() {
                trace!("Completion on idle slot {}", slot);
                continue;
            }

            if let Some(len) = endpoint.advance(&mut self.controller) {
                endpoint.finish();
                self.transfer_done(slot, len, events);
            }
        }
    }

    fn transfer_done(&mut self, slot: usize, len: u16, events: &mut EventQueue) {
        trace!("Slot {} transfer done, {} bytes", slot, len);

        if slot == HID_IN_SLOT && self.device.hid_driver_loaded {
            self.report_received(events);
        }
    }

    fn report_received(&mut self, events: &mut EventQueue) {
        let mut bytes = [0; BOOT_KEYBOARD_REPORT_SIZE];
        let data = self.endpoints[HID_IN_SLOT].data();
        let len = data.len().min(BOOT_KEYBOARD_REPORT_SIZE);
        bytes[..len].copy_from_slice(&data[..len]);

        match BootKeyboardInputReport::from_bytes(&bytes) {
            Ok(report) => {
                // a full relay is logged by the relay itself
                self.relay.offer(report).ok();
            }
            Err(e) => warn!("Malformed input report: {:?}", e),
        }
        events.push(EventKind::HidReportAvailable).ok();

        if let Err(e) = self.arm_report_transfer() {
            error!("Could not re-arm the report transfer: {:?}", e);
        }
    }

    fn arm_report_transfer(&mut self) -> Result<(), BridgeError> {
        let input = self.device.interrupt_in.ok_or(BridgeError::NotConnected)?;
        self.endpoints[HID_IN_SLOT].start(
            &mut self.controller,
            self.device.address,
            input.number,
            UsbDirection::In,
            BOOT_KEYBOARD_REPORT_SIZE as u16,
        );
        Ok(())
    }

    fn enable_interrupt_slot(
        &mut self,
        slot: usize,
        endpoint: InterruptEndpoint,
        direction: UsbDirection,
    ) {
        self.endpoints[slot].configure(
            &mut self.controller,
            self.device.address,
            endpoint.number,
            direction,
            endpoint.max_packet_size,
            EndpointType::Interrupt,
            endpoint.interval.max(1),
        );
        self.interrupt_slots |= 1 << slot;
        self.controller.set_int_ep_ctrl(self.interrupt_slots);
    }

    /// Spins until EPX finishes the current stage
    fn wait_control(&mut self, events: &mut EventQueue) -> Result<(), BridgeError> {
        let bound = self.config.spin;
        let waited = spin_until(bound, || {
            self.on_interrupt(events);
            !self.endpoints[CONTROL_SLOT].is_active()
        });

        if let Err(e) = waited {
            warn!("Control transfer timed out");
            self.endpoints[CONTROL_SLOT].finish();
            return Err(e);
        }

        match self.fault.take() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Runs a complete control transfer on EPX and returns the length of its data stage.
    ///
    /// Received data is available from [`UsbHost::control_data`]. `data` is sent in the data
    /// stage of a host to device request and ignored otherwise.
    pub fn control_transfer(
        &mut self,
        events: &mut EventQueue,
        address: u8,
        setup: SetupPacket,
        data: &[u8],
    ) -> Result<u16, BridgeError> {
        let packet = setup.to_bytes()?;
        trace!("Control transfer to {}: {:02x?}", address, packet);

        self.fault = None;
        self.control_len = 0;

        self.endpoints[CONTROL_SLOT].start_setup(&mut self.controller, address, &packet);
        self.wait_control(events)?;

        let direction = setup.direction();
        let mut len = 0;
        if setup.length != 0 {
            let endpoint = &mut self.endpoints[CONTROL_SLOT];
            if direction == UsbDirection::Out {
                endpoint.load(data);
            }
            endpoint.start(&mut self.controller, address, 0, direction, setup.length);
            self.wait_control(events)?;
            len = self.endpoints[CONTROL_SLOT].data().len() as u16;
        }

        let status = match direction {
            UsbDirection::In => UsbDirection::Out,
            UsbDirection::Out => UsbDirection::In,
        };
        self.endpoints[CONTROL_SLOT].start(&mut self.controller, address, 0, status, 0);
        self.wait_control(events)?;

        self.control_len = len;
        Ok(len)
    }

    /// Handles [`EventKind::UsbDeviceAttached`]: enumerates the new device.
    ///
    /// Raises [`EventKind::HidDriverLoad`] when the device has a HID interface with an interrupt
    /// IN endpoint. A failed enumeration leaves the device attached until it is unplugged.
    pub fn attach<D: DelayNs>(
        &mut self,
        events: &mut EventQueue,
        delay: &mut D,
    ) -> Result<(), BridgeError> {
        if self.device.speed == Speed::Disconnected {
            return Err(BridgeError::NotConnected);
        }

        info!("USB device attached, {:?} speed", self.device.speed);
        self.device.state = DeviceState::Enumerating;

        let result = self.enumerate(events, delay);
        if let Err(e) = result {
            error!("Enumeration failed: {:?}", e);
            self.device.state = DeviceState::Attached;
        }
        result
    }

    fn enumerate<D: DelayNs>(
        &mut self,
        events: &mut EventQueue,
        delay: &mut D,
    ) -> Result<(), BridgeError> {
        let address = self.config.device_address;
        let configuration = self.config.configuration;

        // control endpoint size, the device still answers on address 0
        self.control_transfer(events, 0, SetupPacket::get_device_descriptor(8), &[])?;
        let descriptor = DeviceDescriptor::from_bytes(self.control_data())?;
        self.device.max_packet_size_0 = u16::from(descriptor.max_packet_size_0);
        self.endpoints[CONTROL_SLOT].set_max_packet_size(self.device.max_packet_size_0);

        self.control_transfer(events, 0, SetupPacket::set_address(address), &[])?;
        self.device.address = address;
        delay.delay_ms(self.config.settle_delay.to_millis());

        let len = DEVICE_DESCRIPTOR_LEN as u16;
        self.control_transfer(events, address, SetupPacket::get_device_descriptor(len), &[])?;
        let descriptor = DeviceDescriptor::from_bytes(self.control_data())?;
        self.device.vendor_id = descriptor.vendor_id;
        self.device.product_id = descriptor.product_id;
        self.device.configuration_count = descriptor.num_configurations;

        // configuration values start at 1, descriptor indices at 0
        let index = configuration
            .checked_sub(1)
            .ok_or(BridgeError::InvalidDescriptor)?;
        let header = SetupPacket::get_configuration_descriptor(index, 9);
        self.control_transfer(events, address, header, &[])?;
        let total_length = ConfigurationDescriptor::from_bytes(self.control_data())?
            .total_length
            .min(TRANSFER_BUFFER_SIZE as u16);

        let full = SetupPacket::get_configuration_descriptor(index, total_length);
        self.control_transfer(events, address, full, &[])?;
        let interface_count =
            ConfigurationDescriptor::from_bytes(self.control_data())?.num_interfaces;
        let scan = scan_configuration(self.control_data());
        self.device.interface_count = interface_count;

        let set_configuration = SetupPacket::set_configuration(configuration);
        self.control_transfer(events, address, set_configuration, &[])?;

        self.device.hid_interface = scan.hid_interface;
        self.device.interrupt_in = scan.interrupt_in;
        self.device.interrupt_out = scan.interrupt_out;
        self.device.state = DeviceState::Enumerated;

        info!(
            "Enumerated {:04x}:{:04x}, {} interface(s)",
            self.device.vendor_id, self.device.product_id, self.device.interface_count
        );

        if scan.hid_interface.is_some() && scan.interrupt_in.is_some() {
            events.push(EventKind::HidDriverLoad)?;
        } else {
            warn!("No HID interface with an interrupt IN endpoint, driver not loaded");
        }
        Ok(())
    }

    /// Handles [`EventKind::UsbDeviceDetached`]: forgets the device and every endpoint binding
    pub fn detach(&mut self) {
        info!("USB device detached");

        self.device = UsbDevice::default();
        self.endpoints.iter_mut().for_each(Endpoint::clear);
        self.interrupt_slots = 0;
        self.controller.set_int_ep_ctrl(0);
        self.fault = None;
        self.control_len = 0;
        self.relay.reset_previous();
    }

    /// Handles [`EventKind::HidDriverLoad`]: selects the boot protocol and starts polling the
    /// keyboard's report endpoint.
    pub fn load_hid_driver(&mut self, events: &mut EventQueue) -> Result<(), BridgeError> {
        let (interface, input) = match (self.device.hid_interface, self.device.interrupt_in) {
            (Some(interface), Some(input)) if self.device.state == DeviceState::Enumerated => {
                (interface, input)
            }
            _ => return Err(BridgeError::NotConnected),
        };

        let address = self.device.address;
        let boot = SetupPacket::set_protocol(interface, HidProtocol::Boot);
        self.control_transfer(events, address, boot, &[])?;

        self.enable_interrupt_slot(HID_IN_SLOT, input, UsbDirection::In);
        if let Some(output) = self.device.interrupt_out {
            self.enable_interrupt_slot(HID_OUT_SLOT, output, UsbDirection::Out);
        }

        self.device.hid_driver_loaded = true;
        self.arm_report_transfer()?;

        info!("HID boot keyboard driver loaded on interface {}", interface);
        Ok(())
    }

    /// Sends the LED state to the keyboard.
    ///
    /// Uses the interrupt OUT endpoint when the keyboard has one, the report is dropped with
    /// [`BridgeError::WouldBlock`] while the previous one is still in flight. Keyboards without
    /// one get a HID SET_REPORT control transfer, which blocks until it completes.
    pub fn send_output_report(
        &mut self,
        events: &mut EventQueue,
        report: BootKeyboardOutputReport,
    ) -> Result<(), BridgeError> {
        let interface = match self.device.hid_interface {
            Some(interface) if self.device.hid_driver_loaded => interface,
            _ => {
                debug!("No keyboard, dropping LED report");
                return Err(BridgeError::NotConnected);
            }
        };
        let byte = report.to_byte()?;
        let address = self.device.address;

        match self.device.interrupt_out {
            Some(output) => {
                let endpoint = &mut self.endpoints[HID_OUT_SLOT];
                if endpoint.is_active() {
                    debug!("LED report still in flight, dropping {:?}", report);
                    return Err(BridgeError::WouldBlock);
                }
                endpoint.load(&[byte]);
                endpoint.start(
                    &mut self.controller,
                    address,
                    output.number,
                    UsbDirection::Out,
                    1,
                );
            }
            None => {
                let set_report = SetupPacket::set_output_report(interface, 1);
                self.control_transfer(events, address, set_report, &[byte])?;
            }
        }

        trace!("LED report {:#04x} sent", byte);
        Ok(())
    }
}
