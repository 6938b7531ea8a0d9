//! Per slot transfer bookkeeping.
//!
//! A transfer longer than one hardware buffer is split into chunks of `max(M, 64)` bytes,
//! where `M` is the endpoint's max packet size. Each chunk is handed to the controller and the
//! next one is submitted from the buffer status interrupt until nothing remains.

use log::trace;
use usb_device::endpoint::EndpointType;
use usb_device::UsbDirection;

use super::regs::{addr_endp, buf_ctrl, data_buffer_offset, ep_ctrl, sie_ctrl, HostController};

/// Endpoint owned transfer buffer, also the upper bound of a single transfer
pub const TRANSFER_BUFFER_SIZE: usize = 256;
/// Smallest chunk the controller is handed
const MIN_CHUNK: u16 = 64;
/// EP0 max packet size until the device descriptor says otherwise
pub const DEFAULT_MAX_PACKET_SIZE: u16 = 64;

#[derive(Clone)]
pub struct Endpoint {
    slot: usize,
    direction: UsbDirection,
    transfer_type: EndpointType,
    device_address: u8,
    number: u8,
    max_packet_size: u16,
    interval: u8,

    total_len: u16,
    transferred: u16,
    chunk: u16,
    last: bool,
    /// DATA1 when set
    pid: bool,
    /// Buffer half the controller reports the next completion in, see RP2040-E4
    buffer_selector: bool,
    active: bool,
    setup: bool,

    completed_len: u16,
    buffer: [u8; TRANSFER_BUFFER_SIZE],
}

impl Endpoint {
    pub const fn new(slot: usize) -> Self {
        Self {
            slot,
            direction: UsbDirection::Out,
            transfer_type: if slot == 0 {
                EndpointType::Control
            } else {
                EndpointType::Interrupt
            },
            device_address: 0,
            number: 0,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            interval: 0,
            total_len: 0,
            transferred: 0,
            chunk: 0,
            last: false,
            pid: false,
            buffer_selector: false,
            active: false,
            setup: false,
            completed_len: 0,
            buffer: [0; TRANSFER_BUFFER_SIZE],
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_setup(&self) -> bool {
        self.setup
    }

    pub fn direction(&self) -> UsbDirection {
        self.direction
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn max_packet_size(&self) -> u16 {
        self.max_packet_size
    }

    pub fn set_max_packet_size(&mut self, max_packet_size: u16) {
        self.max_packet_size = max_packet_size.max(1);
    }

    pub fn pid(&self) -> bool {
        self.pid
    }

    /// Data moved by the last completed transfer
    pub fn data(&self) -> &[u8] {
        &self.buffer[..usize::from(self.completed_len)]
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Binds the slot to an endpoint of the device and programs its endpoint control register
    #[allow(clippy::too_many_arguments)]
    pub fn configure<H: HostController>(
        &mut self,
        controller: &mut H,
        device_address: u8,
        number: u8,
        direction: UsbDirection,
        max_packet_size: u16,
        transfer_type: EndpointType,
        interval: u8,
    ) {
        self.device_address = device_address;
        self.number = number;
        self.direction = direction;
        self.interval = interval;
        self.pid = number == 0;
        self.set_max_packet_size(max_packet_size);
        self.transfer_type = transfer_type;

        let mut control = ep_ctrl::ENABLE
            | ep_ctrl::INT_PER_BUFFER
            | ((transfer_type as u32) << ep_ctrl::TYPE_LSB)
            | data_buffer_offset(self.slot);
        if interval != 0 {
            control |= u32::from(interval - 1) << ep_ctrl::HOST_INT_INTERVAL_LSB;
        }
        controller.set_endpoint_control(self.slot, control);

        if interval != 0 && self.slot != 0 {
            let mut target = u32::from(device_address)
                | (u32::from(number) << addr_endp::ENDPOINT_LSB);
            if direction == UsbDirection::Out {
                target |= addr_endp::INTEP_DIR;
            }
            controller.set_int_addr_endp(self.slot, target);
        }
    }

    /// Sends the SETUP stage of a control transfer. EPX only.
    pub fn start_setup<H: HostController>(
        &mut self,
        controller: &mut H,
        device_address: u8,
        packet: &[u8; 8],
    ) {
        controller.write_setup_packet(packet);

        self.configure(
            controller,
            device_address,
            0,
            UsbDirection::Out,
            self.max_packet_size,
            EndpointType::Control,
            0,
        );
        self.total_len = 8;
        self.chunk = 8;
        self.active = true;
        self.setup = true;

        controller.set_addr_endp(u32::from(device_address));
        controller.set_sie_ctrl(sie_ctrl::BASE | sie_ctrl::SEND_SETUP | sie_ctrl::START_TRANS);
    }

    /// Fills the transfer buffer for the next host to device transfer
    pub fn load(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(TRANSFER_BUFFER_SIZE);
        self.buffer[..len].copy_from_slice(&data[..len]);
        len
    }

    /// Starts a transfer of `len` bytes, for host to device transfers the data must already
    /// be in the buffer (see [`Endpoint::load`]).
    pub fn start<H: HostController>(
        &mut self,
        controller: &mut H,
        device_address: u8,
        number: u8,
        direction: UsbDirection,
        len: u16,
    ) {
        if self.device_address != device_address || self.direction != direction {
            self.configure(
                controller,
                device_address,
                number,
                direction,
                self.max_packet_size,
                self.transfer_type,
                self.interval,
            );
        }

        self.active = true;
        self.transferred = 0;
        self.total_len = len.min(TRANSFER_BUFFER_SIZE as u16);
        self.chunk = self.next_chunk();
        self.last = self.transferred + self.chunk >= self.total_len;
        self.buffer_selector = false;

        self.submit_chunk(controller);

        if self.slot == 0 {
            controller.set_addr_endp(
                u32::from(device_address) | (u32::from(number) << addr_endp::ENDPOINT_LSB),
            );
            let data = match direction {
                UsbDirection::In => sie_ctrl::RECEIVE_DATA,
                UsbDirection::Out => sie_ctrl::SEND_DATA,
            };
            controller.set_sie_ctrl(sie_ctrl::BASE | sie_ctrl::START_TRANS | data);
        }
    }

    fn next_chunk(&self) -> u16 {
        let remaining = self.total_len.saturating_sub(self.transferred);
        remaining.min(self.max_packet_size.max(MIN_CHUNK))
    }

    fn submit_chunk<H: HostController>(&mut self, controller: &mut H) {
        let mut control = u32::from(self.chunk);

        if self.direction == UsbDirection::Out {
            let start = usize::from(self.transferred);
            let end = start + usize::from(self.chunk);
            controller.write_buffer(self.slot, &self.buffer[start..end]);
            control |= buf_ctrl::FULL_0;
        }

        if self.pid {
            control |= buf_ctrl::DATA_PID_0;
        }

        // toggle once per packet the chunk is split into
        let packets = if self.chunk == 0 {
            1
        } else {
            (self.chunk + self.max_packet_size - 1) / self.max_packet_size
        };
        if packets % 2 == 1 {
            self.pid = !self.pid;
        }

        if self.last {
            control |= buf_ctrl::LAST_0;
        }

        trace!(
            "Slot {} submit {} of {} bytes, control {:#x}",
            self.slot,
            self.chunk,
            self.total_len,
            control
        );

        controller.set_buffer_control(self.slot, control);
        // AVAILABLE only once the rest of the register is stable
        controller.set_buffer_control(self.slot, control | buf_ctrl::AVAILABLE_0);
    }

    /// Handles a buffer completion. Returns the number of bytes the transfer moved once it is
    /// done, otherwise the next chunk is submitted and `None` returned.
    pub fn advance<H: HostController>(&mut self, controller: &mut H) -> Option<u16> {
        let mut control = controller.buffer_control(self.slot);

        // RP2040-E4: in single buffered host mode the status of every second completion is
        // written to the upper half of the register
        if self.buffer_selector {
            control >>= 16;
            controller.set_buffer_control(self.slot, control);
        }
        self.buffer_selector = !self.buffer_selector;

        let received = ((control & buf_ctrl::LEN_MASK) as u16).min(self.chunk);

        if self.direction == UsbDirection::In {
            let start = usize::from(self.transferred);
            let end = start + usize::from(received);
            controller.read_buffer(self.slot, &mut self.buffer[start..end]);
        }
        self.transferred += received;

        // short packet ends an IN transfer early
        if self.direction == UsbDirection::In && received < self.chunk {
            self.total_len = self.transferred;
        }

        self.chunk = self.next_chunk();
        self.last = self.transferred + self.chunk >= self.total_len;

        if self.transferred >= self.total_len {
            self.completed_len = self.transferred;
            Some(self.transferred)
        } else {
            self.submit_chunk(controller);
            None
        }
    }

    /// Returns the slot to idle after a transfer, the binding to the device endpoint is kept
    pub fn finish(&mut self) {
        self.total_len = 0;
        self.transferred = 0;
        self.chunk = 0;
        self.active = false;
        self.setup = false;
    }

    /// Marks the SETUP stage sent
    pub fn finish_setup(&mut self) {
        if self.setup {
            self.completed_len = 0;
            self.finish();
        }
    }

    /// Forgets the device this slot was bound to
    pub fn clear(&mut self) {
        let slot = self.slot;
        *self = Self::new(slot);
    }
}
