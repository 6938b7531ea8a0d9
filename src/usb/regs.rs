//! RP2040 USB controller register fields used in host mode, and the trait the engine drives
//! the controller through.

/// DPSRAM offset of the first endpoint data buffer, slot `n` uses `DATA_BUFFER_BASE + 64 * n`
pub const DATA_BUFFER_BASE: u32 = 0x180;
/// Size of each endpoint data buffer in DPSRAM
pub const DATA_BUFFER_SIZE: u32 = 64;

pub const fn data_buffer_offset(slot: usize) -> u32 {
    DATA_BUFFER_BASE + DATA_BUFFER_SIZE * slot as u32
}

pub mod sie_ctrl {
    pub const START_TRANS: u32 = 1 << 0;
    pub const SEND_SETUP: u32 = 1 << 1;
    pub const SEND_DATA: u32 = 1 << 2;
    pub const RECEIVE_DATA: u32 = 1 << 3;
    pub const SOF_EN: u32 = 1 << 9;
    pub const KEEP_ALIVE_EN: u32 = 1 << 10;
    pub const PULLDOWN_EN: u32 = 1 << 15;
    pub const EP0_INT_1BUF: u32 = 1 << 29;

    /// Bits kept set in every write
    pub const BASE: u32 = KEEP_ALIVE_EN | SOF_EN | PULLDOWN_EN | EP0_INT_1BUF;
}

pub mod sie_status {
    pub const SPEED_LSB: u32 = 8;
    pub const SPEED: u32 = 0b11 << SPEED_LSB;
    pub const RESUME: u32 = 1 << 11;
    pub const TRANS_COMPLETE: u32 = 1 << 18;
    pub const CRC_ERROR: u32 = 1 << 24;
    pub const BIT_STUFF_ERROR: u32 = 1 << 25;
    pub const RX_TIMEOUT: u32 = 1 << 27;
    pub const STALL_REC: u32 = 1 << 29;
    pub const DATA_SEQ_ERROR: u32 = 1 << 31;
}

/// Bits shared by INTE and INTS
pub mod ints {
    pub const HOST_CONN_DIS: u32 = 1 << 0;
    pub const HOST_RESUME: u32 = 1 << 1;
    pub const TRANS_COMPLETE: u32 = 1 << 3;
    pub const BUFF_STATUS: u32 = 1 << 4;
    pub const ERROR_DATA_SEQ: u32 = 1 << 5;
    pub const ERROR_RX_TIMEOUT: u32 = 1 << 6;
    pub const ERROR_BIT_STUFF: u32 = 1 << 8;
    pub const ERROR_CRC: u32 = 1 << 9;
    pub const STALL: u32 = 1 << 10;

    pub const ENABLED: u32 = BUFF_STATUS
        | HOST_CONN_DIS
        | HOST_RESUME
        | STALL
        | TRANS_COMPLETE
        | ERROR_RX_TIMEOUT
        | ERROR_DATA_SEQ
        | ERROR_CRC
        | ERROR_BIT_STUFF;
}

pub mod buf_ctrl {
    pub const LEN_MASK: u32 = 0x3FF;
    pub const AVAILABLE_0: u32 = 1 << 10;
    pub const DATA_PID_0: u32 = 1 << 13;
    pub const LAST_0: u32 = 1 << 14;
    pub const FULL_0: u32 = 1 << 15;
}

pub mod ep_ctrl {
    pub const ENABLE: u32 = 1 << 31;
    pub const INT_PER_BUFFER: u32 = 1 << 29;
    pub const TYPE_LSB: u32 = 26;
    pub const HOST_INT_INTERVAL_LSB: u32 = 16;
}

pub mod addr_endp {
    pub const ENDPOINT_LSB: u32 = 16;
    /// Interrupt endpoint direction, set for host to device
    pub const INTEP_DIR: u32 = 1 << 25;
}

/// Register and DPSRAM access the host engine needs from the USB controller.
///
/// Slot 0 is EPX, the single endpoint the controller uses for control transfers, slots 1 to 15
/// are the hardware polled interrupt endpoints. Writes to `*_status` registers clear the bits
/// that are set in the written value.
pub trait HostController {
    /// Clears DPSRAM, connects the controller to the PHY with VBUS detection forced and
    /// switches it to host mode with the given SIE_CTRL and INTE values. The controller is
    /// expected to be out of reset already.
    fn enable_host_mode(&mut self, sie_ctrl: u32, inte: u32);

    fn interrupt_status(&self) -> u32;

    fn sie_status(&self) -> u32;
    fn clear_sie_status(&mut self, bits: u32);

    fn set_sie_ctrl(&mut self, value: u32);

    /// ADDR_ENDP, target of the next EPX transaction
    fn set_addr_endp(&mut self, value: u32);
    /// ADDR_ENDP1 to ADDR_ENDP15, target polled by interrupt slot `slot`
    fn set_int_addr_endp(&mut self, slot: usize, value: u32);
    fn set_int_ep_ctrl(&mut self, mask: u32);

    fn buff_status(&self) -> u32;
    fn clear_buff_status(&mut self, bits: u32);

    fn write_setup_packet(&mut self, packet: &[u8; 8]);

    fn set_endpoint_control(&mut self, slot: usize, value: u32);
    fn buffer_control(&self, slot: usize) -> u32;
    fn set_buffer_control(&mut self, slot: usize, value: u32);

    /// Copies `data` to the start of the slot's data buffer
    fn write_buffer(&mut self, slot: usize, data: &[u8]);
    /// Fills `data` from the start of the slot's data buffer
    fn read_buffer(&self, slot: usize, data: &mut [u8]);
}
