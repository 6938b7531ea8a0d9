//! [`HostController`] over the RP2040 USBCTRL registers and DPSRAM.

use core::ptr::{read_volatile, write_volatile};

use hid_i2c_bridge::usb::regs::data_buffer_offset;
use hid_i2c_bridge::usb::HostController;
use rp_pico::hal::clocks::UsbClock;
use rp_pico::hal::pac;

const DPRAM_SIZE: usize = 4096;

/// EPX endpoint control, the first word after the buffer control array. The PAC only maps the
/// device mode layout of DPSRAM, which ends before it.
const EPX_CONTROL: usize = 0x100;

/// Interrupt slot `n` (1..=15) uses the words the device layout calls EPn_IN_CONTROL
const fn endpoint_control_index(slot: usize) -> usize {
    2 * (slot - 1)
}

/// EPX uses EP0_IN_BUFFER_CONTROL, interrupt slot `n` EPn_IN_BUFFER_CONTROL
const fn buffer_control_index(slot: usize) -> usize {
    2 * slot
}

/// Owns the controller's register blocks so nothing else can touch them.
pub struct Rp2040HostController {
    regs: pac::USBCTRL_REGS,
    dpram: pac::USBCTRL_DPRAM,
    _clock: UsbClock,
}

impl Rp2040HostController {
    /// Takes the controller out of reset. The 48 MHz clock is held so it cannot be
    /// reconfigured while the controller runs.
    pub fn new(
        regs: pac::USBCTRL_REGS,
        dpram: pac::USBCTRL_DPRAM,
        clock: UsbClock,
        resets: &mut pac::RESETS,
    ) -> Self {
        resets.reset().modify(|_, w| w.usbctrl().set_bit());
        resets.reset().modify(|_, w| w.usbctrl().clear_bit());
        while resets.reset_done().read().usbctrl().bit_is_clear() {}

        Self {
            regs,
            dpram,
            _clock: clock,
        }
    }

    /// Words past the mapped registers: EPX control and the data buffers
    fn dpram_bytes(&self) -> *mut u8 {
        pac::USBCTRL_DPRAM::ptr() as *mut u8
    }
}

impl HostController for Rp2040HostController {
    fn enable_host_mode(&mut self, sie_ctrl: u32, inte: u32) {
        self.dpram.setup_packet_low().write(|w| unsafe { w.bits(0) });
        self.dpram.setup_packet_high().write(|w| unsafe { w.bits(0) });
        for control in self.dpram.ep_control_iter() {
            control.write(|w| unsafe { w.bits(0) });
        }
        for control in self.dpram.ep_buffer_control_iter() {
            control.write(|w| unsafe { w.bits(0) });
        }
        let base = self.dpram_bytes();
        for offset in (EPX_CONTROL..DPRAM_SIZE).step_by(4) {
            // SAFETY: word aligned and inside DPSRAM, which self owns
            unsafe { write_volatile(base.add(offset) as *mut u32, 0) }
        }

        self.regs
            .usb_muxing()
            .write(|w| w.to_phy().set_bit().softcon().set_bit());
        self.regs
            .usb_pwr()
            .write(|w| w.vbus_detect().set_bit().vbus_detect_override_en().set_bit());
        self.regs
            .main_ctrl()
            .write(|w| w.controller_en().set_bit().host_ndevice().set_bit());
        self.regs.sie_ctrl().write(|w| unsafe { w.bits(sie_ctrl) });
        self.regs.inte().write(|w| unsafe { w.bits(inte) });
    }

    fn interrupt_status(&self) -> u32 {
        self.regs.ints().read().bits()
    }

    fn sie_status(&self) -> u32 {
        self.regs.sie_status().read().bits()
    }

    fn clear_sie_status(&mut self, bits: u32) {
        self.regs.sie_status().write(|w| unsafe { w.bits(bits) });
    }

    fn set_sie_ctrl(&mut self, value: u32) {
        self.regs.sie_ctrl().write(|w| unsafe { w.bits(value) });
    }

    fn set_addr_endp(&mut self, value: u32) {
        self.regs.addr_endp().write(|w| unsafe { w.bits(value) });
    }

    fn set_int_addr_endp(&mut self, slot: usize, value: u32) {
        let regs = &self.regs;
        unsafe {
            match slot {
                1 => {
                    regs.addr_endp1().write(|w| w.bits(value));
                }
                2 => {
                    regs.addr_endp2().write(|w| w.bits(value));
                }
                3 => {
                    regs.addr_endp3().write(|w| w.bits(value));
                }
                4 => {
                    regs.addr_endp4().write(|w| w.bits(value));
                }
                5 => {
                    regs.addr_endp5().write(|w| w.bits(value));
                }
                6 => {
                    regs.addr_endp6().write(|w| w.bits(value));
                }
                7 => {
                    regs.addr_endp7().write(|w| w.bits(value));
                }
                8 => {
                    regs.addr_endp8().write(|w| w.bits(value));
                }
                9 => {
                    regs.addr_endp9().write(|w| w.bits(value));
                }
                10 => {
                    regs.addr_endp10().write(|w| w.bits(value));
                }
                11 => {
                    regs.addr_endp11().write(|w| w.bits(value));
                }
                12 => {
                    regs.addr_endp12().write(|w| w.bits(value));
                }
                13 => {
                    regs.addr_endp13().write(|w| w.bits(value));
                }
                14 => {
                    regs.addr_endp14().write(|w| w.bits(value));
                }
                15 => {
                    regs.addr_endp15().write(|w| w.bits(value));
                }
                _ => log::warn!("No interrupt endpoint slot {}", slot),
            }
        }
    }

    fn set_int_ep_ctrl(&mut self, mask: u32) {
        self.regs.int_ep_ctrl().write(|w| unsafe { w.bits(mask) });
    }

    fn buff_status(&self) -> u32 {
        self.regs.buff_status().read().bits()
    }

    fn clear_buff_status(&mut self, bits: u32) {
        self.regs.buff_status().write(|w| unsafe { w.bits(bits) });
    }

    fn write_setup_packet(&mut self, packet: &[u8; 8]) {
        let low = u32::from_le_bytes([packet[0], packet[1], packet[2], packet[3]]);
        let high = u32::from_le_bytes([packet[4], packet[5], packet[6], packet[7]]);
        self.dpram.setup_packet_low().write(|w| unsafe { w.bits(low) });
        self.dpram.setup_packet_high().write(|w| unsafe { w.bits(high) });
    }

    fn set_endpoint_control(&mut self, slot: usize, value: u32) {
        if slot == 0 {
            // SAFETY: EPX control is a word inside DPSRAM, which self owns
            unsafe { write_volatile(self.dpram_bytes().add(EPX_CONTROL) as *mut u32, value) }
        } else {
            self.dpram
                .ep_control(endpoint_control_index(slot))
                .write(|w| unsafe { w.bits(value) });
        }
    }

    fn buffer_control(&self, slot: usize) -> u32 {
        self.dpram
            .ep_buffer_control(buffer_control_index(slot))
            .read()
            .bits()
    }

    fn set_buffer_control(&mut self, slot: usize, value: u32) {
        self.dpram
            .ep_buffer_control(buffer_control_index(slot))
            .write(|w| unsafe { w.bits(value) });
    }

    fn write_buffer(&mut self, slot: usize, data: &[u8]) {
        let base = data_buffer_offset(slot) as usize;
        let dpram = self.dpram_bytes();
        for (i, byte) in data.iter().enumerate() {
            // SAFETY: data never exceeds the 64 byte buffer of the slot
            unsafe { write_volatile(dpram.add(base + i), *byte) }
        }
    }

    fn read_buffer(&self, slot: usize, data: &mut [u8]) {
        let base = data_buffer_offset(slot) as usize;
        let dpram = self.dpram_bytes();
        for (i, byte) in data.iter_mut().enumerate() {
            // SAFETY: as write_buffer
            *byte = unsafe { read_volatile(dpram.add(base + i)) };
        }
    }
}
