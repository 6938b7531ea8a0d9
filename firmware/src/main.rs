//! RP2040 firmware: a USB boot keyboard on the host port, replayed to an I2C master as an FT260
//! HID-over-I2C device.
//!
//! Wiring: keyboard on the micro USB port through an OTG adapter, I2C1 SDA on GPIO2, SCL on
//! GPIO3 and the HID-over-I2C interrupt line on GPIO4.

#![no_std]
#![no_main]

use core::cell::RefCell;

use arrayvec::ArrayString;
use cortex_m::interrupt::Mutex;
use defmt_rtt as _;
use hid_i2c_bridge::events::EventHandler;
use hid_i2c_bridge::prelude::*;
use log::{error, warn, LevelFilter};
use panic_probe as _;
use rp_pico::hal;

mod i2c_slave;
mod logger;
mod usb_host;

use i2c_slave::PeripheralI2c;
use usb_host::Rp2040HostController;

pub const MAX_LOG_LEVEL: LevelFilter = LevelFilter::Debug;
pub const I2C_CONTROLLER: I2cController = I2cController::I2c1;

pub static LOGGER: logger::Logger = logger::Logger {
    line: Mutex::new(RefCell::new(ArrayString::new_const())),
};

pub type Host = UsbHost<Rp2040HostController>;
pub type InterruptPin =
    hal::gpio::Pin<hal::gpio::bank0::Gpio4, hal::gpio::FunctionSioOutput, hal::gpio::PullDown>;
pub type Bridges = BridgeRegistry<PeripheralI2c, InterruptPin>;

/// What the event handlers run against, borrowed from the locked resources
pub struct Keylink<'a> {
    host: &'a mut Host,
    delay: &'a mut hal::Timer,
    /// Set when reports are waiting in the host relay
    reports_ready: bool,
}

fn on_attached(link: &mut Keylink<'_>, events: &mut EventQueue) {
    // failures are logged by the host, the device stays attached until it is unplugged
    link.host.attach(events, &mut *link.delay).ok();
}

fn on_detached(link: &mut Keylink<'_>, _: &mut EventQueue) {
    link.host.detach();
}

fn on_driver_load(link: &mut Keylink<'_>, events: &mut EventQueue) {
    if let Err(e) = link.host.load_hid_driver(events) {
        error!("HID driver load failed: {:?}", e);
    }
}

fn on_report(link: &mut Keylink<'_>, _: &mut EventQueue) {
    link.reports_ready = true;
}

fn event_handlers<'a>() -> EventHandlers<Keylink<'a>> {
    let table: [(EventKind, EventHandler<Keylink<'a>>); 4] = [
        (EventKind::UsbDeviceAttached, on_attached),
        (EventKind::UsbDeviceDetached, on_detached),
        (EventKind::HidDriverLoad, on_driver_load),
        (EventKind::HidReportAvailable, on_report),
    ];

    let mut handlers = EventHandlers::new();
    for (event, handler) in table {
        if let Err(e) = handlers.register(event, handler) {
            warn!("{:?} handler not registered: {:?}", event, e);
        }
    }
    handlers
}

#[rtic::app(device = rp_pico::hal::pac, peripherals = true)]
mod app {
    use rp_pico as bsp;

    use bsp::{
        hal::{self, clocks::init_clocks_and_plls, watchdog::Watchdog, Sio},
        XOSC_CRYSTAL_FREQ,
    };
    use hid_i2c_bridge::prelude::*;
    use log::debug;

    use crate::i2c_slave::{PeripheralI2c, SclPin, SdaPin};
    use crate::usb_host::Rp2040HostController;
    use crate::{event_handlers, Bridges, Host, Keylink, I2C_CONTROLLER, LOGGER, MAX_LOG_LEVEL};

    /// Bounds the wait for TX FIFO room so a master that stops clocking cannot hang the handler
    const I2C_SPIN_ITERATIONS: u32 = 100_000;

    #[shared]
    struct Shared {
        host: Host,
        events: EventQueue,
        bridges: Bridges,
    }

    #[local]
    struct Local {
        delay: hal::Timer,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        // Soft-reset does not release the hardware spinlocks
        // Release them now to avoid a deadlock after debug or watchdog reset
        unsafe {
            hal::sio::spinlock_reset();
        }

        cortex_m::interrupt::free(|_| unsafe {
            log::set_logger_racy(&LOGGER)
                .map(|()| log::set_max_level(MAX_LOG_LEVEL))
                .ok();
        });

        let mut resets = cx.device.RESETS;
        let mut watchdog = Watchdog::new(cx.device.WATCHDOG);
        let clocks = init_clocks_and_plls(
            XOSC_CRYSTAL_FREQ,
            cx.device.XOSC,
            cx.device.CLOCKS,
            cx.device.PLL_SYS,
            cx.device.PLL_USB,
            &mut resets,
            &mut watchdog,
        )
        .ok()
        .unwrap();

        let sio = Sio::new(cx.device.SIO);
        let pins = bsp::Pins::new(
            cx.device.IO_BANK0,
            cx.device.PADS_BANK0,
            sio.gpio_bank0,
            &mut resets,
        );

        let delay = hal::Timer::new(cx.device.TIMER, &mut resets, &clocks);

        // USB host
        let mut host = UsbHost::new(
            Rp2040HostController::new(
                cx.device.USBCTRL_REGS,
                cx.device.USBCTRL_DPRAM,
                clocks.usb_clock,
                &mut resets,
            ),
            HostConfig::default(),
        );
        host.init();

        // HID-over-I2C
        let bridge_config = BridgeConfigBuilder::new()
            .spin(SpinBound::Iterations(I2C_SPIN_ITERATIONS))
            .build();
        let sda: SdaPin = pins.gpio2.reconfigure();
        let scl: SclPin = pins.gpio3.reconfigure();
        let i2c = PeripheralI2c::new(
            cx.device.I2C1,
            sda,
            scl,
            &mut resets,
            bridge_config.slave_address,
        );
        let interrupt = pins.gpio4.into_push_pull_output();

        let mut bridges = Bridges::new();
        bridges.insert(
            I2C_CONTROLLER,
            HidI2cBridge::new(i2c, interrupt, bridge_config),
        );

        // Enable the USB and I2C interrupts
        unsafe {
            bsp::pac::NVIC::unmask(hal::pac::Interrupt::USBCTRL_IRQ);
            bsp::pac::NVIC::unmask(hal::pac::Interrupt::I2C1_IRQ);
        };

        log::info!("Bridge ready at I2C address {:#04x}", bridge_config.slave_address);

        (
            Shared {
                host,
                events: EventQueue::new(),
                bridges,
            },
            Local { delay },
            init::Monotonics(),
        )
    }

    #[idle(shared = [host, events, bridges], local = [delay])]
    fn idle(mut cx: idle::Context) -> ! {
        loop {
            if !cx.shared.events.lock(|events| events.is_empty()) {
                // blocking control transfers run in here, with the USB interrupt masked
                let reports_ready =
                    (&mut cx.shared.host, &mut cx.shared.events).lock(|host, events| {
                        let mut link = Keylink {
                            host,
                            delay: &mut *cx.local.delay,
                            reports_ready: false,
                        };
                        events.run_pending(&event_handlers(), &mut link);
                        link.reports_ready
                    });

                if reports_ready {
                    (&mut cx.shared.host, &mut cx.shared.bridges).lock(|host, bridges| {
                        while let Some(report) = host.next_report() {
                            if let Some(bridge) = bridges.get_mut(I2C_CONTROLLER) {
                                bridge.submit_input_report(report).ok();
                            }
                        }
                    });
                }
            }

            let leds = cx.shared.bridges.lock(|bridges| {
                bridges
                    .get_mut(I2C_CONTROLLER)
                    .and_then(HidI2cBridge::take_output_report)
            });
            if let Some(leds) = leds {
                (&mut cx.shared.host, &mut cx.shared.events).lock(|host, events| {
                    if let Err(e) = host.send_output_report(events, leds) {
                        debug!("LED report not sent: {:?}", e);
                    }
                });
            }
        }
    }

    #[task(binds = USBCTRL_IRQ, priority = 1, shared = [host, events])]
    fn usb_irq(cx: usb_irq::Context) {
        (cx.shared.host, cx.shared.events).lock(|host, events| host.on_interrupt(events));
    }

    /// Above the USB interrupt, so the master is served while a control transfer blocks
    #[task(binds = I2C1_IRQ, priority = 2, shared = [bridges])]
    fn i2c_irq(mut cx: i2c_irq::Context) {
        cx.shared.bridges.lock(|bridges| {
            while let Some(event) = bridges
                .get_mut(I2C_CONTROLLER)
                .and_then(|bridge| bridge.i2c_mut().next_event())
            {
                bridges.on_event(I2C_CONTROLLER, event).ok();
            }
        });
    }
}
