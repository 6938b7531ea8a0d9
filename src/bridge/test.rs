#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use core::convert::Infallible;
use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal::digital::ErrorType;
use env_logger::Env;

use super::*;
use crate::config::BridgeConfigBuilder;

fn init_logging() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("trace"))
        .is_test(true)
        .try_init();
}

/// RX and TX FIFOs of an I2C controller in slave mode
struct MockI2c {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    /// Bytes the TX FIFO accepts per write call
    tx_room: usize,
}

impl MockI2c {
    fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            tx: Vec::new(),
            tx_room: 16,
        }
    }
}

impl I2cSlave for MockI2c {
    fn read(&mut self, buffer: &mut [u8]) -> usize {
        let mut count = 0;
        for byte in buffer.iter_mut() {
            match self.rx.pop_front() {
                Some(b) => *byte = b,
                None => break,
            }
            count += 1;
        }
        count
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.tx_room);
        self.tx.extend_from_slice(&bytes[..count]);
        count
    }
}

#[derive(Default)]
struct MockPin {
    high: bool,
    changes: usize,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.changes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        self.changes += 1;
        Ok(())
    }
}

type TestBridge = HidI2cBridge<MockI2c, MockPin>;

fn bridge() -> TestBridge {
    HidI2cBridge::new(MockI2c::new(), MockPin::default(), BridgeConfig::default())
}

/// Master write transaction ending in STOP
fn master_write(bridge: &mut TestBridge, bytes: &[u8]) {
    bridge.i2c_mut().rx.extend(bytes);
    bridge.on_event(I2cSlaveEvent::Receive);
    bridge.on_event(I2cSlaveEvent::Finish);
}

/// Master read transaction ending in STOP, returns what the slave sent
fn master_read(bridge: &mut TestBridge) -> Vec<u8> {
    bridge.i2c_mut().tx.clear();
    bridge.on_event(I2cSlaveEvent::Request);
    bridge.on_event(I2cSlaveEvent::Finish);
    bridge.i2c().tx.clone()
}

/// Register write, repeated START, read
fn read_register(bridge: &mut TestBridge, register: Register) -> Vec<u8> {
    master_write(bridge, &u16::from(register).to_le_bytes());
    master_read(bridge)
}

/// Command register write with op code, report type and optional data register payload
fn command(bridge: &mut TestBridge, low: u8, op_code: OpCode, data: &[u8]) {
    let mut bytes = vec![0x05, 0x00, low, u8::from(op_code)];
    if !data.is_empty() {
        bytes.extend_from_slice(&[0x06, 0x00]);
        bytes.extend_from_slice(data);
    }
    master_write(bridge, &bytes);
}

fn key_a() -> BootKeyboardInputReport {
    BootKeyboardInputReport::new(0, [0x04, 0, 0, 0, 0, 0])
}

#[test]
fn reset_handshake_returns_zero_length_once() {
    init_logging();
    let mut bridge = bridge();
    assert!(!bridge.interrupt_pin().high);

    bridge.submit_input_report(key_a()).unwrap();
    command(&mut bridge, 0x00, OpCode::Reset, &[]);

    assert!(bridge.is_reset_pending());
    assert!(bridge.is_interrupt_asserted());
    assert!(bridge.interrupt_pin().high);
    assert_eq!(bridge.pending_input_reports(), 0);

    assert_eq!(master_read(&mut bridge), [0, 0]);
    assert!(!bridge.is_reset_pending());
    assert!(!bridge.is_interrupt_asserted());
    assert!(!bridge.interrupt_pin().high);
}

#[test]
fn input_reports_are_read_oldest_first() {
    init_logging();
    let mut bridge = bridge();
    let b = BootKeyboardInputReport::new(0x02, [0x05, 0, 0, 0, 0, 0]);

    bridge.submit_input_report(key_a()).unwrap();
    bridge.submit_input_report(b).unwrap();
    assert!(bridge.interrupt_pin().high);

    assert_eq!(master_read(&mut bridge), [10, 0, 0, 0, 4, 0, 0, 0, 0, 0]);
    // still one pending
    assert!(bridge.interrupt_pin().high);

    assert_eq!(master_read(&mut bridge), [10, 0, 2, 0, 5, 0, 0, 0, 0, 0]);
    assert!(!bridge.interrupt_pin().high);
}

#[test]
fn read_without_pending_report_is_zero_length() {
    init_logging();
    let mut bridge = bridge();

    assert_eq!(master_read(&mut bridge), [0, 0]);
    assert!(!bridge.is_interrupt_asserted());
}

#[test]
fn full_input_queue_drops_the_newest_report() {
    init_logging();
    let mut bridge = bridge();

    for _ in 0..INPUT_REPORT_QUEUE_SIZE - 1 {
        bridge.submit_input_report(key_a()).unwrap();
    }
    assert_eq!(
        bridge.submit_input_report(BootKeyboardInputReport::default()),
        Err(BridgeError::QueueFull)
    );
    assert_eq!(bridge.pending_input_reports(), INPUT_REPORT_QUEUE_SIZE - 1);

    for _ in 0..INPUT_REPORT_QUEUE_SIZE - 1 {
        assert_eq!(master_read(&mut bridge)[4], 0x04);
    }
}

#[test]
fn hid_descriptor_is_streamed_through_a_small_fifo() {
    init_logging();
    let mut bridge = bridge();
    bridge.i2c_mut().tx_room = 4;

    let descriptor = read_register(&mut bridge, Register::HidDescriptor);

    #[rustfmt::skip]
    let expected = [
        0x1E, 0x00, // wHIDDescLength
        0x00, 0x01, // bcdVersion
        63, 0x00,   // wReportDescLength
        0x03, 0x00, // wReportDescRegister
        0x02, 0x00, // wInputRegister
        0x08, 0x00, // wMaxInputLength
        0x04, 0x00, // wOutputRegister
        0x01, 0x00, // wMaxOutputLength
        0x05, 0x00, // wCommandRegister
        0x06, 0x00, // wDataRegister
        0x03, 0x04, // wVendorID
        0x30, 0x60, // wProductID
        0x01, 0x00, // wVersionID
        0x00, 0x00, 0x00, 0x00,
    ];
    assert_eq!(descriptor, expected);
    assert_eq!(bridge.selected_register(), None);
}

#[test]
fn hid_descriptor_carries_configured_ids() {
    init_logging();
    let config = BridgeConfigBuilder::new()
        .vendor_id(0x1209)
        .product_id(0x0001)
        .version_id(0x0200)
        .build();
    let mut bridge = HidI2cBridge::new(MockI2c::new(), MockPin::default(), config);

    let descriptor = read_register(&mut bridge, Register::HidDescriptor);
    assert_eq!(descriptor[20..26], [0x09, 0x12, 0x01, 0x00, 0x00, 0x02]);
}

#[test]
fn report_descriptor_is_the_boot_keyboard() {
    init_logging();
    let mut bridge = bridge();

    let descriptor = read_register(&mut bridge, Register::ReportDescriptor);
    assert_eq!(descriptor.len(), 63);
    assert_eq!(descriptor, REPORT_DESCRIPTOR);
    assert_eq!(descriptor[..4], [0x05, 0x01, 0x09, 0x06]);
}

#[test]
fn get_report_returns_the_last_input_report() {
    init_logging();
    let mut bridge = bridge();

    bridge.submit_input_report(key_a()).unwrap();
    master_read(&mut bridge);

    // report type input in bits 4..6
    command(&mut bridge, 0x10, OpCode::GetReport, &[]);
    assert_eq!(bridge.selected_register(), Some(u16::from(Register::Data)));

    let data = master_read(&mut bridge);
    assert_eq!(data, [10, 0, 0, 0, 4, 0, 0, 0, 0, 0]);
    assert_eq!(bridge.selected_register(), None);
}

#[test]
fn get_report_for_features_is_ignored() {
    init_logging();
    let mut bridge = bridge();

    command(&mut bridge, 0x30, OpCode::GetReport, &[]);
    assert_eq!(bridge.selected_register(), None);
    assert_eq!(master_read(&mut bridge), [0, 0]);
}

#[test]
fn set_report_delivers_caps_lock() {
    init_logging();
    let mut bridge = bridge();
    assert!(!bridge.has_output_report());

    command(&mut bridge, 0x20, OpCode::SetReport, &[0x03, 0x00, 0x02]);

    assert!(bridge.has_output_report());
    let leds = bridge.take_output_report().unwrap();
    assert!(leds.caps_lock);
    assert!(!leds.num_lock);
    assert!(!leds.scroll_lock);
    assert!(!leds.compose);
    assert!(!leds.kana);
    assert_eq!(bridge.take_output_report(), None);
}

#[test]
fn set_report_with_unexpected_length_is_ignored() {
    init_logging();
    let mut bridge = bridge();

    command(&mut bridge, 0x20, OpCode::SetReport, &[0x04, 0x00, 0x02, 0x00]);
    assert!(!bridge.has_output_report());

    // feature report
    command(&mut bridge, 0x30, OpCode::SetReport, &[0x03, 0x00, 0x02]);
    assert!(!bridge.has_output_report());
}

#[test]
fn output_register_write_sets_the_leds() {
    init_logging();
    let mut bridge = bridge();

    master_write(&mut bridge, &[0x04, 0x00, 0x03, 0x00, 0x01]);

    let leds = bridge.take_output_report().unwrap();
    assert!(leds.num_lock);
    assert!(!leds.caps_lock);
}

#[test]
fn get_protocol_reports_the_report_protocol() {
    init_logging();
    let mut bridge = bridge();

    command(&mut bridge, 0x00, OpCode::GetProtocol, &[]);
    assert_eq!(master_read(&mut bridge), [4, 0, 1, 0]);
}

#[test]
fn sleep_deasserts_and_wake_reasserts() {
    init_logging();
    let mut bridge = bridge();

    bridge.submit_input_report(key_a()).unwrap();
    assert!(bridge.interrupt_pin().high);

    command(&mut bridge, 0x01, OpCode::SetPower, &[]);
    assert_eq!(bridge.power_state(), PowerState::Sleep);
    assert!(!bridge.interrupt_pin().high);

    command(&mut bridge, 0x00, OpCode::SetPower, &[]);
    assert_eq!(bridge.power_state(), PowerState::On);
    assert!(bridge.interrupt_pin().high);
}

#[test]
fn wake_without_pending_reports_leaves_the_line_low() {
    init_logging();
    let mut bridge = bridge();

    command(&mut bridge, 0x01, OpCode::SetPower, &[]);
    command(&mut bridge, 0x00, OpCode::SetPower, &[]);
    assert!(!bridge.interrupt_pin().high);
}

#[test]
fn optional_commands_are_ignored() {
    init_logging();
    let mut bridge = bridge();
    let changes = bridge.interrupt_pin().changes;

    command(&mut bridge, 0x00, OpCode::SetIdle, &[0x04, 0x00, 0x00, 0x00]);
    command(&mut bridge, 0x00, OpCode::GetIdle, &[]);
    command(&mut bridge, 0x00, OpCode::SetProtocol, &[0x04, 0x00, 0x00, 0x00]);
    // op code 0x0F is not assigned
    master_write(&mut bridge, &[0x05, 0x00, 0x00, 0x0F]);

    assert_eq!(bridge.selected_register(), None);
    assert_eq!(bridge.interrupt_pin().changes, changes);
    assert_eq!(master_read(&mut bridge), [0, 0]);
}

#[test]
fn register_id_may_arrive_in_pieces() {
    init_logging();
    let mut bridge = bridge();

    bridge.i2c_mut().rx.push_back(0x04);
    bridge.on_event(I2cSlaveEvent::Receive);
    assert_eq!(bridge.selected_register(), None);

    bridge.i2c_mut().rx.extend([0x00, 0x03, 0x00, 0x04]);
    bridge.on_event(I2cSlaveEvent::Receive);
    assert_eq!(bridge.selected_register(), Some(4));
    bridge.on_event(I2cSlaveEvent::Finish);

    assert!(bridge.take_output_report().unwrap().scroll_lock);
}

#[test]
fn half_a_register_id_does_not_outlive_its_transaction() {
    init_logging();
    let mut bridge = bridge();

    master_write(&mut bridge, &[0x05]);
    assert_eq!(bridge.selected_register(), None);

    command(&mut bridge, 0x00, OpCode::Reset, &[]);

    assert!(bridge.is_reset_pending());
    assert!(bridge.is_interrupt_asserted());
}

#[test]
fn bytes_beyond_the_inbound_buffer_are_discarded() {
    init_logging();
    let mut bridge = bridge();

    let mut bytes = vec![0x05, 0x00, 0x00, u8::from(OpCode::GetProtocol)];
    bytes.extend_from_slice(&[0xEE; 30]);
    master_write(&mut bridge, &bytes);

    assert!(bridge.i2c().rx.is_empty());
    assert_eq!(master_read(&mut bridge), [4, 0, 1, 0]);
}

#[test]
fn reads_of_write_only_registers_return_nothing() {
    init_logging();
    let mut bridge = bridge();

    assert!(read_register(&mut bridge, Register::Command).is_empty());
    assert!(read_register(&mut bridge, Register::Output).is_empty());
    assert_eq!(bridge.selected_register(), None);
}

#[test]
fn active_low_line_is_inverted() {
    init_logging();
    let config = BridgeConfigBuilder::new()
        .interrupt_polarity(InterruptPolarity::ActiveLow)
        .build();
    let mut bridge = HidI2cBridge::new(MockI2c::new(), MockPin::default(), config);
    assert!(bridge.interrupt_pin().high);

    bridge.submit_input_report(key_a()).unwrap();
    assert!(bridge.is_interrupt_asserted());
    assert!(!bridge.interrupt_pin().high);

    master_read(&mut bridge);
    assert!(bridge.interrupt_pin().high);
}

#[test]
fn stuck_fifo_gives_up_when_bounded() {
    init_logging();
    let config = BridgeConfigBuilder::new()
        .spin(SpinBound::Iterations(10))
        .build();
    let mut bridge = HidI2cBridge::new(MockI2c::new(), MockPin::default(), config);
    bridge.i2c_mut().tx_room = 0;

    assert!(read_register(&mut bridge, Register::ReportDescriptor).is_empty());
    assert_eq!(bridge.selected_register(), None);
}

#[test]
fn registry_routes_events_by_controller() {
    init_logging();
    let mut registry = BridgeRegistry::new();
    assert!(registry.insert(I2cController::I2c1, bridge()).is_none());

    registry
        .get_mut(I2cController::I2c1)
        .unwrap()
        .i2c_mut()
        .rx
        .extend([0x01, 0x00]);
    assert_eq!(
        registry.on_event(I2cController::I2c0, I2cSlaveEvent::Receive),
        Err(BridgeError::NotConnected)
    );
    assert_eq!(
        registry.on_event(I2cController::I2c1, I2cSlaveEvent::Receive),
        Ok(())
    );

    let bridge = registry.get(I2cController::I2c1).unwrap();
    assert_eq!(bridge.selected_register(), Some(1));
    assert!(registry.get(I2cController::I2c0).is_none());
    assert!(registry.remove(I2cController::I2c1).is_some());
}
