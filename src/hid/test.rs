#![allow(clippy::unwrap_used)]

use env_logger::Env;

use super::*;

fn init_logging() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("trace"))
        .is_test(true)
        .try_init();
}

fn report(modifiers: u8, keycodes: [u8; 6]) -> BootKeyboardInputReport {
    BootKeyboardInputReport::new(modifiers, keycodes)
}

#[test]
fn input_report_wire_layout() {
    let r = BootKeyboardInputReport::from_bytes(&[0x22, 0, 0x04, 0x05, 0, 0, 0, 0x39]).unwrap();

    assert!(r.is_pressed(Modifier::LeftShift));
    assert!(r.is_pressed(Modifier::RightShift));
    assert!(!r.is_pressed(Modifier::LeftControl));
    assert_eq!(r.keycodes, [0x04, 0x05, 0, 0, 0, 0x39]);
    assert_eq!(r.keys().collect::<std::vec::Vec<_>>(), [0x04, 0x05, 0x39]);
    assert_eq!(r.to_bytes().unwrap(), [0x22, 0, 0x04, 0x05, 0, 0, 0, 0x39]);
}

#[test]
fn output_report_bits() {
    let leds = BootKeyboardOutputReport::from_byte(0x02).unwrap();
    assert_eq!(
        leds,
        BootKeyboardOutputReport {
            caps_lock: true,
            ..Default::default()
        }
    );

    let leds = BootKeyboardOutputReport {
        num_lock: true,
        scroll_lock: true,
        kana: true,
        ..Default::default()
    };
    assert_eq!(leds.to_byte().unwrap(), 0x15);
}

#[test]
fn identical_consecutive_reports_are_queued_once() {
    init_logging();

    let mut relay = ReportRelay::new();
    let a = report(0, [0x04, 0, 0, 0, 0, 0]);

    assert_eq!(relay.offer(a), Ok(true));
    assert_eq!(relay.offer(a), Ok(false));
    assert_eq!(relay.len(), 1);

    assert_eq!(relay.next_report(), Some(a));
    assert!(!relay.has_report());
}

#[test]
fn all_zero_report_is_a_duplicate_of_the_initial_state() {
    init_logging();

    let mut relay = ReportRelay::default();
    assert_eq!(relay.offer(BootKeyboardInputReport::default()), Ok(false));
    assert!(relay.is_empty());
}

#[test]
fn key_press_and_release_are_both_relayed() {
    init_logging();

    let mut relay = ReportRelay::new();
    let pressed = report(0, [0x04, 0, 0, 0, 0, 0]);
    let released = BootKeyboardInputReport::default();

    relay.offer(pressed).unwrap();
    relay.offer(pressed).unwrap();
    relay.offer(released).unwrap();
    relay.offer(released).unwrap();

    assert_eq!(relay.next_report(), Some(pressed));
    assert_eq!(relay.next_report(), Some(released));
    assert_eq!(relay.next_report(), None);
}

#[test]
fn reordered_keys_are_not_duplicates() {
    let mut relay = ReportRelay::new();

    assert_eq!(relay.offer(report(0, [0x04, 0x05, 0, 0, 0, 0])), Ok(true));
    assert_eq!(relay.offer(report(0, [0x05, 0x04, 0, 0, 0, 0])), Ok(true));
    assert_eq!(relay.len(), 2);
}

#[test]
fn full_relay_drops_report_and_keeps_previous() {
    init_logging();

    let mut relay = ReportRelay::new();
    for i in 0..relay::REPORT_QUEUE_SIZE - 1 {
        relay.offer(report(0, [i as u8 + 1, 0, 0, 0, 0, 0])).unwrap();
    }

    let rejected = report(0x01, [0x2C, 0, 0, 0, 0, 0]);
    assert_eq!(relay.offer(rejected), Err(BridgeError::QueueFull));
    assert!(!relay.is_duplicate(&rejected));

    relay.next_report().unwrap();
    assert_eq!(relay.offer(rejected), Ok(true));
}

#[test]
fn reset_previous_keeps_queued_reports() {
    let mut relay = ReportRelay::new();
    let a = report(0, [0x04, 0, 0, 0, 0, 0]);

    relay.offer(a).unwrap();
    relay.reset_previous();

    assert!(relay.has_report());
    assert_eq!(relay.offer(a), Ok(true));
    assert_eq!(relay.len(), 2);
}
