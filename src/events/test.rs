#![allow(clippy::unwrap_used)]

use std::vec::Vec;

use env_logger::Env;

use super::*;

fn init_logging() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("trace"))
        .is_test(true)
        .try_init();
}

#[derive(Default)]
struct Trace {
    seen: Vec<EventKind>,
}

fn record_attached(trace: &mut Trace, _: &mut EventQueue) {
    trace.seen.push(EventKind::UsbDeviceAttached);
}

fn record_detached(trace: &mut Trace, _: &mut EventQueue) {
    trace.seen.push(EventKind::UsbDeviceDetached);
}

fn record_report(trace: &mut Trace, _: &mut EventQueue) {
    trace.seen.push(EventKind::HidReportAvailable);
}

//attach raises driver load the same way the host engine does
fn attach_then_load(trace: &mut Trace, events: &mut EventQueue) {
    trace.seen.push(EventKind::UsbDeviceAttached);
    events.push(EventKind::HidDriverLoad).unwrap();
}

fn record_load(trace: &mut Trace, _: &mut EventQueue) {
    trace.seen.push(EventKind::HidDriverLoad);
}

#[test]
fn handlers_run_in_fifo_order() {
    init_logging();

    let mut handlers: EventHandlers<Trace> = EventHandlers::new();
    handlers
        .register(EventKind::UsbDeviceAttached, record_attached)
        .unwrap();
    handlers
        .register(EventKind::UsbDeviceDetached, record_detached)
        .unwrap();
    handlers
        .register(EventKind::HidReportAvailable, record_report)
        .unwrap();

    let mut events = EventQueue::new();
    events.push(EventKind::HidReportAvailable).unwrap();
    events.push(EventKind::UsbDeviceDetached).unwrap();
    events.push(EventKind::UsbDeviceAttached).unwrap();
    events.push(EventKind::HidReportAvailable).unwrap();

    let mut trace = Trace::default();
    assert_eq!(events.run_pending(&handlers, &mut trace), 4);

    assert_eq!(
        trace.seen,
        [
            EventKind::HidReportAvailable,
            EventKind::UsbDeviceDetached,
            EventKind::UsbDeviceAttached,
            EventKind::HidReportAvailable,
        ]
    );
    assert!(events.is_empty());
}

#[test]
fn events_raised_by_a_handler_run_in_the_same_pass() {
    init_logging();

    let mut handlers: EventHandlers<Trace> = EventHandlers::new();
    handlers
        .register(EventKind::UsbDeviceAttached, attach_then_load)
        .unwrap();
    handlers
        .register(EventKind::HidDriverLoad, record_load)
        .unwrap();

    let mut events = EventQueue::new();
    events.push(EventKind::UsbDeviceAttached).unwrap();

    let mut trace = Trace::default();
    assert_eq!(events.run_pending(&handlers, &mut trace), 2);
    assert_eq!(
        trace.seen,
        [EventKind::UsbDeviceAttached, EventKind::HidDriverLoad]
    );
}

#[test]
fn double_registration_is_rejected() {
    let mut handlers: EventHandlers<Trace> = EventHandlers::default();
    handlers
        .register(EventKind::UsbDeviceAttached, record_attached)
        .unwrap();

    assert_eq!(
        handlers.register(EventKind::UsbDeviceAttached, record_detached),
        Err(BridgeError::HandlerAlreadyRegistered)
    );

    //the first registration is kept
    let mut trace = Trace::default();
    let mut events = EventQueue::new();
    events.push(EventKind::UsbDeviceAttached).unwrap();
    events.run_pending(&handlers, &mut trace);
    assert_eq!(trace.seen, [EventKind::UsbDeviceAttached]);
}

#[test]
fn unhandled_events_are_discarded() {
    init_logging();

    let handlers: EventHandlers<Trace> = EventHandlers::new();
    let mut events = EventQueue::new();
    events.push(EventKind::HidDriverLoad).unwrap();

    let mut trace = Trace::default();
    assert_eq!(events.run_pending(&handlers, &mut trace), 1);
    assert!(trace.seen.is_empty());
    assert!(events.is_empty());
}

#[test]
fn full_queue_drops_newest_event() {
    init_logging();

    let mut events = EventQueue::new();
    for _ in 0..EVENT_QUEUE_SIZE - 1 {
        events.push(EventKind::HidReportAvailable).unwrap();
    }

    assert_eq!(
        events.push(EventKind::UsbDeviceDetached),
        Err(BridgeError::QueueFull)
    );
    assert_eq!(events.len(), EVENT_QUEUE_SIZE - 1);
    assert!(core::iter::from_fn(|| events.pop()).all(|e| e == EventKind::HidReportAvailable));
}
