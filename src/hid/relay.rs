use delegate::delegate;
use log::{trace, warn};

use crate::hid::BootKeyboardInputReport;
use crate::queue::RingQueue;
use crate::BridgeError;

/// Slots in the relay queue, one fewer reports can be pending
pub const REPORT_QUEUE_SIZE: usize = 16;

/// Queue of input reports received from the keyboard, with consecutive duplicates removed.
///
/// Filled from the USB interrupt completion path and drained by the main loop.
#[derive(Debug, Clone, Default)]
pub struct ReportRelay {
    queue: RingQueue<BootKeyboardInputReport, REPORT_QUEUE_SIZE>,
    previous: BootKeyboardInputReport,
}

impl ReportRelay {
    pub const fn new() -> Self {
        Self {
            queue: RingQueue::new(),
            previous: BootKeyboardInputReport {
                modifiers: 0,
                reserved: 0,
                keycodes: [0; 6],
            },
        }
    }

    delegate! {
        to self.queue {
            pub fn len(&self) -> usize;
            pub fn is_empty(&self) -> bool;
        }
    }

    pub fn is_duplicate(&self, report: &BootKeyboardInputReport) -> bool {
        &self.previous == report
    }

    /// Queues `report` unless it equals the previously queued one.
    ///
    /// Returns `Ok(false)` for a duplicate. When the queue is full the report is dropped and the
    /// previous report is left unchanged, so the same report is accepted again once there is room.
    pub fn offer(&mut self, report: BootKeyboardInputReport) -> Result<bool, BridgeError> {
        if self.is_duplicate(&report) {
            trace!("Duplicate report dropped");
            return Ok(false);
        }

        self.queue.push(report).map_err(|_| {
            warn!("Report queue full, dropping report");
            BridgeError::QueueFull
        })?;

        self.previous = report;
        Ok(true)
    }

    pub fn has_report(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn next_report(&mut self) -> Option<BootKeyboardInputReport> {
        self.queue.pop()
    }

    /// Forgets the previous report, the next report offered is compared against all zeros.
    /// Reports already queued are kept.
    pub fn reset_previous(&mut self) {
        self.previous = BootKeyboardInputReport::default();
    }
}
