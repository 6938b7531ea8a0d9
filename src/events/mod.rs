//! Deferred work raised from interrupt context.
//!
//! Interrupt handlers push an [`EventKind`] and return. The main loop drains the queue once per
//! iteration and runs the handler registered for each event, in the order the events were raised.
//! A handler must not block waiting on a condition that only a later event in the same queue
//! would satisfy.

use log::{trace, warn};

use crate::queue::RingQueue;
use crate::BridgeError;

#[cfg(test)]
mod test;

/// Slots in the event queue, one fewer events can be pending
pub const EVENT_QUEUE_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum EventKind {
    UsbDeviceAttached = 0,
    UsbDeviceDetached,
    HidDriverLoad,
    HidReportAvailable,
}

impl EventKind {
    pub const COUNT: usize = 4;

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    queue: RingQueue<EventKind, EVENT_QUEUE_SIZE>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            queue: RingQueue::new(),
        }
    }

    /// Raises an event. When the queue is full the event is dropped and
    /// [`BridgeError::QueueFull`] returned, already queued events are unaffected.
    pub fn push(&mut self, event: EventKind) -> Result<(), BridgeError> {
        self.queue.push(event).map_err(|e| {
            warn!("Event queue full, dropping {:?}", e);
            BridgeError::QueueFull
        })
    }

    pub fn pop(&mut self) -> Option<EventKind> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Runs the handler for every queued event, oldest first, until the queue is empty.
    ///
    /// Events raised by a handler are run in the same call. Events without a registered handler
    /// are discarded.
    pub fn run_pending<C>(&mut self, handlers: &EventHandlers<C>, context: &mut C) -> usize {
        let mut ran = 0;
        while let Some(event) = self.pop() {
            ran += 1;
            match handlers.get(event) {
                Some(handler) => {
                    trace!("Running {:?}", event);
                    handler(context, self);
                }
                None => {
                    warn!("No handler registered for {:?}", event);
                }
            }
        }
        ran
    }
}

/// Handler signature: the shared context and the queue, so handlers can raise follow up events
pub type EventHandler<C> = fn(&mut C, &mut EventQueue);

/// Dispatch table, exactly one handler per [`EventKind`], filled in once at start up
pub struct EventHandlers<C> {
    handlers: [Option<EventHandler<C>>; EventKind::COUNT],
}

impl<C> EventHandlers<C> {
    pub const fn new() -> Self {
        Self {
            handlers: [None; EventKind::COUNT],
        }
    }

    pub fn register(
        &mut self,
        event: EventKind,
        handler: EventHandler<C>,
    ) -> Result<(), BridgeError> {
        let slot = &mut self.handlers[event.index()];
        if slot.is_some() {
            return Err(BridgeError::HandlerAlreadyRegistered);
        }
        *slot = Some(handler);
        Ok(())
    }

    pub fn get(&self, event: EventKind) -> Option<EventHandler<C>> {
        self.handlers[event.index()]
    }
}

impl<C> Default for EventHandlers<C> {
    fn default() -> Self {
        Self::new()
    }
}
