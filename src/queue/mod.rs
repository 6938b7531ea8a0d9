//! Fixed capacity FIFO shared by the report relay, the bridge input queue and the event queue.
//!
//! A `RingQueue<T, N>` owns `N` slots but never stores more than `N - 1` items, so full and
//! empty are told apart by the item count alone. There is one producer side ([`RingQueue::push`])
//! and one consumer side ([`RingQueue::pop`]); callers that share a queue between an interrupt
//! handler and the main loop must keep those roles fixed.


#[derive(Debug, Clone)]
pub struct RingQueue<T: Copy, const N: usize> {
    slots: [Option<T>; N],
    front: usize,
    rear: usize,
    count: usize,
}

impl<T: Copy, const N: usize> RingQueue<T, N> {
    pub const fn new() -> Self {
        Self {
            slots: [None; N],
            front: 0,
            rear: 0,
            count: 0,
        }
    }

    /// Number of items the queue can hold, one less than the number of slots
    pub const fn capacity(&self) -> usize {
        N.saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count >= self.capacity()
    }

    /// Appends `item`, handing it back if the queue is full. Existing entries are never touched
    /// by a rejected push.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }

        self.slots[self.front] = Some(item);
        self.front = (self.front + 1) % N;
        self.count += 1;
        Ok(())
    }

    /// Removes and returns the oldest item
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let item = self.slots[self.rear].take();
        self.rear = (self.rear + 1) % N;
        self.count -= 1;
        item
    }

    /// Returns the oldest item without removing it
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            None
        } else {
            self.slots[self.rear].as_ref()
        }
    }

    pub fn clear(&mut self) {
        while self.pop().is_some() {}
        self.front = 0;
        self.rear = 0;
    }
}

impl<T: Copy, const N: usize> Default for RingQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
