use std::collections::VecDeque;

use super::events::InputEvent;

/// Bounded FIFO of input events; the oldest entry makes room for the newest.
#[derive(Debug)]
pub(crate) struct InputBuffer {
    capacity: usize,
    events: VecDeque<InputEvent>,
}

impl InputBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `event`, returning the evicted entry when the buffer was full.
    pub(crate) fn push(&mut self, event: InputEvent) -> Option<InputEvent> {
        let evicted = if self.events.len() >= self.capacity {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    pub(crate) fn snapshot(&self) -> Vec<InputEvent> {
        self.events.iter().cloned().collect()
    }

    pub(crate) fn drain(&mut self) -> Vec<InputEvent> {
        self.events.drain(..).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
