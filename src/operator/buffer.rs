use arc_swap::ArcSwap;

use crate::domain::{EventData, RingBuffer};

/// Keeps the most recent `capacity` events
pub struct Buffer<T> {
    ring: ArcSwap<RingBuffer<T>>,
}

impl<T: EventData> Buffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: ArcSwap::from_pointee(RingBuffer::with_capacity(capacity)),
        }
    }

    /// Copy-on-write: each append clones the ring, so cost grows with
    /// capacity. Suited to short histories.
    pub fn append(&self, data: T) {
        self.ring.rcu(|ring| {
            let mut next = RingBuffer::clone(ring);
            next.push(data.clone());
            next
        });
    }

    /// Oldest to newest
    pub fn contents(&self) -> Vec<T> {
        self.ring.load().to_vec()
    }

    pub fn capacity(&self) -> usize {
        self.ring.load().capacity()
    }

    pub fn len(&self) -> usize {
        self.ring.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.load().is_empty()
    }
}
