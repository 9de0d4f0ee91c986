use tokio::process::Child;

use crate::types::OrderId;

/// One occupied renderer slot.
pub struct Slot {
    pub id: OrderId,
    pub child: Child,
}

/// Fixed-size array of renderer-execution concurrency slots.
///
/// An array is preferred over a queue because reaping frees an arbitrary
/// slot; any structure supporting O(1) find-free and O(1) free-by-index
/// suffices. `size` always equals the count of non-empty slots.
pub struct WorkerPool {
    slots: Vec<Option<Slot>>,
    size: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, size: 0 }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn has_free_slot(&self) -> bool {
        self.size < self.slots.len()
    }

    /// Inserts `slot` into the first free index. Caller must have checked
    /// `has_free_slot` first.
    pub fn fill_slot(&mut self, slot: Slot) {
        for s in self.slots.iter_mut() {
            if s.is_none() {
                *s = Some(slot);
                self.size += 1;
                return;
            }
        }
        unreachable!("fill_slot called with no free slot available");
    }

    pub fn free_slot(&mut self, index: usize) {
        if self.slots[index].take().is_some() {
            self.size -= 1;
        }
    }

    pub fn occupied_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots[index].as_mut()
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|slot| slot.id == id)
    }
}
