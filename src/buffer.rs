use std::collections::VecDeque;

use bytes::Bytes;

use crate::error::ReplyStatus;
use crate::types::OrderId;

struct Entry {
    id: OrderId,
    payload: Bytes,
    format: String,
}

/// Bounded key -> (payload, format) store for completed render artifacts.
///
/// Entries evict in FIFO insertion order when a `push` would exceed
/// `max_size`; a `VecDeque` gives that ordering for free and any
/// deterministic eviction order is equally correct.
///
/// `pop_by_id` is a deliberate read-through: it does not remove the entry or
/// decrement `current_size`. Entries are only ever removed by eviction
/// pressure from a later `push`. This accounting asymmetry is load-bearing,
/// not an oversight — "fixing" it would shift the point at which eviction
/// triggers.
pub struct Buffer {
    entries: VecDeque<Entry>,
    current_size: u64,
    max_size: u64,
}

impl Buffer {
    pub fn new(max_size: u64) -> Self {
        Self {
            entries: VecDeque::new(),
            current_size: 0,
            max_size,
        }
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    fn contains(&self, id: OrderId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Pushes `payload` under `id`. Returns the resulting status and the
    /// list of ids evicted to make room (empty unless eviction occurred).
    pub fn push(
        &mut self,
        id: OrderId,
        payload: Bytes,
        format: String,
    ) -> (ReplyStatus, Vec<OrderId>) {
        let length = payload.len() as u64;

        if self.contains(id) {
            return (ReplyStatus::InvalidParam, Vec::new());
        }

        if length > self.max_size {
            return (ReplyStatus::Nomem, Vec::new());
        }

        let mut evicted = Vec::new();
        while self.current_size + length > self.max_size {
            // Invariant: if length <= max_size, this loop always terminates
            // with a nonempty buffer still over budget, so pop_front can't
            // run dry before the budget is satisfied.
            let front = self
                .entries
                .pop_front()
                .expect("buffer over budget with no entries to evict");
            self.current_size -= front.payload.len() as u64;
            evicted.push(front.id);
        }

        self.entries.push_back(Entry { id, payload, format });
        self.current_size += length;

        (ReplyStatus::Ready, evicted)
    }

    /// Returns the entry for `id` without removing it. Panics if absent;
    /// callers must only call this after the Scheduler has confirmed the
    /// order is `Ready`, which implies a push already happened.
    pub fn pop_by_id(&self, id: OrderId) -> Option<(Bytes, String)> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| (e.payload.clone(), e.format.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(n: usize) -> Bytes {
        Bytes::from(vec![0u8; n])
    }

    #[test]
    fn push_then_pop_round_trips() {
        let mut buf = Buffer::new(1024);
        let (status, evicted) = buf.push(OrderId(1), b(8), "image/png".into());
        assert_eq!(status, ReplyStatus::Ready);
        assert!(evicted.is_empty());

        let (payload, format) = buf.pop_by_id(OrderId(1)).unwrap();
        assert_eq!(payload.len(), 8);
        assert_eq!(format, "image/png");
        // pop_by_id must not decrement current_size (the deliberate asymmetry).
        assert_eq!(buf.current_size(), 8);
    }

    #[test]
    fn duplicate_id_is_invalid_param() {
        let mut buf = Buffer::new(1024);
        buf.push(OrderId(1), b(4), "image/png".into());
        let (status, evicted) = buf.push(OrderId(1), b(4), "image/png".into());
        assert_eq!(status, ReplyStatus::InvalidParam);
        assert!(evicted.is_empty());
    }

    #[test]
    fn oversized_payload_is_nomem_and_evicts_nothing() {
        let mut buf = Buffer::new(1000);
        buf.push(OrderId(1), b(700), "image/png".into());
        let (status, evicted) = buf.push(OrderId(2), b(1001), "image/png".into());
        assert_eq!(status, ReplyStatus::Nomem);
        assert!(evicted.is_empty());
        assert_eq!(buf.current_size(), 700);
    }

    #[test]
    fn exact_max_size_succeeds_and_evicts_everything_else() {
        let mut buf = Buffer::new(1000);
        buf.push(OrderId(1), b(700), "image/png".into());
        let (status, evicted) = buf.push(OrderId(2), b(1000), "image/png".into());
        assert_eq!(status, ReplyStatus::Ready);
        assert_eq!(evicted, vec![OrderId(1)]);
        assert_eq!(buf.current_size(), 1000);
    }

    #[test]
    fn eviction_frees_exactly_enough_room() {
        // S3: buffer=1000 bytes; push id=1 of 700B, push id=2 of 500B ->
        // second push evicts id=1.
        let mut buf = Buffer::new(1000);
        buf.push(OrderId(1), b(700), "image/png".into());
        let (status, evicted) = buf.push(OrderId(2), b(500), "image/png".into());
        assert_eq!(status, ReplyStatus::Ready);
        assert_eq!(evicted, vec![OrderId(1)]);
        assert_eq!(buf.current_size(), 500);
        assert!(buf.pop_by_id(OrderId(1)).is_none());
    }

    #[test]
    fn current_size_never_exceeds_max_size() {
        let mut buf = Buffer::new(100);
        for i in 1..=10u64 {
            buf.push(OrderId(i), b(30), "image/png".into());
            assert!(buf.current_size() <= buf.max_size());
        }
    }
}
