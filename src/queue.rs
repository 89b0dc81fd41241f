//! Error-ranked collapse queue
//!
//! Edge costs change after every neighbouring collapse, so a plain binary heap doesn't fit. The queue is an ordered
//! set of `(error, edge id)` pairs plus the key each edge is currently filed under; updating an edge removes its
//! old entry by that key before inserting the new one.

use ordered_float::OrderedFloat;

use std::collections::BTreeSet;

#[derive(Clone, Debug, Default)]
pub struct CollapseQueue {
    entries: BTreeSet<(OrderedFloat<f32>, u32)>,
    keys: Vec<Option<OrderedFloat<f32>>>,
}

impl CollapseQueue {
    /// Creates an empty queue for edge ids below `edge_count`.
    pub fn new(edge_count: usize) -> Self {
        Self {
            entries: BTreeSet::new(),
            keys: vec![None; edge_count],
        }
    }

    /// Files `id` under `error`, replacing any previous entry of the same edge.
    pub fn insert(&mut self, id: u32, error: f32) {
        self.remove(id);

        let key = OrderedFloat(error);

        self.entries.insert((key, id));
        self.keys[id as usize] = Some(key);
    }

    /// Removes `id` from the queue, returns whether it was queued.
    pub fn remove(&mut self, id: u32) -> bool {
        match self.keys[id as usize].take() {
            Some(key) => self.entries.remove(&(key, id)),
            None => false,
        }
    }

    /// Cheapest entry; equal errors are ordered by edge id.
    pub fn first(&self) -> Option<(f32, u32)> {
        self.entries.first().map(|(err, id)| (err.0, *id))
    }

    pub fn pop_first(&mut self) -> Option<(f32, u32)> {
        let (err, id) = self.entries.pop_first()?;
        self.keys[id as usize] = None;

        Some((err.0, id))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.keys[id as usize].is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_queue_order() {
        let mut queue = CollapseQueue::new(4);

        queue.insert(0, 3.0);
        queue.insert(1, 1.0);
        queue.insert(2, 1.0);
        queue.insert(3, 0.5);

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.pop_first(), Some((0.5, 3)));
        assert_eq!(queue.pop_first(), Some((1.0, 1)));
        assert_eq!(queue.pop_first(), Some((1.0, 2)));
        assert_eq!(queue.pop_first(), Some((3.0, 0)));
        assert_eq!(queue.pop_first(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_update() {
        let mut queue = CollapseQueue::new(3);

        queue.insert(0, 1.0);
        queue.insert(1, 2.0);
        queue.insert(2, 3.0);

        // re-keying must not leave the old entry behind
        queue.insert(0, 5.0);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.first(), Some((2.0, 1)));

        assert!(queue.remove(1));
        assert!(!queue.remove(1));
        assert!(!queue.contains(1));
        assert_eq!(queue.first(), Some((3.0, 2)));
        assert_eq!(queue.len(), 2);
    }
}
