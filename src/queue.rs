// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::cmp::Ordering;

use crate::error::{FastMarchingError, Result};

/// Marks a key with no heap entry in the position table.
const NOT_QUEUED: usize = usize::MAX;

/// Keys that map to a dense index, so heap positions live in a flat table.
pub trait HeapKey: Copy + Eq {
    /// Dense index of the key.
    fn index(self) -> usize;
}

impl HeapKey for usize {
    #[inline]
    fn index(self) -> usize {
        self
    }
}

impl HeapKey for u32 {
    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl HeapKey for u16 {
    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl HeapKey for u8 {
    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// An `(arrival time, key)` pair held by [`NodeHeap`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueEntry<K> {
    /// Tentative arrival time.
    pub time: f64,
    /// Cell key (the engine uses linear offsets).
    pub key: K,
}

#[derive(Debug, Clone, Copy)]
struct HeapSlot<K> {
    time: f64,
    seq: u64,
    key: K,
}

impl<K> HeapSlot<K> {
    fn cmp_priority(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Indexed binary min-heap of trial cells.
///
/// Each key is present at most once. [`decrease_key`](Self::decrease_key)
/// moves an existing entry instead of pushing a duplicate, so extraction
/// never yields stale entries. Equal times come out in insertion order.
///
/// Heap positions are kept in a table indexed by [`HeapKey::index`]. The
/// table grows to the largest key seen; size it up front with
/// [`with_key_space`](Self::with_key_space) when the key range is known.
#[derive(Debug, Clone)]
pub struct NodeHeap<K> {
    slots: Vec<HeapSlot<K>>,
    positions: Vec<usize>,
    next_seq: u64,
}

impl<K: HeapKey> Default for NodeHeap<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: HeapKey> NodeHeap<K> {
    /// Create an empty heap.
    pub fn new() -> Self {
        NodeHeap {
            slots: Vec::new(),
            positions: Vec::new(),
            next_seq: 0,
        }
    }

    /// Create an empty heap with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        NodeHeap {
            slots: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// Create an empty heap whose position table already covers keys
    /// `0..key_space`.
    pub fn with_key_space(key_space: usize) -> Self {
        NodeHeap {
            slots: Vec::new(),
            positions: vec![NOT_QUEUED; key_space],
            next_seq: 0,
        }
    }

    /// Number of queued keys.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the heap is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether `key` is queued.
    pub fn contains(&self, key: &K) -> bool {
        self.position(*key).is_some()
    }

    /// Queued time of `key`, if present.
    pub fn time_of(&self, key: &K) -> Option<f64> {
        self.position(*key).map(|pos| self.slots[pos].time)
    }

    /// The minimal entry without removing it.
    pub fn peek(&self) -> Option<QueueEntry<K>> {
        self.slots.first().map(|s| QueueEntry {
            time: s.time,
            key: s.key,
        })
    }

    /// Queue `key` at `time`. A key that is already queued is treated as a
    /// [`decrease_key`](Self::decrease_key). Returns whether the heap changed.
    pub fn insert(&mut self, time: f64, key: K) -> bool {
        if self.position(key).is_some() {
            return self.decrease_key(key, time);
        }
        let pos = self.slots.len();
        self.slots.push(HeapSlot {
            time,
            seq: self.next_seq,
            key,
        });
        self.next_seq += 1;
        self.set_position(key, pos);
        self.sift_up(pos);
        true
    }

    /// Remove and return the entry with the smallest time.
    ///
    /// # Errors
    /// Returns [`FastMarchingError::EmptyQueue`] if the heap is empty.
    pub fn extract_min(&mut self) -> Result<QueueEntry<K>> {
        if self.slots.is_empty() {
            return Err(FastMarchingError::EmptyQueue);
        }
        let last = self.slots.len() - 1;
        self.swap(0, last);
        let slot = self.slots.pop().ok_or(FastMarchingError::EmptyQueue)?;
        self.positions[slot.key.index()] = NOT_QUEUED;
        if !self.slots.is_empty() {
            self.sift_down(0);
        }
        Ok(QueueEntry {
            time: slot.time,
            key: slot.key,
        })
    }

    /// Lower the time of `key` to `time`.
    ///
    /// If `key` is queued with a larger time its entry is updated in place; if
    /// it is queued with a time `<= time` nothing happens; if it is absent it
    /// is inserted. Returns whether the heap changed.
    pub fn decrease_key(&mut self, key: K, time: f64) -> bool {
        match self.position(key) {
            Some(pos) => {
                if time.total_cmp(&self.slots[pos].time) != Ordering::Less {
                    return false;
                }
                self.slots[pos].time = time;
                self.sift_up(pos);
                true
            }
            None => self.insert(time, key),
        }
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        for slot in &self.slots {
            self.positions[slot.key.index()] = NOT_QUEUED;
        }
        self.slots.clear();
        self.next_seq = 0;
    }

    #[inline]
    fn position(&self, key: K) -> Option<usize> {
        match self.positions.get(key.index()) {
            Some(&pos) if pos != NOT_QUEUED => Some(pos),
            _ => None,
        }
    }

    #[inline]
    fn set_position(&mut self, key: K, pos: usize) {
        let index = key.index();
        if index >= self.positions.len() {
            self.positions.resize(index + 1, NOT_QUEUED);
        }
        self.positions[index] = pos;
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.slots.swap(a, b);
        self.positions[self.slots[a].key.index()] = a;
        self.positions[self.slots[b].key.index()] = b;
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.slots[pos].cmp_priority(&self.slots[parent]) != Ordering::Less {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.slots.len();
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;
            if left < len && self.slots[left].cmp_priority(&self.slots[smallest]) == Ordering::Less
            {
                smallest = left;
            }
            if right < len
                && self.slots[right].cmp_priority(&self.slots[smallest]) == Ordering::Less
            {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.swap(pos, smallest);
            pos = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn extract_in_time_order() {
        let mut heap = NodeHeap::new();
        heap.insert(3.0, 12u32);
        heap.insert(1.0, 10u32);
        heap.insert(2.0, 11u32);
        assert_eq!(heap.len(), 3);
        assert_eq!(heap.peek().unwrap().key, 10);
        let keys: Vec<u32> = (0..3).map(|_| heap.extract_min().unwrap().key).collect();
        assert_eq!(keys, vec![10, 11, 12]);
        assert!(heap.is_empty());
    }

    #[test]
    fn empty_extract_is_an_error() {
        let mut heap: NodeHeap<usize> = NodeHeap::new();
        assert!(matches!(
            heap.extract_min(),
            Err(FastMarchingError::EmptyQueue)
        ));
    }

    #[test]
    fn decrease_key_replaces_entry() {
        let mut heap = NodeHeap::new();
        heap.insert(5.0, 10usize);
        heap.insert(4.0, 11usize);
        assert!(heap.decrease_key(10, 1.0));
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.time_of(&10), Some(1.0));
        let first = heap.extract_min().unwrap();
        assert_eq!((first.time, first.key), (1.0, 10));
        assert!(!heap.contains(&10));
    }

    #[test]
    fn decrease_key_ignores_larger_time() {
        let mut heap = NodeHeap::new();
        heap.insert(2.0, 7u32);
        assert!(!heap.decrease_key(7, 3.0));
        assert!(!heap.decrease_key(7, 2.0));
        assert_eq!(heap.time_of(&7), Some(2.0));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn decrease_key_inserts_absent_key() {
        let mut heap = NodeHeap::new();
        assert!(heap.decrease_key(1u8, 0.5));
        assert!(heap.contains(&1));
    }

    #[test]
    fn ties_follow_insertion_order() {
        let mut heap = NodeHeap::new();
        for key in [4usize, 2, 9, 1] {
            heap.insert(1.0, key);
        }
        let keys: Vec<usize> = (0..4).map(|_| heap.extract_min().unwrap().key).collect();
        assert_eq!(keys, vec![4, 2, 9, 1]);
    }

    #[test]
    fn presized_table_and_growth() {
        let mut heap = NodeHeap::with_key_space(4);
        assert!(!heap.contains(&3usize));
        assert!(!heap.contains(&1000usize));
        heap.insert(2.0, 3usize);
        heap.insert(1.0, 1000usize);
        assert_eq!(heap.time_of(&1000), Some(1.0));
        assert_eq!(heap.extract_min().unwrap().key, 1000);
        assert!(!heap.contains(&1000));
        assert_eq!(heap.extract_min().unwrap().key, 3);
    }

    #[test]
    fn clear_resets() {
        let mut heap = NodeHeap::with_capacity(4);
        heap.insert(1.0, 0usize);
        heap.clear();
        assert!(heap.is_empty());
        assert!(!heap.contains(&0));
    }

    proptest! {
        #[test]
        fn extraction_is_non_decreasing(
            ops in proptest::collection::vec((0usize..64, 0.0f64..100.0), 1..200)
        ) {
            let mut heap = NodeHeap::new();
            let mut best: HashMap<usize, f64> = HashMap::new();
            for &(key, time) in &ops {
                heap.decrease_key(key, time);
                let entry = best.entry(key).or_insert(time);
                if time < *entry {
                    *entry = time;
                }
            }
            prop_assert_eq!(heap.len(), best.len());

            let mut last = f64::NEG_INFINITY;
            while let Ok(entry) = heap.extract_min() {
                prop_assert!(entry.time >= last);
                prop_assert_eq!(Some(&entry.time), best.get(&entry.key));
                last = entry.time;
            }
        }
    }
}
