/*!
 * Ordered Slots
 *
 * Insertion-ordered container with stable handles, used for waiter records,
 * pending envelopes and queued tasks.
 *
 * # Design: Sequence-Keyed Map Over Intrusive List
 *
 * Every insertion receives the next value of a monotonically increasing
 * sequence. The sequence is both the ordering key and the removal handle, so
 * `remove` is a map lookup and a handle can never alias a later record.
 */

use std::collections::BTreeMap;

/// Stable handle returned by [`OrderedSlots::push_tail`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotHandle(u64);

/// FIFO container supporting removal from the middle by handle
#[derive(Debug)]
pub struct OrderedSlots<T> {
    entries: BTreeMap<u64, T>,
    next_seq: u64,
}

impl<T> OrderedSlots<T> {
    /// Create an empty container
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Append at the tail, returning the record's handle
    pub fn push_tail(&mut self, value: T) -> SlotHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(seq, value);
        SlotHandle(seq)
    }

    /// Remove and return the oldest record
    #[inline]
    pub fn pop_head(&mut self) -> Option<T> {
        self.entries.pop_first().map(|(_, value)| value)
    }

    /// Remove a record by handle; `None` if already removed
    #[inline]
    pub fn remove(&mut self, handle: SlotHandle) -> Option<T> {
        self.entries.remove(&handle.0)
    }

    /// Check whether a handle still refers to a live record
    #[inline]
    pub fn contains(&self, handle: SlotHandle) -> bool {
        self.entries.contains_key(&handle.0)
    }

    /// Mutable access to a live record
    #[inline]
    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        self.entries.get_mut(&handle.0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Iterate oldest to newest with mutable access
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.values_mut()
    }
}

impl<T> Default for OrderedSlots<T> {
    fn default() -> Self {
        Self::new()
    }
}
