/*!
 * Lock-Free FIFO Queue (Michael–Scott)
 *
 * Unbounded multi-producer multi-consumer queue built from a singly linked
 * list with atomic `head` and `tail` pointers.
 *
 * # Invariants
 *
 * - `head` always points at a sentinel; the logical first element is its
 *   successor. A successful dequeue turns that successor into the new
 *   sentinel and moves its payload out.
 * - `next` links are written once (null → node) and never reset.
 * - `tail` may lag by one node; any thread that notices helps swing it.
 *
 * # Memory Reclamation
 *
 * Retired sentinels are handed to crossbeam-epoch and freed only after
 * every thread that could still be reading them has unpinned.
 */

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::Ordering;

struct Node<T> {
    /// Initialized for every node except the current sentinel
    data: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

/// Pads the two hot pointers onto separate cache lines
#[repr(C, align(64))]
struct CachePadded<T>(T);

impl<T> std::ops::Deref for CachePadded<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.0
    }
}

/// Unbounded lock-free FIFO queue
///
/// # Performance
///
/// - **Enqueue**: one allocation plus one or two CAS operations
/// - **Dequeue**: one CAS; freed memory is reclaimed through epochs
/// - Never blocks and never suspends
pub struct LockFreeQueue<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
}

// Safety: payloads move between threads through the queue; nodes are only
// reclaimed through epoch guards.
unsafe impl<T: Send> Send for LockFreeQueue<T> {}
unsafe impl<T: Send> Sync for LockFreeQueue<T> {}

impl<T> LockFreeQueue<T> {
    /// Create an empty queue holding only the sentinel
    pub fn new() -> Self {
        let queue = Self {
            head: CachePadded(Atomic::null()),
            tail: CachePadded(Atomic::null()),
        };
        let sentinel = Owned::new(Node {
            data: MaybeUninit::uninit(),
            next: Atomic::null(),
        });

        // Safety: the queue is not shared yet
        unsafe {
            let guard = epoch::unprotected();
            let sentinel = sentinel.into_shared(guard);
            queue.head.store(sentinel, Ordering::Relaxed);
            queue.tail.store(sentinel, Ordering::Relaxed);
        }
        queue
    }

    /// Try to link `new` after `onto`, helping a lagging tail if needed
    fn push_internal(
        &self,
        onto: Shared<'_, Node<T>>,
        new: Shared<'_, Node<T>>,
        guard: &Guard,
    ) -> bool {
        // Safety: `onto` was loaded under `guard`, so it cannot be freed yet
        let o = unsafe { onto.deref() };
        let next = o.next.load(Ordering::Acquire, guard);
        if !next.is_null() {
            // Tail is lagging: help advance it and retry
            let _ = self
                .tail
                .compare_exchange(onto, next, Ordering::Release, Ordering::Relaxed, guard);
            false
        } else {
            let linked = o
                .next
                .compare_exchange(Shared::null(), new, Ordering::Release, Ordering::Relaxed, guard)
                .is_ok();
            if linked {
                // Best effort; another thread may already have helped
                let _ = self
                    .tail
                    .compare_exchange(onto, new, Ordering::Release, Ordering::Relaxed, guard);
            }
            linked
        }
    }

    /// Append a value at the tail
    pub fn enqueue(&self, value: T) {
        let guard = &epoch::pin();
        let new = Owned::new(Node {
            data: MaybeUninit::new(value),
            next: Atomic::null(),
        })
        .into_shared(guard);

        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            if self.push_internal(tail, new, guard) {
                break;
            }
        }
    }

    /// One dequeue attempt; `Err` means a lost CAS race
    fn pop_internal(&self, guard: &Guard) -> Result<Option<T>, ()> {
        let head = self.head.load(Ordering::Acquire, guard);
        // Safety: loaded under `guard`
        let h = unsafe { head.deref() };
        let next = h.next.load(Ordering::Acquire, guard);

        // Safety: `next` was loaded under `guard`
        match unsafe { next.as_ref() } {
            None => Ok(None),
            Some(n) => self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed, guard)
                .map(|_| {
                    // Never leave tail pointing at the retired sentinel
                    let tail = self.tail.load(Ordering::Relaxed, guard);
                    if head == tail {
                        let _ = self.tail.compare_exchange(
                            tail,
                            next,
                            Ordering::Release,
                            Ordering::Relaxed,
                            guard,
                        );
                    }
                    // Safety: winning the CAS grants exclusive ownership of
                    // `n.data`, and `head` is unreachable for new readers
                    unsafe {
                        guard.defer_destroy(head);
                        Some(n.data.assume_init_read())
                    }
                })
                .map_err(|_| ()),
        }
    }

    /// Remove the oldest value, `None` if the queue is empty
    pub fn dequeue(&self) -> Option<T> {
        let guard = &epoch::pin();
        loop {
            if let Ok(result) = self.pop_internal(guard) {
                return result;
            }
        }
    }

    /// Weakly consistent emptiness check
    ///
    /// Exact only in the absence of concurrent operations.
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        let head = self.head.load(Ordering::Acquire, guard);
        // Safety: loaded under `guard`
        unsafe { head.deref() }.next.load(Ordering::Acquire, guard).is_null()
    }
}

impl<T> Default for LockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        // Safety: `&mut self` means no other thread can touch the queue
        unsafe {
            let guard = epoch::unprotected();
            while let Ok(Some(value)) = self.pop_internal(guard) {
                drop(value);
            }
            let sentinel = self.head.load(Ordering::Relaxed, guard);
            drop(sentinel.into_owned());
        }
    }
}

impl<T> fmt::Debug for LockFreeQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("is_empty", &self.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_single_thread() {
        let queue = LockFreeQueue::new();
        assert!(queue.is_empty());

        for i in 0..10 {
            queue.enqueue(i);
        }
        assert!(!queue.is_empty());

        let drained: Vec<_> = std::iter::from_fn(|| queue.dequeue()).collect();
        assert_eq!(drained, (0..10).collect::<Vec<_>>());
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_drop_releases_remaining_values() {
        let marker = Arc::new(());
        {
            let queue = LockFreeQueue::new();
            for _ in 0..5 {
                queue.enqueue(marker.clone());
            }
            queue.dequeue();
        }
        assert_eq!(Arc::strong_count(&marker), 1);
    }

    #[test]
    fn test_concurrent_no_loss_no_duplicates() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 2_000;

        let queue = Arc::new(LockFreeQueue::new());
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.enqueue(p * PER_PRODUCER + i);
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..PRODUCERS)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    for _ in 0..PER_PRODUCER * 2 {
                        if let Some(v) = queue.dequeue() {
                            seen.push(v);
                        }
                    }
                    seen
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }

        let mut all = HashSet::new();
        for c in consumers {
            for v in c.join().unwrap() {
                assert!(all.insert(v), "value {} dequeued twice", v);
            }
        }
        while let Some(v) = queue.dequeue() {
            assert!(all.insert(v), "value {} dequeued twice", v);
        }

        assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
    }
}
