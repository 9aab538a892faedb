/*!
 * Lock-Free Dual Queue (Scherer–Scott)
 *
 * A queue that holds either data items or outstanding requests for data.
 * A consumer that finds no data appends a REQUEST node and spins until a
 * producer fulfils it; a producer that finds requests at the tail fulfils
 * the oldest one instead of appending.
 *
 * # Invariants
 *
 * - The list is all DATA nodes optionally followed by REQUEST nodes, never
 *   interleaved.
 * - The fulfilment slot of a REQUEST node lives in its predecessor's
 *   `request` link. That link is written once: either null → fulfilling node
 *   (by a producer) or null → `WITHDRAWN` tag (by the requesting consumer
 *   when it gives up). Whichever CAS wins decides the request's fate.
 * - `next` links are write-once, exactly as in the Michael–Scott queue.
 *
 * # Memory Reclamation
 *
 * Nodes are freed through crossbeam-epoch. A spinning consumer keeps its
 * guard pinned for the whole wait because it dereferences its predecessor
 * node until the request resolves; long waits therefore delay (but never
 * compromise) reclamation.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::config::SyncConfig;
use crate::core::sync::timeout::{Deadline, Timeout};
use crate::core::sync::wait::{Backoff, CancellationToken};
use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::Ordering;
use tracing::trace;

/// Tag stored in a null `request` link once its consumer gave up
const WITHDRAWN: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Data,
    Request,
}

struct Node<T> {
    kind: NodeKind,
    /// Initialized for DATA nodes until consumed
    data: MaybeUninit<T>,
    /// Fulfilment slot for the REQUEST node that follows this one
    request: Atomic<Node<T>>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn data(value: T) -> Self {
        Self {
            kind: NodeKind::Data,
            data: MaybeUninit::new(value),
            request: Atomic::null(),
            next: Atomic::null(),
        }
    }

    fn request() -> Self {
        Self {
            kind: NodeKind::Request,
            data: MaybeUninit::uninit(),
            request: Atomic::null(),
            next: Atomic::null(),
        }
    }
}

/// A `request` link is resolved once it holds a node or the withdrawn tag
#[inline(always)]
fn is_resolved<T>(link: Shared<'_, Node<T>>) -> bool {
    !link.is_null() || link.tag() == WITHDRAWN
}

/// Lock-free queue of data items or pending requests for data
pub struct LockFreeDualQueue<T> {
    head: Atomic<Node<T>>,
    tail: Atomic<Node<T>>,
    config: SyncConfig,
}

// Safety: payloads are moved between threads exactly once; nodes are only
// reclaimed through epoch guards.
unsafe impl<T: Send> Send for LockFreeDualQueue<T> {}
unsafe impl<T: Send> Sync for LockFreeDualQueue<T> {}

impl<T> LockFreeDualQueue<T> {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    /// Create with custom busy-wait tuning for blocked consumers
    pub fn with_config(config: SyncConfig) -> Self {
        let queue = Self {
            head: Atomic::null(),
            tail: Atomic::null(),
            config,
        };
        // The sentinel is a DATA node whose payload is never read
        let sentinel = Owned::new(Node {
            kind: NodeKind::Data,
            data: MaybeUninit::uninit(),
            request: Atomic::null(),
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

    /// Swing `head` from `from` to `to`, retiring `from` on success
    fn advance_head<'g>(
        &self,
        from: Shared<'g, Node<T>>,
        to: Shared<'g, Node<T>>,
        guard: &'g Guard,
    ) -> bool {
        if to.is_null() {
            return false;
        }
        match self
            .head
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Relaxed, guard)
        {
            Ok(_) => {
                // Safety: `from` is now unreachable from `head`; readers that
                // still hold it are pinned
                unsafe { guard.defer_destroy(from) };
                true
            }
            Err(_) => false,
        }
    }

    /// Add a data item, fulfilling the oldest pending request if any
    pub fn enqueue(&self, value: T) {
        let guard = &epoch::pin();
        let mut node = Owned::new(Node::data(value));

        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            let head = self.head.load(Ordering::Acquire, guard);
            // Safety: loaded under `guard`
            let t = unsafe { tail.deref() };

            if tail == head || t.kind != NodeKind::Request {
                // Empty or holding data: append as in Michael–Scott
                let next = t.next.load(Ordering::Acquire, guard);
                if tail != self.tail.load(Ordering::Acquire, guard) {
                    continue;
                }
                if !next.is_null() {
                    let _ = self.tail.compare_exchange(
                        tail,
                        next,
                        Ordering::Release,
                        Ordering::Relaxed,
                        guard,
                    );
                    continue;
                }
                match t.next.compare_exchange(
                    Shared::null(),
                    node,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                ) {
                    Ok(linked) => {
                        let _ = self.tail.compare_exchange(
                            tail,
                            linked,
                            Ordering::Release,
                            Ordering::Relaxed,
                            guard,
                        );
                        return;
                    }
                    Err(err) => node = err.new,
                }
            } else {
                // Requests outstanding: fulfil the one right after head
                // Safety: loaded under `guard`
                let h = unsafe { head.deref() };
                let next = h.next.load(Ordering::Acquire, guard);
                if tail != self.tail.load(Ordering::Acquire, guard) {
                    continue;
                }
                let slot = h.request.load(Ordering::Acquire, guard);
                if head != self.head.load(Ordering::Acquire, guard) {
                    continue;
                }

                if !is_resolved(slot) {
                    match h.request.compare_exchange(
                        Shared::null(),
                        node,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    ) {
                        Ok(_) => {
                            // The fulfilled request becomes the new sentinel
                            self.advance_head(head, next, guard);
                            return;
                        }
                        Err(err) => node = err.new,
                    }
                }
                // Already fulfilled or withdrawn: help unlink it and retry
                self.advance_head(head, next, guard);
            }
        }
    }

    /// Remove a data item without registering a request
    pub fn try_dequeue(&self) -> Option<T> {
        let guard = &epoch::pin();
        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            let tail = self.tail.load(Ordering::Acquire, guard);
            // Safety: loaded under `guard`
            let t = unsafe { tail.deref() };
            if head == tail || t.kind == NodeKind::Request {
                // Tail may be lagging behind a freshly appended data node
                // Safety: loaded under `guard`
                let h = unsafe { head.deref() };
                let next = h.next.load(Ordering::Acquire, guard);
                // Safety: loaded under `guard`
                match unsafe { next.as_ref() } {
                    Some(n) if n.kind == NodeKind::Data => {
                        let _ = self.tail.compare_exchange(
                            tail,
                            next,
                            Ordering::Release,
                            Ordering::Relaxed,
                            guard,
                        );
                        continue;
                    }
                    _ => return None,
                }
            }
            if let Some(value) = self.claim_data(head, tail, guard) {
                return Some(value);
            }
        }
    }

    /// Try to take the data item after `head`
    fn claim_data<'g>(
        &self,
        head: Shared<'g, Node<T>>,
        tail: Shared<'g, Node<T>>,
        guard: &'g Guard,
    ) -> Option<T> {
        // Safety: loaded under `guard`
        let h = unsafe { head.deref() };
        let next = h.next.load(Ordering::Acquire, guard);
        if tail != self.tail.load(Ordering::Acquire, guard) {
            return None;
        }
        // Safety: loaded under `guard`
        let n = unsafe { next.as_ref() }?;
        if n.kind != NodeKind::Data {
            return None;
        }
        if self.advance_head(head, next, guard) {
            // Safety: winning the head CAS grants exclusive ownership of the
            // new sentinel's payload
            Some(unsafe { n.data.assume_init_read() })
        } else {
            None
        }
    }

    /// Remove a data item, spinning until one is available
    pub fn dequeue(&self) -> T {
        // Without a deadline or token the wait only ends with data
        loop {
            if let Ok(Some(value)) = self.dequeue_inner(&Deadline::forever(), None) {
                return value;
            }
        }
    }

    /// Remove a data item, spinning for at most `timeout`
    ///
    /// A request that times out is withdrawn and will not swallow a later
    /// enqueue.
    pub fn dequeue_timeout(&self, timeout: impl Into<Timeout>) -> Option<T> {
        let timeout = timeout.into();
        if timeout.is_no_wait() {
            return self.try_dequeue();
        }
        self.dequeue_inner(&timeout.start(), None).ok().flatten()
    }

    /// Remove a data item, spinning until one arrives or `token` fires
    ///
    /// A request fulfilled before the cancellation is observed still returns
    /// its value.
    pub fn dequeue_cancellable(&self, token: &CancellationToken) -> SyncResult<T> {
        match self.dequeue_inner(&Timeout::Forever.start(), Some(token))? {
            Some(value) => Ok(value),
            None => Err(SyncError::Cancelled),
        }
    }

    fn dequeue_inner(
        &self,
        deadline: &Deadline,
        cancel: Option<&CancellationToken>,
    ) -> SyncResult<Option<T>> {
        let guard = &epoch::pin();
        let mut request: Option<Owned<Node<T>>> = None;

        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            let tail = self.tail.load(Ordering::Acquire, guard);
            // Safety: loaded under `guard`
            let t = unsafe { tail.deref() };

            if tail != head && t.kind == NodeKind::Data {
                // Queue holds real data
                if let Some(value) = self.claim_data(head, tail, guard) {
                    return Ok(Some(value));
                }
                continue;
            }

            // Empty, tail lagging, or only requests: link in a request
            let next = t.next.load(Ordering::Acquire, guard);
            if tail != self.tail.load(Ordering::Acquire, guard) {
                continue;
            }
            if !next.is_null() {
                let _ = self
                    .tail
                    .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, guard);
                continue;
            }

            let node = request.take().unwrap_or_else(|| Owned::new(Node::request()));
            let mine = match t.next.compare_exchange(
                Shared::null(),
                node,
                Ordering::Release,
                Ordering::Relaxed,
                guard,
            ) {
                Ok(mine) => mine,
                Err(err) => {
                    request = Some(err.new);
                    continue;
                }
            };
            let _ = self
                .tail
                .compare_exchange(tail, mine, Ordering::Release, Ordering::Relaxed, guard);

            // Help a producer that already resolved the request at head
            // Safety: loaded under `guard`
            let h = unsafe { head.deref() };
            if head == self.head.load(Ordering::Acquire, guard)
                && is_resolved(h.request.load(Ordering::Acquire, guard))
            {
                self.advance_head(head, h.next.load(Ordering::Acquire, guard), guard);
            }

            return self.await_fulfilment(tail, mine, deadline, cancel, guard);
        }
    }

    /// Spin on the predecessor's `request` link until it resolves
    fn await_fulfilment<'g>(
        &self,
        pred: Shared<'g, Node<T>>,
        mine: Shared<'g, Node<T>>,
        deadline: &Deadline,
        cancel: Option<&CancellationToken>,
        guard: &'g Guard,
    ) -> SyncResult<Option<T>> {
        // Safety: `pred` stays allocated while `guard` is pinned
        let p = unsafe { pred.deref() };
        let mut backoff = Backoff::new(self.config);

        let fulfilling = loop {
            let slot = p.request.load(Ordering::Acquire, guard);
            if !slot.is_null() {
                break slot;
            }

            let cancelled = cancel.is_some_and(|token| token.is_cancelled());
            if cancelled || deadline.is_expired() {
                match p.request.compare_exchange(
                    Shared::null(),
                    Shared::null().with_tag(WITHDRAWN),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                ) {
                    Ok(_) => {
                        trace!(cancelled, "dual queue request withdrawn");
                        self.snip(pred, mine, guard);
                        return if cancelled {
                            Err(SyncError::Cancelled)
                        } else {
                            Ok(None)
                        };
                    }
                    // A producer got there first: take its value
                    Err(err) => break err.current,
                }
            }
            backoff.snooze(deadline);
        };

        self.snip(pred, mine, guard);

        // Safety: the producer's CAS published the node and only this
        // consumer ever reads or frees it
        unsafe {
            let value = fulfilling.deref().data.assume_init_read();
            guard.defer_destroy(fulfilling);
            Ok(Some(value))
        }
    }

    /// Help unlink a resolved request by moving head onto it
    fn snip<'g>(&self, pred: Shared<'g, Node<T>>, mine: Shared<'g, Node<T>>, guard: &'g Guard) {
        if self.head.load(Ordering::Acquire, guard) == pred {
            self.advance_head(pred, mine, guard);
        }
    }

    /// Empty, or holding only requests (weakly consistent)
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        let head = self.head.load(Ordering::Acquire, guard);
        let tail = self.tail.load(Ordering::Acquire, guard);
        // Safety: loaded under `guard`
        head == tail || unsafe { tail.deref() }.kind == NodeKind::Request
    }
}

impl<T> Default for LockFreeDualQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeDualQueue<T> {
    fn drop(&mut self) {
        // Safety: `&mut self` excludes every other accessor; consumers that
        // were fulfilled already freed their fulfilling nodes
        unsafe {
            let guard = epoch::unprotected();
            let mut current = self.head.load(Ordering::Relaxed, guard);
            let mut is_sentinel = true;
            while !current.is_null() {
                let mut owned = current.into_owned();
                let next = owned.next.load(Ordering::Relaxed, guard);
                if !is_sentinel && owned.kind == NodeKind::Data {
                    owned.data.assume_init_drop();
                }
                drop(owned);
                is_sentinel = false;
                current = next;
            }
        }
    }
}

impl<T> fmt::Debug for LockFreeDualQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeDualQueue")
            .field("is_empty", &self.is_empty())
            .finish()
    }
}
