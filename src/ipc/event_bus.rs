/*!
 * Event Bus
 *
 * Typed publish/subscribe with a bounded backlog per subscriber.
 *
 * # Design
 *
 * Subscribers run their handler loop on the calling thread. Each one owns
 * a backlog and a condvar paired with the bus mutex, so `publish` wakes
 * exactly the handlers it fed. Handlers execute with the bus lock
 * released.
 *
 * # Backpressure
 *
 * A message is dropped for a subscriber whose backlog is already full
 * (drop-newest). Other subscribers still receive it.
 *
 * # Shutdown From a Handler
 *
 * `shutdown` waits for every handler loop to exit, including the caller's
 * own. Calling it from inside a handler fails with `IllegalState` instead
 * of waiting forever.
 */

use crate::core::data_structures::{OrderedSlots, SlotHandle};
use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{DEFAULT_MAX_PENDING, MAX_PENDING_LIMIT};
use crate::core::sync::CancellationToken;
use ahash::HashMap;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::any::{type_name, Any, TypeId};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

type Message = Arc<dyn Any + Send + Sync>;

/// Event bus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Backlog bound per subscriber
    pub max_pending: usize,
}

impl BusConfig {
    pub const fn new(max_pending: usize) -> Self {
        Self { max_pending }
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.max_pending == 0 || self.max_pending > MAX_PENDING_LIMIT {
            return Err(SyncError::InvalidArgument(format!(
                "max_pending must be in 1..={}, got {}",
                MAX_PENDING_LIMIT, self.max_pending
            )));
        }
        Ok(())
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }
}

struct Subscriber {
    backlog: VecDeque<Message>,
    wake: Arc<Condvar>,
    /// Thread running this subscriber's handler loop
    thread: ThreadId,
}

#[derive(Default)]
struct BusState {
    subscribers: HashMap<TypeId, OrderedSlots<Subscriber>>,
    shutting_down: bool,
    running: usize,
}

struct BusShared {
    config: BusConfig,
    state: Mutex<BusState>,
    all_exited: Condvar,
}

/// Removes a subscriber when its handler loop ends, however it ends
struct Registration<'a> {
    shared: &'a BusShared,
    topic: TypeId,
    slot: SlotHandle,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if let Some(slots) = state.subscribers.get_mut(&self.topic) {
            slots.remove(self.slot);
            if slots.is_empty() {
                state.subscribers.remove(&self.topic);
            }
        }
        state.running -= 1;
        if state.running == 0 && state.shutting_down {
            self.shared.all_exited.notify_all();
        }
    }
}

/// Broadcast bus keyed by message type
pub struct EventBus {
    shared: Arc<BusShared>,
}

impl EventBus {
    /// Create a bus with the default backlog bound
    pub fn new() -> Self {
        Self::build(BusConfig::default())
    }

    pub fn with_config(config: BusConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: BusConfig) -> Self {
        Self {
            shared: Arc::new(BusShared {
                config,
                state: Mutex::new(BusState::default()),
                all_exited: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.shared.config
    }

    /// Run `handler` for every `M` published until the bus shuts down
    ///
    /// Returns once shutdown has begun and this subscriber's backlog is
    /// drained. Subscribing to a bus that is already shutting down returns
    /// immediately.
    pub fn subscribe<M, F>(&self, handler: F) -> SyncResult<()>
    where
        M: Any + Send + Sync,
        F: FnMut(&M),
    {
        self.run_subscriber(handler, None)
    }

    /// Like [`subscribe`](Self::subscribe), leaving with `Cancelled` when
    /// `token` fires while the backlog is empty
    pub fn subscribe_cancellable<M, F>(&self, handler: F, token: &CancellationToken) -> SyncResult<()>
    where
        M: Any + Send + Sync,
        F: FnMut(&M),
    {
        self.run_subscriber(handler, Some(token))
    }

    fn run_subscriber<M, F>(&self, mut handler: F, token: Option<&CancellationToken>) -> SyncResult<()>
    where
        M: Any + Send + Sync,
        F: FnMut(&M),
    {
        let topic = TypeId::of::<M>();
        let wake = Arc::new(Condvar::new());

        let registration = {
            let mut state = self.shared.state.lock();
            if state.shutting_down {
                return Ok(());
            }
            let slot = state.subscribers.entry(topic).or_default().push_tail(Subscriber {
                backlog: VecDeque::new(),
                wake: Arc::clone(&wake),
                thread: thread::current().id(),
            });
            state.running += 1;
            Registration {
                shared: &self.shared,
                topic,
                slot,
            }
        };
        debug!(topic = type_name::<M>(), "subscriber registered");

        let _waker = token.map(|token| {
            let shared = Arc::clone(&self.shared);
            let wake = Arc::clone(&wake);
            token.register(Arc::new(move || {
                let _state = shared.state.lock();
                wake.notify_one();
            }))
        });

        let mut state = self.shared.state.lock();
        let result = loop {
            match Self::next_message(&mut state, &registration) {
                Some(message) => {
                    if let Some(message) = message.downcast_ref::<M>() {
                        MutexGuard::unlocked(&mut state, || handler(message));
                    }
                }
                None if state.shutting_down => break Ok(()),
                None if token.is_some_and(|token| token.is_cancelled()) => {
                    break Err(SyncError::Cancelled)
                }
                None => wake.wait(&mut state),
            }
        };
        drop(state);

        debug!(topic = type_name::<M>(), cancelled = result.is_err(), "subscriber exited");
        result
    }

    fn next_message(state: &mut BusState, registration: &Registration<'_>) -> Option<Message> {
        state
            .subscribers
            .get_mut(&registration.topic)?
            .get_mut(registration.slot)?
            .backlog
            .pop_front()
    }

    /// Deliver `message` to every subscriber of its type
    ///
    /// Returns how many subscribers accepted it; full backlogs drop it.
    pub fn publish<M>(&self, message: M) -> SyncResult<usize>
    where
        M: Any + Send + Sync,
    {
        let mut state = self.shared.state.lock();
        if state.shutting_down {
            return Err(SyncError::Rejected("event bus is shutting down".into()));
        }

        let Some(subscribers) = state.subscribers.get_mut(&TypeId::of::<M>()) else {
            return Ok(0);
        };

        let message: Message = Arc::new(message);
        let mut accepted = 0;
        for subscriber in subscribers.iter_mut() {
            if subscriber.backlog.len() >= self.shared.config.max_pending {
                trace!(topic = type_name::<M>(), "backlog full, message dropped");
                continue;
            }
            subscriber.backlog.push_back(Arc::clone(&message));
            subscriber.wake.notify_one();
            accepted += 1;
        }
        Ok(accepted)
    }

    /// Stop accepting messages and wait for every handler loop to exit
    ///
    /// Idempotent; concurrent callers all wait for the same drain. Fails
    /// with `IllegalState` when called from a handler of this bus.
    pub fn shutdown(&self) -> SyncResult<()> {
        let mut state = self.shared.state.lock();
        let current = thread::current().id();
        if state
            .subscribers
            .values()
            .flat_map(|slots| slots.iter())
            .any(|subscriber| subscriber.thread == current)
        {
            return Err(SyncError::IllegalState(
                "event bus shutdown called from one of its own handlers".into(),
            ));
        }
        if !state.shutting_down {
            debug!(running = state.running, "event bus shutting down");
            for subscriber in state.subscribers.values().flat_map(|slots| slots.iter()) {
                subscriber.wake.notify_one();
            }
            state.shutting_down = true;
        }
        while state.running > 0 {
            self.shared.all_exited.wait(&mut state);
        }
        Ok(())
    }

    /// Number of active subscribers for message type `M`
    pub fn subscriber_count<M: Any>(&self) -> usize {
        self.shared
            .state
            .lock()
            .subscribers
            .get(&TypeId::of::<M>())
            .map_or(0, |slots| slots.len())
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.state.lock().shutting_down
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("EventBus")
            .field("max_pending", &self.shared.config.max_pending)
            .field("running", &state.running)
            .field("shutting_down", &state.shutting_down)
            .finish()
    }
}
