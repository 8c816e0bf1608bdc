//! Event bus with retrying delivery and dead-lettering
//!
//! One dispatch loop per bus dequeues events from a bounded queue and fans
//! each one out to its subscribers on a semaphore-bounded worker pool. Failed
//! deliveries are retried with a fixed delay; exhausted deliveries land in the
//! dead-letter queue, which a periodic sweep re-examines. Publish-time
//! validation errors are synchronous; handler failures never reach the
//! publisher.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::delivery::DeliveryRecord;
use super::error::{BusError, BusResult};
use super::event::{Event, EventType};
use super::handler::EventHandler;

/// Default bounded-queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Default number of concurrent delivery workers
pub const DEFAULT_WORKERS: usize = 4;

/// Bus-wide delivery configuration
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Maximum queued events before publishers block
    pub capacity: usize,
    /// Concurrent delivery tasks
    pub workers: usize,
    /// Delivery attempts per (event, handler) pair before dead-lettering
    pub max_retry_attempts: u32,
    /// Pause between delivery attempts
    pub retry_delay: Duration,
    /// How often the dead-letter queue is re-examined
    pub dead_letter_sweep_interval: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            workers: DEFAULT_WORKERS,
            max_retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            dead_letter_sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Bounded FIFO of published events.
///
/// `push` suspends the caller when the queue is full; this is the only
/// backpressure point a publisher can hit.
struct EventQueue {
    items: Mutex<VecDeque<Event>>,
    slots: Semaphore,
    ready: Notify,
}

impl EventQueue {
    fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            slots: Semaphore::new(capacity),
            ready: Notify::new(),
        }
    }

    async fn push(&self, event: Event) {
        let permit = self.slots.acquire().await.expect("queue semaphore closed");
        permit.forget();
        self.items.lock().expect("queue lock poisoned").push_back(event);
        self.ready.notify_one();
    }

    async fn pop(&self) -> Event {
        loop {
            if let Some(event) = self.items.lock().expect("queue lock poisoned").pop_front() {
                self.slots.add_permits(1);
                return event;
            }
            self.ready.notified().await;
        }
    }

    fn len(&self) -> usize {
        self.items.lock().expect("queue lock poisoned").len()
    }

    fn clear(&self) -> usize {
        let mut items = self.items.lock().expect("queue lock poisoned");
        let drained = items.len();
        items.clear();
        self.slots.add_permits(drained);
        drained
    }
}

struct BusInner {
    config: EventBusConfig,
    /// publisher name -> event types it may emit
    publishers: RwLock<HashMap<String, HashSet<EventType>>>,
    /// event type -> subscribed handlers (identity = Arc pointer)
    subscribers: RwLock<HashMap<EventType, Vec<Arc<dyn EventHandler>>>>,
    queue: EventQueue,
    dead_letters: Mutex<VecDeque<DeliveryRecord>>,
    workers: Semaphore,
}

/// Typed publish/subscribe bus with at-least-once, retrying delivery
pub struct EventBus {
    inner: Arc<BusInner>,
    shutdown_tx: watch::Sender<bool>,
    dispatch_handle: Mutex<Option<JoinHandle<()>>>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Create a bus and start its dispatch loop and dead-letter sweeper.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: EventBusConfig) -> Self {
        let inner = Arc::new(BusInner {
            workers: Semaphore::new(config.workers),
            queue: EventQueue::new(config.capacity),
            publishers: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            dead_letters: Mutex::new(VecDeque::new()),
            config,
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let dispatch_handle = tokio::spawn(dispatch_loop(Arc::clone(&inner), shutdown_rx.clone()));
        let sweeper_handle = tokio::spawn(sweep_loop(Arc::clone(&inner), shutdown_rx));

        Self {
            inner,
            shutdown_tx,
            dispatch_handle: Mutex::new(Some(dispatch_handle)),
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EventBusConfig::default())
    }

    /// Allow `name` to publish the given event types.
    ///
    /// Re-registration unions the types into the existing set; registering the
    /// same types again is a no-op. Fails without mutating anything if any
    /// type is outside the registry.
    pub fn register_publisher(&self, name: &str, event_types: &[&str]) -> BusResult<()> {
        let mut parsed = Vec::with_capacity(event_types.len());
        for raw in event_types {
            parsed.push(EventType::parse(raw)?);
        }

        let mut publishers = self.inner.publishers.write().expect("publisher lock poisoned");
        let allowed = publishers.entry(name.to_string()).or_default();
        for ty in parsed {
            allowed.insert(ty);
        }
        debug!(publisher = name, types = allowed.len(), "publisher registered");
        Ok(())
    }

    /// Remove a publisher registration entirely
    pub fn unregister_publisher(&self, name: &str) {
        let mut publishers = self.inner.publishers.write().expect("publisher lock poisoned");
        if publishers.remove(name).is_some() {
            debug!(publisher = name, "publisher unregistered");
        }
    }

    /// Subscribe a handler to an event type.
    ///
    /// Subscribing the same handler (same `Arc`) twice is a no-op; it will
    /// receive each event once.
    pub fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) -> BusResult<()> {
        let ty = EventType::parse(event_type)?;
        let mut subscribers = self.inner.subscribers.write().expect("subscriber lock poisoned");
        let entry = subscribers.entry(ty).or_default();
        if !entry.iter().any(|existing| Arc::ptr_eq(existing, &handler)) {
            debug!(event_type, handler = handler.name(), "handler subscribed");
            entry.push(handler);
        }
        Ok(())
    }

    /// Remove a handler subscription
    pub fn unsubscribe(&self, event_type: &str, handler: &Arc<dyn EventHandler>) -> BusResult<()> {
        let ty = EventType::parse(event_type)?;
        let mut subscribers = self.inner.subscribers.write().expect("subscriber lock poisoned");
        if let Some(entry) = subscribers.get_mut(&ty) {
            entry.retain(|existing| !Arc::ptr_eq(existing, handler));
        }
        Ok(())
    }

    /// Publish an event.
    ///
    /// Fails synchronously when the source is not registered for the event's
    /// type or the bus has shut down. On success the event is enqueued and the
    /// call returns without waiting for delivery; enqueueing blocks only when
    /// the bounded queue is full.
    pub async fn publish(&self, event: Event) -> BusResult<()> {
        if *self.shutdown_tx.borrow() {
            return Err(BusError::ShutDown);
        }

        {
            let publishers = self.inner.publishers.read().expect("publisher lock poisoned");
            let allowed = publishers.get(&event.source);
            if !allowed.is_some_and(|types| types.contains(&event.event_type)) {
                return Err(BusError::UnregisteredPublisher {
                    publisher: event.source.clone(),
                    event_type: event.event_type.as_str().to_string(),
                });
            }
        }

        trace!(event_type = %event.event_type, source = %event.source, "publishing event");
        self.inner.queue.push(event).await;
        Ok(())
    }

    /// Signal shutdown and wait for the dispatch loop and sweeper to stop.
    ///
    /// In-flight deliveries are allowed to drain; nothing is cancelled.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let dispatch = self.dispatch_handle.lock().expect("handle lock poisoned").take();
        if let Some(handle) = dispatch {
            let _ = handle.await;
        }
        let sweeper = self.sweeper_handle.lock().expect("handle lock poisoned").take();
        if let Some(handle) = sweeper {
            let _ = handle.await;
        }
        debug!("event bus shut down");
    }

    // === Introspection ===

    /// Number of handlers subscribed to an event type
    pub fn subscriber_count(&self, event_type: &str) -> BusResult<usize> {
        let ty = EventType::parse(event_type)?;
        let subscribers = self.inner.subscribers.read().expect("subscriber lock poisoned");
        Ok(subscribers.get(&ty).map_or(0, Vec::len))
    }

    /// Event types a publisher is registered for, or `None` if unregistered
    pub fn publisher_event_types(&self, name: &str) -> Option<Vec<EventType>> {
        let publishers = self.inner.publishers.read().expect("publisher lock poisoned");
        publishers.get(name).map(|types| {
            let mut list: Vec<EventType> = types.iter().copied().collect();
            list.sort_by_key(|ty| ty.as_str());
            list
        })
    }

    /// Events currently queued for dispatch
    pub fn queue_size(&self) -> usize {
        self.inner.queue.len()
    }

    /// Deliveries currently parked in the dead-letter queue
    pub fn dead_letter_count(&self) -> usize {
        self.inner.dead_letters.lock().expect("dead-letter lock poisoned").len()
    }

    /// Remove and return every dead-lettered delivery for inspection
    pub fn drain_dead_letters(&self) -> Vec<DeliveryRecord> {
        let mut dead_letters = self.inner.dead_letters.lock().expect("dead-letter lock poisoned");
        dead_letters.drain(..).collect()
    }

    /// Discard all queued and dead-lettered events. Used for test isolation.
    pub fn clear(&self) {
        let queued = self.inner.queue.clear();
        let mut dead_letters = self.inner.dead_letters.lock().expect("dead-letter lock poisoned");
        let dead = dead_letters.len();
        dead_letters.clear();
        debug!(queued, dead, "bus cleared");
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Dequeue events in publish order and fan each out to its subscribers.
///
/// The loop does not wait for one event's handlers before dequeuing the next;
/// all deliveries run as independent tasks on the worker pool.
async fn dispatch_loop(inner: Arc<BusInner>, mut shutdown_rx: watch::Receiver<bool>) {
    debug!("dispatch loop started");
    loop {
        let event = tokio::select! {
            event = inner.queue.pop() => event,
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
        };

        let handlers: Vec<Arc<dyn EventHandler>> = {
            let subscribers = inner.subscribers.read().expect("subscriber lock poisoned");
            subscribers.get(&event.event_type).cloned().unwrap_or_default()
        };
        trace!(event_type = %event.event_type, handlers = handlers.len(), "dispatching event");

        for handler in handlers {
            let record = DeliveryRecord::new(event.clone(), handler);
            tokio::spawn(run_delivery(Arc::clone(&inner), record));
        }
    }
    debug!("dispatch loop stopped");
}

/// Drive one delivery record to success or the dead-letter queue
async fn run_delivery(inner: Arc<BusInner>, mut record: DeliveryRecord) {
    let Ok(_permit) = inner.workers.acquire().await else {
        return;
    };
    let max_attempts = inner.config.max_retry_attempts;
    let retry_delay = inner.config.retry_delay;

    loop {
        record.attempts += 1;
        record.last_attempt = Some(Instant::now());

        match record.handler.handle(&record.event).await {
            Ok(()) => {
                trace!(
                    subscriber = %record.subscriber,
                    event_type = %record.event.event_type,
                    attempts = record.attempts,
                    "delivery succeeded"
                );
                return;
            }
            Err(err) => {
                warn!(
                    subscriber = %record.subscriber,
                    event_type = %record.event.event_type,
                    attempts = record.attempts,
                    error = %err,
                    "delivery attempt failed"
                );
                record.error = Some(err.to_string());

                if record.attempts >= max_attempts {
                    warn!(
                        subscriber = %record.subscriber,
                        event_type = %record.event.event_type,
                        "retries exhausted, dead-lettering delivery"
                    );
                    inner
                        .dead_letters
                        .lock()
                        .expect("dead-letter lock poisoned")
                        .push_back(record);
                    return;
                }
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}

/// Periodically re-examine dead-lettered deliveries.
///
/// Records whose `should_retry` has turned true are re-delivered; the rest go
/// back on the queue. Best-effort only; eventual delivery is not guaranteed.
async fn sweep_loop(inner: Arc<BusInner>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(inner.config.dead_letter_sweep_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => sweep_dead_letters(&inner),
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    debug!("dead-letter sweeper stopped");
}

fn sweep_dead_letters(inner: &Arc<BusInner>) {
    let drained: Vec<DeliveryRecord> = {
        let mut dead_letters = inner.dead_letters.lock().expect("dead-letter lock poisoned");
        dead_letters.drain(..).collect()
    };
    if drained.is_empty() {
        return;
    }

    let max_attempts = inner.config.max_retry_attempts;
    let retry_delay = inner.config.retry_delay;
    let mut kept = 0usize;
    let mut retried = 0usize;

    for record in drained {
        if record.should_retry(max_attempts, retry_delay) {
            retried += 1;
            tokio::spawn(run_delivery(Arc::clone(inner), record));
        } else {
            kept += 1;
            inner
                .dead_letters
                .lock()
                .expect("dead-letter lock poisoned")
                .push_back(record);
        }
    }
    debug!(retried, kept, "dead-letter sweep finished");
}
