//! Weak subscriber bookkeeping for vigilant attributes.
//!
//! The registry never owns a subscriber. A plain [`Listener`] is held through a
//! `Weak`, and a bound subscriber (`subscribe_bound`) holds a `Weak` to its owner
//! object. Once the last strong reference goes away the entry is skipped, and it
//! is pruned after the next notification pass or on the next
//! subscribe/unsubscribe.
//!
//! # Delivery guarantees
//!
//! - Deliveries run synchronously on the notifying thread, in subscription order.
//! - A panicking subscriber is logged and skipped; the others still run.
//! - `unsubscribe` waits for a delivery to that subscriber in progress on another
//!   thread, so nothing is delivered to it once `unsubscribe` has returned.
//!   Calling `unsubscribe` from inside the subscriber's own callback is allowed.

use parking_lot::{Mutex, ReentrantMutex};
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::value::Value;

/// A value-change callback. Subscribing keeps only a weak reference to it.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identifies one subscription on one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Raw id, unique per registry.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Outcome of delivering a value to one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    Failed,
    Gone,
    Unsubscribed,
}

trait Target: Send + Sync {
    /// Invoke the subscriber. Returns `false` when its owner no longer exists.
    fn deliver(&self, value: &Value) -> bool;

    fn is_alive(&self) -> bool;
}

struct WeakListener(Weak<dyn Fn(&Value) + Send + Sync>);

impl Target for WeakListener {
    fn deliver(&self, value: &Value) -> bool {
        match self.0.upgrade() {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }

    fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

struct BoundMethod<O, F> {
    owner: Weak<O>,
    method: F,
}

impl<O, F> Target for BoundMethod<O, F>
where
    O: Send + Sync,
    F: Fn(&O, &Value) + Send + Sync,
{
    fn deliver(&self, value: &Value) -> bool {
        match self.owner.upgrade() {
            Some(owner) => {
                (self.method)(&owner, value);
                true
            }
            None => false,
        }
    }

    fn is_alive(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

struct Entry {
    handle: SubscriptionHandle,
    target: Box<dyn Target>,
    /// `true` while subscribed; held during a delivery.
    active: ReentrantMutex<Cell<bool>>,
}

impl Entry {
    fn deliver(&self, value: &Value) -> Delivery {
        let active = self.active.lock();
        if !active.get() {
            return Delivery::Unsubscribed;
        }
        match catch_unwind(AssertUnwindSafe(|| self.target.deliver(value))) {
            Ok(true) => Delivery::Delivered,
            Ok(false) => Delivery::Gone,
            Err(payload) => {
                tracing::error!(
                    subscription = self.handle.id(),
                    "Subscriber failed while handling {}: {}",
                    value,
                    panic_message(payload.as_ref())
                );
                Delivery::Failed
            }
        }
    }

    /// Never blocks: an entry busy delivering on another thread counts as live.
    fn is_live(&self) -> bool {
        let active = self.active.try_lock().map(|a| a.get()).unwrap_or(true);
        active && self.target.is_alive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Ordered set of weakly-held subscribers of one attribute.
#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<Arc<Entry>>>,
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscribers", &self.entries.lock().len())
            .finish()
    }
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener, keeping only a weak reference to it.
    pub fn subscribe(&self, listener: &Listener) -> SubscriptionHandle {
        self.insert(Box::new(WeakListener(Arc::downgrade(listener))))
    }

    /// Register `method` to be called on `owner`, keeping only a weak reference
    /// to the owner.
    pub fn subscribe_bound<O, F>(&self, owner: &Arc<O>, method: F) -> SubscriptionHandle
    where
        O: Send + Sync + 'static,
        F: Fn(&O, &Value) + Send + Sync + 'static,
    {
        self.insert(Box::new(BoundMethod {
            owner: Arc::downgrade(owner),
            method,
        }))
    }

    fn insert(&self, target: Box<dyn Target>) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(Entry {
            handle,
            target,
            active: ReentrantMutex::new(Cell::new(true)),
        });
        let mut entries = self.entries.lock();
        entries.retain(|e| e.is_live());
        entries.push(entry);
        handle
    }

    /// Remove a subscription. Unknown or already removed handles are ignored.
    ///
    /// Returns whether a subscription was actually removed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = {
            let mut entries = self.entries.lock();
            let removed = entries
                .iter()
                .position(|e| e.handle == handle)
                .map(|idx| entries.remove(idx));
            entries.retain(|e| e.is_live());
            removed
        };
        match removed {
            Some(entry) => {
                // Blocks until a delivery on another thread has finished.
                entry.active.lock().set(false);
                true
            }
            None => false,
        }
    }

    /// Deliver `value` to every live subscriber, in subscription order.
    ///
    /// Returns the number of subscribers that received the value.
    pub fn notify(&self, value: &Value) -> usize {
        let snapshot: Vec<Arc<Entry>> = self.entries.lock().clone();
        let mut delivered = 0;
        let mut gone = false;
        for entry in &snapshot {
            match entry.deliver(value) {
                Delivery::Delivered => delivered += 1,
                Delivery::Gone => gone = true,
                Delivery::Failed | Delivery::Unsubscribed => {}
            }
        }
        if gone {
            self.entries.lock().retain(|e| e.is_live());
        }
        delivered
    }

    /// Deliver `value` to a single subscriber. Returns whether it was delivered.
    pub fn notify_one(&self, handle: SubscriptionHandle, value: &Value) -> bool {
        let entry = self
            .entries
            .lock()
            .iter()
            .find(|e| e.handle == handle)
            .cloned();
        matches!(entry.map(|e| e.deliver(value)), Some(Delivery::Delivered))
    }

    /// Number of subscribers whose owner is still alive.
    pub fn len(&self) -> usize {
        self.entries.lock().iter().filter(|e| e.is_live()).count()
    }

    /// Whether no live subscriber remains.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
