//! Store-change notification
//!
//! Every successful mutation emits a [`StoreChanged`] event naming the
//! mutated store. Delivery is synchronous: listeners run on the mutating
//! thread after the store has been persisted and before the operation
//! returns, so a listener observes the post-mutation state. The manager's
//! lookup-cache invalidation is itself an internal subscriber registered at
//! construction.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::core::StoreKind;

/// Event broadcast after a successful store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChanged {
    /// Which store was mutated
    pub store: StoreKind,
}

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked on store changes.
pub type ChangeListener = Arc<dyn Fn(StoreChanged) + Send + Sync>;

/// Listener registry with synchronous fan-out.
#[derive(Default)]
pub(crate) struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, ChangeListener)>>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(&self, listener: ChangeListener) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        SubscriptionId(id)
    }

    /// Remove a listener; returns whether it was registered.
    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id.0);
        listeners.len() != before
    }

    /// Deliver an event to every listener, in subscription order.
    ///
    /// The registry lock is released before callbacks run, so a listener may
    /// subscribe or unsubscribe without deadlocking.
    pub(crate) fn emit(&self, event: StoreChanged) {
        let snapshot: Vec<ChangeListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}
