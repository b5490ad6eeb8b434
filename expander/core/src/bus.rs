//! View Event Bus
//!
//! A small publish/subscribe registry mapping each [`ViewEventKind`] to the
//! listeners subscribed to it. This is the Rust-side stand-in for the host's
//! plugin event bus.
//!
//! # Subscription Identity
//!
//! Listeners are `Arc<dyn ViewEventListener>` and are identified by pointer:
//! subscribing the same `Arc` twice to the same kind is a no-op, and
//! unsubscribing needs the same `Arc` that was subscribed. Owners keep their
//! listener `Arc`s for their whole lifetime and use them as tokens.
//!
//! # Thread Safety
//!
//! The registry uses `Arc<RwLock<>>`. Emission clones the matching listeners
//! out of the read lock before invoking them, so a listener may subscribe or
//! unsubscribe while being called.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::{ViewEvent, ViewEventKind};

/// A callback subscribed to view events
///
/// `on_event` is called synchronously on the emitting task and must not
/// block. Listeners that need I/O spawn their own work.
pub trait ViewEventListener: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &'static str;

    /// Handle one event
    fn on_event(&self, event: &ViewEvent);
}

type ListenerList = Vec<Arc<dyn ViewEventListener>>;

fn same_listener(a: &Arc<dyn ViewEventListener>, b: &Arc<dyn ViewEventListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Registry of view event listeners
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<RwLock<HashMap<ViewEventKind, ListenerList>>>,
}

impl EventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener to one event kind
    ///
    /// Returns false if this exact listener was already subscribed to `kind`.
    pub fn on(&self, kind: ViewEventKind, listener: Arc<dyn ViewEventListener>) -> bool {
        let mut inner = self.inner.write();
        let listeners = inner.entry(kind).or_default();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        tracing::debug!(kind = %kind, listener = listener.name(), "Listener subscribed");
        listeners.push(listener);
        true
    }

    /// Unsubscribe a listener from one event kind
    ///
    /// Returns false if it was not subscribed.
    pub fn off(&self, kind: ViewEventKind, listener: &Arc<dyn ViewEventListener>) -> bool {
        let mut inner = self.inner.write();
        let Some(listeners) = inner.get_mut(&kind) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            inner.remove(&kind);
        }
        if removed {
            tracing::debug!(kind = %kind, listener = listener.name(), "Listener unsubscribed");
        }
        removed
    }

    /// Deliver an event to every listener subscribed to its kind
    ///
    /// Listeners run in subscription order. Returns how many were invoked.
    pub fn emit(&self, event: &ViewEvent) -> usize {
        let listeners: ListenerList = self
            .inner
            .read()
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();

        for listener in &listeners {
            listener.on_event(event);
        }
        listeners.len()
    }

    /// Number of listeners subscribed to `kind`
    #[must_use]
    pub fn listener_count(&self, kind: ViewEventKind) -> usize {
        self.inner.read().get(&kind).map_or(0, Vec::len)
    }

    /// Number of (kind, listener) subscriptions
    #[must_use]
    pub fn total_subscriptions(&self) -> usize {
        self.inner.read().values().map(Vec::len).sum()
    }

    /// Names of the listeners subscribed to `kind`, in call order
    #[must_use]
    pub fn listener_names(&self, kind: ViewEventKind) -> Vec<&'static str> {
        self.inner
            .read()
            .get(&kind)
            .map(|listeners| listeners.iter().map(|l| l.name()).collect())
            .unwrap_or_default()
    }
}
