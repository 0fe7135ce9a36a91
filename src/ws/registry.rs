//! Subscription registry: which (instrument, mode) pairs the server has been
//! asked to stream, and the callback slot for each mode.
//!
//! A callback belongs to a mode, not to an instrument. Every subscribe call
//! replaces the slot for its mode (passing `None` empties it); unsubscribing
//! never touches the slot.

use std::fmt;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};

use crate::types::feed::{FeedEvent, Mode, Subscription};

/// A callback invoked for every cached update of the mode it is registered
/// under.
///
/// Runs synchronously on the feed's receive task; a panic inside the callback
/// is caught and logged, and the feed carries on.
#[derive(Clone)]
pub struct FeedHandler(Arc<dyn Fn(&FeedEvent) + Send + Sync>);

impl FeedHandler {
    /// Wrap a closure as a feed callback.
    pub fn new(f: impl Fn(&FeedEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub(crate) fn call(&self, event: &FeedEvent) {
        (self.0)(event)
    }
}

impl fmt::Debug for FeedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FeedHandler(..)")
    }
}

#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    active: DashSet<Subscription>,
    handlers: DashMap<Mode, FeedHandler>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, subscription: Subscription) {
        self.active.insert(subscription);
    }

    pub(crate) fn remove(&self, subscription: &Subscription) -> bool {
        self.active.remove(subscription).is_some()
    }

    pub(crate) fn contains(&self, subscription: &Subscription) -> bool {
        self.active.contains(subscription)
    }

    /// Run `f` only if `subscription` is active, holding its shard lock for
    /// the duration so a concurrent [`remove`](Self::remove) waits for `f`.
    ///
    /// Lock order: registry shard, then cache shard. Never the reverse.
    pub(crate) fn with_active<R>(&self, subscription: &Subscription, f: impl FnOnce() -> R) -> Option<R> {
        let _guard = self.active.get(subscription)?;
        Some(f())
    }

    pub(crate) fn subscriptions(&self) -> Vec<Subscription> {
        self.active.iter().map(|s| s.key().clone()).collect()
    }

    pub(crate) fn clear_subscriptions(&self) {
        self.active.clear();
    }

    pub(crate) fn set_handler(&self, mode: Mode, handler: Option<FeedHandler>) {
        match handler {
            Some(h) => {
                self.handlers.insert(mode, h);
            }
            None => {
                self.handlers.remove(&mode);
            }
        }
    }

    pub(crate) fn handler(&self, mode: Mode) -> Option<FeedHandler> {
        self.handlers.get(&mode).map(|h| h.value().clone())
    }
}
