//! External emission channel with per-tag listeners.
//!
//! Emissions are events published *out of* the actor tree; they are distinct
//! from events sent to self or to children. Listeners register per event tag
//! and are invoked synchronously during outcome application, after
//! child-tree mutations and before actions.

// Layer 1: Standard library imports
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tracing::warn;

// Layer 3: Internal module imports
use super::subscription::Subscription;
use crate::machine::{EventOf, Machine, MachineEvent};

type Listener<M> = Arc<dyn Fn(&EventOf<M>) + Send + Sync>;

/// Per-tag emission listener registry for one actor.
///
/// Shares the actor's stop flag and re-checks it before every listener
/// invocation, so a `stop()` landing mid-dispatch suppresses the listeners
/// the pass has not reached yet.
pub struct Emitter<M: Machine> {
    inner: Arc<EmitterInner<M>>,
}

struct EmitterInner<M: Machine> {
    next_id: AtomicU64,
    listeners: DashMap<String, Vec<(u64, Listener<M>)>>,
    stopped: Arc<AtomicBool>,
}

impl<M: Machine> Emitter<M> {
    pub(crate) fn new(stopped: Arc<AtomicBool>) -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                next_id: AtomicU64::new(0),
                listeners: DashMap::new(),
                stopped,
            }),
        }
    }

    /// Register `listener` for events with `tag`.
    pub(crate) fn on(
        &self,
        tag: impl Into<String>,
        listener: impl Fn(&EventOf<M>) + Send + Sync + 'static,
    ) -> Subscription {
        let tag = tag.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        self.inner
            .listeners
            .entry(tag.clone())
            .or_default()
            .push((id, Arc::new(listener)));

        let weak: Weak<EmitterInner<M>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Some(mut entry) = inner.listeners.get_mut(&tag) {
                    entry.retain(|(listener_id, _)| *listener_id != id);
                }
            }
        })
    }

    /// Dispatch `event` to every listener registered for its tag, in
    /// registration order. Listener panics are caught and isolated; the
    /// stop flag is consulted before each call so a stopped actor fires no
    /// further listeners.
    pub(crate) fn emit(&self, event: &EventOf<M>) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }

        let listeners: Vec<Listener<M>> = match self.inner.listeners.get(event.tag()) {
            Some(entry) => entry.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return,
        };

        for listener in listeners {
            if self.inner.stopped.load(Ordering::SeqCst) {
                return;
            }
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(tag = event.tag(), "emission listener panicked; isolated");
            }
        }
    }

    /// Drop every registration (actor stop).
    pub(crate) fn clear(&self) {
        self.inner.listeners.clear();
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self, tag: &str) -> usize {
        self.inner
            .listeners
            .get(tag)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }
}

impl<M: Machine> Clone for Emitter<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
