//! The parent-owned table of running children.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tracing::debug;

// Layer 3: Internal module imports
use super::handle::AnyActor;
use super::spawner::SpawnedChild;
use crate::observer::Subscription;

pub(crate) struct ChildEntry {
    pub(crate) actor: Arc<dyn AnyActor>,
    pub(crate) subscription: Option<Subscription>,
}

/// Children keyed by id, exclusively owned by one parent actor.
///
/// Mutations happen only on the parent's supervisor task; reads (child
/// lookup, persistence) may come from other threads through the shared
/// registry cell the actor handle holds.
pub(crate) struct ChildRegistry {
    children: HashMap<String, ChildEntry>,
}

impl ChildRegistry {
    pub(crate) fn new() -> Self {
        Self {
            children: HashMap::new(),
        }
    }

    pub(crate) fn contains(&self, child_id: &str) -> bool {
        self.children.contains_key(child_id)
    }

    pub(crate) fn actor(&self, child_id: &str) -> Option<Arc<dyn AnyActor>> {
        self.children
            .get(child_id)
            .map(|entry| Arc::clone(&entry.actor))
    }

    /// Record a started child. Callers check idempotency first; inserting an
    /// existing id is a logic error the map silently masks, so keep the
    /// check at the call site.
    pub(crate) fn insert(&mut self, child_id: String, spawned: SpawnedChild) {
        debug!(child_id = %child_id, "child spawned");
        self.children.insert(
            child_id,
            ChildEntry {
                actor: spawned.actor,
                subscription: spawned.subscription,
            },
        );
    }

    /// Stop and remove one child; absent ids are a no-op.
    pub(crate) fn despawn(&mut self, child_id: &str) {
        if let Some(entry) = self.children.remove(child_id) {
            debug!(child_id = %child_id, "child despawned");
            if let Some(subscription) = entry.subscription {
                subscription.unsubscribe();
            }
            entry.actor.stop_actor();
        }
    }

    /// Stop every child (actor stop cascade). Each child's own stop
    /// recursively releases its subtree, so the cascade is depth-first from
    /// the ownership perspective.
    pub(crate) fn stop_all(&mut self) {
        for (child_id, entry) in self.children.drain() {
            debug!(child_id = %child_id, "stopping child");
            if let Some(subscription) = entry.subscription {
                subscription.unsubscribe();
            }
            entry.actor.stop_actor();
        }
    }

    pub(crate) fn ids(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }
}
