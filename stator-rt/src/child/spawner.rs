//! Child spawners: erased factories for child actors.
//!
//! A spawner closes over a child machine's definition (and optionally an
//! `on_state` mapping into parent events) and produces started child actors
//! behind the [`AnyActor`](super::AnyActor) erasure. Spawners appear in two
//! places: the definition's declared-child registry (used by restore and
//! snapshot sync) and `spawn` effects carried by outcomes.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tracing::warn;

// Layer 3: Internal module imports
use super::handle::{AnyActor, DynEvent, ParentLink};
use crate::actor::{interpret, InterpretOptions};
use crate::machine::{Machine, MachineDefinition, MachineEvent};
use crate::observer::Subscription;
use crate::persist::PersistedSnapshot;

type StateMapper = Arc<dyn Fn(&str, &str) -> Option<DynEvent> + Send + Sync>;

/// Inputs to one spawn: the id, the parent link, and an optional persisted
/// snapshot to restore from.
pub(crate) struct SpawnContext {
    pub(crate) child_id: String,
    pub(crate) parent: ParentLink,
    pub(crate) restore: Option<PersistedSnapshot>,
}

/// A started child: the erased actor plus the parent's `on_state`
/// subscription, if configured.
pub(crate) struct SpawnedChild {
    pub(crate) actor: Arc<dyn AnyActor>,
    pub(crate) subscription: Option<Subscription>,
}

/// Erased factory for child actors of one machine type.
#[derive(Clone)]
pub struct ChildSpawner {
    spawn_fn: Arc<dyn Fn(SpawnContext) -> SpawnedChild + Send + Sync>,
}

impl ChildSpawner {
    /// A spawner for children running `definition`, without snapshot
    /// forwarding to the parent.
    pub fn new<CM: Machine>(definition: Arc<MachineDefinition<CM>>) -> Self {
        Self::build(definition, None)
    }

    /// A spawner whose children report snapshot changes to the parent:
    /// `on_state(child_id, state_tag)` maps each change to a parent event,
    /// enqueued on the parent's mailbox.
    pub fn with_on_state<CM: Machine, E: MachineEvent>(
        definition: Arc<MachineDefinition<CM>>,
        on_state: impl Fn(&str, &str) -> Option<E> + Send + Sync + 'static,
    ) -> Self {
        let mapper: StateMapper =
            Arc::new(move |child_id, tag| on_state(child_id, tag).map(DynEvent::new));
        Self::build(definition, Some(mapper))
    }

    fn build<CM: Machine>(
        definition: Arc<MachineDefinition<CM>>,
        mapper: Option<StateMapper>,
    ) -> Self {
        let spawn_fn = Arc::new(move |context: SpawnContext| {
            // Decode failures follow the persistence fallback policy: log
            // and start the child fresh.
            let restored = context.restore.as_ref().and_then(|persisted| {
                let codec = match definition.codec() {
                    Some(codec) => codec,
                    None => {
                        warn!(
                            child_id = %context.child_id,
                            "child definition has no codec; ignoring restore snapshot"
                        );
                        return None;
                    }
                };
                match persisted.decode::<CM>(codec.as_ref()) {
                    Ok(snapshot) => Some(snapshot),
                    Err(error) => {
                        warn!(
                            child_id = %context.child_id,
                            %error,
                            "child snapshot decode failed; starting fresh"
                        );
                        None
                    }
                }
            });

            let actor = interpret(
                Arc::clone(&definition),
                InterpretOptions {
                    snapshot: restored,
                    child_snapshots: None,
                    parent: Some(context.parent.clone()),
                },
            );

            let subscription = mapper.as_ref().map(|map| {
                let map = Arc::clone(map);
                let parent = context.parent.clone();
                let child_id = context.child_id.clone();
                actor.subscribe(move |snapshot| {
                    if let Some(event) = map(&child_id, snapshot.state_tag()) {
                        parent.send(event);
                    }
                })
            });

            SpawnedChild {
                actor: Arc::new(actor),
                subscription,
            }
        });

        Self { spawn_fn }
    }

    pub(crate) fn spawn(&self, context: SpawnContext) -> SpawnedChild {
        (self.spawn_fn)(context)
    }
}
