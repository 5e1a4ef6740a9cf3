//! Transition outcomes: the pure result of processing one event.
//!
//! Handlers describe what the runtime should do next as a value; the
//! supervisor applies it in a fixed order (context patch, snapshot publish,
//! child-tree mutations, emissions, actions, state exit/entry). Outcomes are
//! constructed either as struct literals or through the fluent builder:
//!
//! ```rust,ignore
//! Outcome::goto(DoorState::Opening { position: 0 })
//!     .update(|ctx| DoorContext { position: 0, ..ctx.clone() })
//!     .emit(DoorEvent::StartedOpening)
//!     .send_to("motor", MotorEvent::PowerOn)
//! ```

// Layer 1: Standard library imports
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none for this module)

// Layer 3: Internal module imports
use super::traits::{ContextOf, EventOf, Machine, MachineEvent, MachineState, StateOf};
use crate::child::{ChildSpawner, DynEvent};
use crate::persist::PersistedSnapshot;

/// A pure event handler: `(context, event) → Option<Outcome>`.
///
/// `None` means "handled, stay unchanged"; an absent handler means the event
/// does not match at all ([`Outcome::NoMatch`]).
pub type Handler<M> =
    Arc<dyn Fn(&ContextOf<M>, &EventOf<M>) -> Option<Outcome<M>> + Send + Sync>;

/// A functional context update, applied as a single replacement against the
/// pre-event context.
pub type ContextPatch<M> = Arc<dyn Fn(&ContextOf<M>) -> ContextOf<M> + Send + Sync>;

/// A fire-and-forget side-effect computation, closed over whatever the
/// handler captured at resolution time.
pub type Action = Arc<dyn Fn() + Send + Sync>;

/// A child-spawn instruction carried by an outcome.
#[derive(Clone)]
pub struct SpawnRequest {
    /// Unique child id within the parent.
    pub child_id: String,
    /// Factory for the child actor.
    pub spawner: ChildSpawner,
    /// Persisted snapshot to restore the child from, if any.
    pub restore: Option<PersistedSnapshot>,
}

impl fmt::Debug for SpawnRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnRequest")
            .field("child_id", &self.child_id)
            .field("restore", &self.restore.is_some())
            .finish()
    }
}

/// The ordered side-effect groups bundled with an outcome.
///
/// Application order is fixed by the supervisor: `despawns`, `spawns`,
/// `sends_to_children` and `sends_to_parent`, then `emissions`, then
/// `actions` in registration order. `cancels` removes persistent delays by
/// id.
pub struct Effects<M: Machine> {
    /// Fire-and-forget side effects, run in registration order.
    pub actions: Vec<Action>,
    /// Events published to external listeners, in declaration order.
    pub emissions: Vec<EventOf<M>>,
    /// Children to spawn (idempotent per child id).
    pub spawns: Vec<SpawnRequest>,
    /// Events routed to children by id (no-op for absent ids).
    pub sends_to_children: Vec<(String, DynEvent)>,
    /// Children that receive the event currently being processed.
    pub forwards: Vec<String>,
    /// Events routed to the parent (no-op without a parent link).
    pub sends_to_parent: Vec<DynEvent>,
    /// Children to stop and remove (no-op for absent ids).
    pub despawns: Vec<String>,
    /// Persistent delays to cancel by id.
    pub cancels: Vec<String>,
}

impl<M: Machine> Effects<M> {
    /// Empty effect bundle.
    pub fn none() -> Self {
        Self {
            actions: Vec::new(),
            emissions: Vec::new(),
            spawns: Vec::new(),
            sends_to_children: Vec::new(),
            forwards: Vec::new(),
            sends_to_parent: Vec::new(),
            despawns: Vec::new(),
            cancels: Vec::new(),
        }
    }

    /// Whether the bundle carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
            && self.emissions.is_empty()
            && self.spawns.is_empty()
            && self.sends_to_children.is_empty()
            && self.forwards.is_empty()
            && self.sends_to_parent.is_empty()
            && self.despawns.is_empty()
            && self.cancels.is_empty()
    }
}

impl<M: Machine> Default for Effects<M> {
    fn default() -> Self {
        Self::none()
    }
}

impl<M: Machine> fmt::Debug for Effects<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effects")
            .field("actions", &self.actions.len())
            .field("emissions", &self.emissions.len())
            .field("spawns", &self.spawns.len())
            .field("sends_to_children", &self.sends_to_children.len())
            .field("forwards", &self.forwards)
            .field("sends_to_parent", &self.sends_to_parent.len())
            .field("despawns", &self.despawns)
            .field("cancels", &self.cancels)
            .finish()
    }
}

/// The pure result of processing one event.
pub enum Outcome<M: Machine> {
    /// Transition to `target`, optionally patching context.
    Goto {
        /// The state to transition to (tag + payload).
        target: StateOf<M>,
        /// Optional context patch applied before the transition publishes.
        patch: Option<ContextPatch<M>>,
        /// Side effects to apply.
        effects: Effects<M>,
    },

    /// Stay in the current state, replacing the context.
    Update {
        /// Context patch forming the new context.
        patch: ContextPatch<M>,
        /// Side effects to apply.
        effects: Effects<M>,
    },

    /// Stay unchanged, applying side effects only.
    Stay {
        /// Side effects to apply.
        effects: Effects<M>,
    },

    /// No handler applied. Treated as `Stay` with empty effects; observers
    /// are not notified.
    NoMatch,
}

impl<M: Machine> Outcome<M> {
    /// Transition to `target`.
    pub fn goto(target: StateOf<M>) -> Self {
        Outcome::Goto {
            target,
            patch: None,
            effects: Effects::none(),
        }
    }

    /// Stay in the current state with an updated context.
    pub fn patch(patch: impl Fn(&ContextOf<M>) -> ContextOf<M> + Send + Sync + 'static) -> Self {
        Outcome::Update {
            patch: Arc::new(patch),
            effects: Effects::none(),
        }
    }

    /// Stay unchanged (side effects may still be attached).
    pub fn stay() -> Self {
        Outcome::Stay {
            effects: Effects::none(),
        }
    }

    /// Whether this outcome is [`Outcome::NoMatch`].
    pub fn is_no_match(&self) -> bool {
        matches!(self, Outcome::NoMatch)
    }

    /// Attach or replace the context patch.
    ///
    /// On `Stay` (or `NoMatch`) this promotes the outcome to `Update`.
    pub fn update(
        self,
        patch: impl Fn(&ContextOf<M>) -> ContextOf<M> + Send + Sync + 'static,
    ) -> Self {
        let patch: ContextPatch<M> = Arc::new(patch);
        match self {
            Outcome::Goto {
                target, effects, ..
            } => Outcome::Goto {
                target,
                patch: Some(patch),
                effects,
            },
            Outcome::Update { effects, .. } => Outcome::Update { patch, effects },
            Outcome::Stay { effects } => Outcome::Update { patch, effects },
            Outcome::NoMatch => Outcome::Update {
                patch,
                effects: Effects::none(),
            },
        }
    }

    /// Append a fire-and-forget action.
    pub fn action(mut self, action: impl Fn() + Send + Sync + 'static) -> Self {
        self.effects_mut().actions.push(Arc::new(action));
        self
    }

    /// Append an external emission.
    pub fn emit(mut self, event: EventOf<M>) -> Self {
        self.effects_mut().emissions.push(event);
        self
    }

    /// Append a child spawn (idempotent per child id at application time).
    pub fn spawn(mut self, child_id: impl Into<String>, spawner: ChildSpawner) -> Self {
        self.effects_mut().spawns.push(SpawnRequest {
            child_id: child_id.into(),
            spawner,
            restore: None,
        });
        self
    }

    /// Append a child spawn restoring from a persisted snapshot.
    pub fn spawn_restored(
        mut self,
        child_id: impl Into<String>,
        spawner: ChildSpawner,
        restore: PersistedSnapshot,
    ) -> Self {
        self.effects_mut().spawns.push(SpawnRequest {
            child_id: child_id.into(),
            spawner,
            restore: Some(restore),
        });
        self
    }

    /// Append an event for a child.
    pub fn send_to(mut self, child_id: impl Into<String>, event: impl MachineEvent) -> Self {
        self.effects_mut()
            .sends_to_children
            .push((child_id.into(), DynEvent::new(event)));
        self
    }

    /// Forward the event currently being processed to a child. A no-op for
    /// outcomes applied without an in-flight event (timers, invoke
    /// terminations).
    pub fn forward(mut self, child_id: impl Into<String>) -> Self {
        self.effects_mut().forwards.push(child_id.into());
        self
    }

    /// Append an event for the parent actor.
    pub fn send_parent(mut self, event: impl MachineEvent) -> Self {
        self.effects_mut().sends_to_parent.push(DynEvent::new(event));
        self
    }

    /// Append a child despawn.
    pub fn despawn(mut self, child_id: impl Into<String>) -> Self {
        self.effects_mut().despawns.push(child_id.into());
        self
    }

    /// Append a persistent-delay cancellation.
    pub fn cancel_delay(mut self, delay_id: impl Into<String>) -> Self {
        self.effects_mut().cancels.push(delay_id.into());
        self
    }

    fn effects_mut(&mut self) -> &mut Effects<M> {
        if self.is_no_match() {
            *self = Outcome::stay();
        }
        match self {
            Outcome::Goto { effects, .. }
            | Outcome::Update { effects, .. }
            | Outcome::Stay { effects } => effects,
            // Rewritten above.
            Outcome::NoMatch => unreachable!("NoMatch promoted to Stay"),
        }
    }
}

impl<M: Machine> fmt::Debug for Outcome<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Goto {
                target, patch, effects,
            } => f
                .debug_struct("Goto")
                .field("target", &target.tag())
                .field("patch", &patch.is_some())
                .field("effects", effects)
                .finish(),
            Outcome::Update { effects, .. } => {
                f.debug_struct("Update").field("effects", effects).finish()
            }
            Outcome::Stay { effects } => {
                f.debug_struct("Stay").field("effects", effects).finish()
            }
            Outcome::NoMatch => f.write_str("NoMatch"),
        }
    }
}
