//! Type-erased actor handles for the parent/child boundary.
//!
//! A parent's children may run different machine definitions, so the child
//! registry stores handles behind [`AnyActor`]. Events cross the erasure
//! boundary as [`DynEvent`] and are downcast at the receiving actor; a
//! mismatch is logged and dropped, never fatal.

// Layer 1: Standard library imports
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::codec::CodecError;
use crate::machine::MachineEvent;
use crate::persist::PersistedSnapshot;
use crate::util::ActorId;

/// A machine event erased to cross between differently-typed actors.
#[derive(Clone)]
pub struct DynEvent {
    tag: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl DynEvent {
    /// Erase a typed event.
    pub fn new<E: MachineEvent>(event: E) -> Self {
        Self {
            tag: event.tag(),
            inner: Arc::new(event),
        }
    }

    /// The erased event's tag (for logging and mismatch diagnostics).
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Recover the typed event, cloning it out of the erased container.
    pub fn downcast<E: MachineEvent>(&self) -> Option<E> {
        self.inner.downcast_ref::<E>().cloned()
    }
}

impl fmt::Debug for DynEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynEvent").field("tag", &self.tag).finish()
    }
}

/// Machine-type-agnostic view of a running actor.
///
/// `ActorRef<M>` implements this for every machine type; the child registry
/// and parent links hold actors through it.
pub trait AnyActor: Send + Sync + 'static {
    /// The actor's id.
    fn actor_id(&self) -> ActorId;

    /// Enqueue an erased event; silently dropped after stop, logged and
    /// dropped on a type mismatch.
    fn send_dyn(&self, event: DynEvent);

    /// Stop the actor (idempotent; cascades to its own children).
    fn stop_actor(&self);

    /// Whether the actor has been stopped.
    fn is_stopped(&self) -> bool;

    /// The current state tag.
    fn state_tag(&self) -> &'static str;

    /// Encode the current snapshot through the actor's own codec.
    fn persisted(&self) -> Result<PersistedSnapshot, CodecError>;

    /// Out-of-band snapshot replacement through the actor's own codec,
    /// recursing into `children` when provided.
    fn sync_persisted(
        &self,
        snapshot: PersistedSnapshot,
        children: Option<HashMap<String, PersistedSnapshot>>,
    ) -> Result<(), CodecError>;
}

/// Non-owning back-reference from a child to its parent.
///
/// Sender handles do not own the supervisor task, so holding one from the
/// child does not keep the parent alive; the parent's `stop()` remains
/// authoritative.
#[derive(Clone)]
pub struct ParentLink {
    inner: Arc<dyn AnyActor>,
}

impl ParentLink {
    pub(crate) fn new(inner: Arc<dyn AnyActor>) -> Self {
        Self { inner }
    }

    /// Send an erased event to the parent.
    pub fn send(&self, event: DynEvent) {
        self.inner.send_dyn(event);
    }
}

impl fmt::Debug for ParentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentLink")
            .field("actor_id", &self.inner.actor_id())
            .finish()
    }
}
