//! The public handle to a running actor.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::warn;

// Layer 3: Internal module imports
use super::error::ActorError;
use crate::child::{AnyActor, ChildRegistry, DynEvent};
use crate::codec::CodecError;
use crate::machine::{EventOf, Machine, MachineDefinition, MachineState};
use crate::mailbox::{Mailbox, Signal};
use crate::observer::{Emitter, ObserverSet, Subscription};
use crate::persist::{PersistedSnapshot, PersistenceRow, Snapshot};
use crate::util::ActorId;

/// Cloneable handle to a running actor.
///
/// All methods are non-blocking: `send` enqueues and returns, `snapshot`
/// reads the latest published snapshot, `stop` is idempotent and returns
/// once no further observer or listener can fire. Everything enqueued after
/// `stop` is dropped silently.
pub struct ActorRef<M: Machine> {
    pub(crate) id: ActorId,
    pub(crate) definition: Arc<MachineDefinition<M>>,
    pub(crate) mailbox: Mailbox<M>,
    pub(crate) snapshot: Arc<RwLock<Snapshot<M>>>,
    pub(crate) observers: ObserverSet<M>,
    pub(crate) emitter: Emitter<M>,
    pub(crate) children: Arc<Mutex<ChildRegistry>>,
}

impl<M: Machine> ActorRef<M> {
    /// The actor's id.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Enqueue an event; returns immediately. Silently ignored after
    /// [`ActorRef::stop`].
    pub fn send(&self, event: EventOf<M>) {
        self.mailbox.enqueue(Signal::Event(event));
    }

    /// The latest published snapshot. Never blocks on event processing.
    pub fn snapshot(&self) -> Snapshot<M> {
        self.snapshot.read().clone()
    }

    /// Register a snapshot observer, called after every successful
    /// transition and after snapshot sync.
    pub fn subscribe(
        &self,
        observer: impl Fn(&Snapshot<M>) + Send + Sync + 'static,
    ) -> Subscription {
        self.observers.subscribe(observer)
    }

    /// Register an emission listener for events with `tag`.
    pub fn on(
        &self,
        tag: impl Into<String>,
        listener: impl Fn(&EventOf<M>) + Send + Sync + 'static,
    ) -> Subscription {
        self.emitter.on(tag, listener)
    }

    /// Wait for a snapshot satisfying `predicate`.
    ///
    /// Resolves immediately (through the mailbox, preserving ordering) if
    /// the current snapshot already satisfies it. Cancellable by dropping
    /// the returned future; errors with [`ActorError::Stopped`] if the actor
    /// stops first.
    pub async fn wait_for(
        &self,
        predicate: impl Fn(&Snapshot<M>) -> bool + Send + 'static,
    ) -> Result<Snapshot<M>, ActorError> {
        if self.mailbox.is_stopped() {
            return Err(ActorError::Stopped);
        }

        let (reply, receiver) = oneshot::channel();
        self.mailbox.enqueue(Signal::WaitFor {
            predicate: Box::new(predicate),
            reply,
        });

        receiver.await.map_err(|_| ActorError::Stopped)
    }

    /// Stop the actor. Idempotent.
    ///
    /// Marks the mailbox stopped before anything else. Observer and
    /// listener dispatch re-checks that flag before every invocation, so
    /// once this returns no new callback starts, including from a
    /// notification pass already in flight on the supervisor task. The
    /// supervisor then closes the state scope, forks the exit effect
    /// detached, stops all children depth-first, clears the observer and
    /// listener registries, and drops pending mail.
    pub fn stop(&self) {
        self.mailbox.close();
    }

    /// Whether [`ActorRef::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.mailbox.is_stopped()
    }

    /// Out-of-band snapshot replacement (cross-process/tab sync).
    ///
    /// The snapshot is decoded here so codec failures surface to the
    /// caller; the decoded replacement is then applied on the supervisor
    /// task (exit/entry run if the state tag changed, observers notified).
    /// `children` are applied recursively, spawning declared children that
    /// are missing.
    pub fn sync_snapshot(
        &self,
        snapshot: PersistedSnapshot,
        children: Option<HashMap<String, PersistedSnapshot>>,
    ) -> Result<(), CodecError> {
        let codec = self.definition.codec().ok_or(CodecError::MissingCodec)?;
        let decoded = snapshot.decode::<M>(codec.as_ref())?;

        self.mailbox.enqueue(Signal::Sync {
            snapshot: decoded,
            children,
        });
        Ok(())
    }

    /// Cancel a persistent delay by id; absent ids are a no-op.
    pub fn cancel_delay(&self, delay_id: impl Into<String>) {
        self.mailbox.enqueue(Signal::CancelDelay(delay_id.into()));
    }

    /// Encode the current snapshot through the definition's codec.
    pub fn persisted(&self) -> Result<PersistedSnapshot, CodecError> {
        let codec = self.definition.codec().ok_or(CodecError::MissingCodec)?;
        PersistedSnapshot::encode(&self.snapshot(), codec.as_ref())
    }

    /// Type-erased handle to a child, if present.
    pub fn child(&self, child_id: &str) -> Option<Arc<dyn AnyActor>> {
        self.children.lock().actor(child_id)
    }

    /// Ids of the currently running children.
    pub fn child_ids(&self) -> Vec<String> {
        self.children.lock().ids()
    }

    /// Build the persistence row for this actor and its children.
    pub fn persistence_row(&self, row_id: impl Into<String>) -> Result<PersistenceRow, CodecError> {
        let codec = self.definition.codec().ok_or(CodecError::MissingCodec)?;

        let mut children = Vec::new();
        for child_id in self.child_ids() {
            if let Some(child) = self.child(&child_id) {
                children.push((child_id, child.persisted()?));
            }
        }

        PersistenceRow::from_snapshot(
            row_id,
            &self.snapshot(),
            codec.as_ref(),
            children,
            Utc::now(),
        )
    }
}

impl<M: Machine> Clone for ActorRef<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            definition: Arc::clone(&self.definition),
            mailbox: self.mailbox.clone(),
            snapshot: Arc::clone(&self.snapshot),
            observers: self.observers.clone(),
            emitter: self.emitter.clone(),
            children: Arc::clone(&self.children),
        }
    }
}

impl<M: Machine> fmt::Debug for ActorRef<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.id)
            .field("state", &self.snapshot.read().state_tag())
            .field("stopped", &self.mailbox.is_stopped())
            .finish()
    }
}

impl<M: Machine> AnyActor for ActorRef<M> {
    fn actor_id(&self) -> ActorId {
        self.id
    }

    fn send_dyn(&self, event: DynEvent) {
        match event.downcast::<EventOf<M>>() {
            Some(event) => self.send(event),
            None => warn!(
                actor = %self.id,
                tag = event.tag(),
                "dropping event with mismatched type for this machine"
            ),
        }
    }

    fn stop_actor(&self) {
        self.stop();
    }

    fn is_stopped(&self) -> bool {
        self.mailbox.is_stopped()
    }

    fn state_tag(&self) -> &'static str {
        self.snapshot.read().state.tag()
    }

    fn persisted(&self) -> Result<PersistedSnapshot, CodecError> {
        ActorRef::persisted(self)
    }

    fn sync_persisted(
        &self,
        snapshot: PersistedSnapshot,
        children: Option<HashMap<String, PersistedSnapshot>>,
    ) -> Result<(), CodecError> {
        self.sync_snapshot(snapshot, children)
    }
}
