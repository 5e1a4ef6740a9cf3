//! The per-actor supervisor: owns the mailbox consumer, applies outcomes,
//! and ties effects and streams to state scopes.
//!
//! One tokio task runs [`ActorCore::run`] per actor. Every signal is
//! processed to completion before the next is dequeued, which makes all of
//! the ordering guarantees structural: events resolve in enqueue order,
//! observer notifications follow snapshot transitions in the same total
//! order, and no two signals are ever in flight concurrently for one actor.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use futures::{FutureExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

// Layer 3: Internal module imports
use super::actor_ref::ActorRef;
use super::options::InterpretOptions;
use crate::child::{ChildRegistry, ParentLink, SpawnContext};
use crate::effect::{InvokeError, StateScope};
use crate::machine::{
    resolve, ContextOf, EventOf, Machine, MachineDefinition, MachineState, Outcome, Run,
    SpawnRequest,
};
use crate::mailbox::{Mailbox, Signal};
use crate::observer::{Emitter, ObserverSet};
use crate::persist::{PersistedSnapshot, Snapshot};
use crate::util::ActorId;

/// Create a running actor from a definition.
///
/// Construction order: restore the snapshot (`options.snapshot` or the
/// definition's initial snapshot), spawn declared children from
/// `options.child_snapshots`, mark the actor running, then run the entry
/// sequence for the current state. The handle is returned immediately;
/// everything sent to it is processed after construction completes, in
/// arrival order.
pub fn interpret<M: Machine>(
    definition: Arc<MachineDefinition<M>>,
    options: InterpretOptions<M>,
) -> ActorRef<M> {
    let (mailbox, receiver) = Mailbox::channel();
    let stop_flag = mailbox.stop_flag();

    let resuming = options.snapshot.is_some();
    let initial = options
        .snapshot
        .unwrap_or_else(|| definition.initial_snapshot());

    // Observers and listeners share the stop flag: once stop() sets it, no
    // further callback starts, even from a notification pass in flight.
    let handle = ActorRef {
        id: ActorId::new(),
        definition: Arc::clone(&definition),
        mailbox: mailbox.clone(),
        snapshot: Arc::new(RwLock::new(initial)),
        observers: ObserverSet::new(Arc::clone(&stop_flag)),
        emitter: Emitter::new(Arc::clone(&stop_flag)),
        children: Arc::new(Mutex::new(ChildRegistry::new())),
    };

    let core = ActorCore {
        id: handle.id,
        definition,
        mailbox: mailbox.clone(),
        snapshot: Arc::clone(&handle.snapshot),
        observers: handle.observers.clone(),
        emitter: handle.emitter.clone(),
        children: Arc::clone(&handle.children),
        parent: options.parent,
        handle: handle.clone(),
        stop_flag,
        scope: None,
        persistent_delays: HashMap::new(),
        epoch: 0,
        waiters: Vec::new(),
        restore_children: options.child_snapshots,
        resuming,
    };

    tokio::spawn(core.run(receiver));
    handle
}

struct Waiter<M: Machine> {
    predicate: Box<dyn Fn(&Snapshot<M>) -> bool + Send>,
    reply: oneshot::Sender<Snapshot<M>>,
}

pub(crate) struct ActorCore<M: Machine> {
    id: ActorId,
    definition: Arc<MachineDefinition<M>>,
    mailbox: Mailbox<M>,
    snapshot: Arc<RwLock<Snapshot<M>>>,
    observers: ObserverSet<M>,
    emitter: Emitter<M>,
    children: Arc<Mutex<ChildRegistry>>,
    parent: Option<ParentLink>,
    handle: ActorRef<M>,
    stop_flag: Arc<AtomicBool>,
    scope: Option<StateScope>,
    // Persistent delays keyed by id; the epoch records which arming the
    // running timer belongs to, so firings from replaced timers are stale.
    persistent_delays: HashMap<String, (u64, JoinHandle<()>)>,
    epoch: u64,
    waiters: Vec<Waiter<M>>,
    restore_children: Option<HashMap<String, PersistedSnapshot>>,
    resuming: bool,
}

impl<M: Machine> ActorCore<M> {
    pub(crate) async fn run(mut self, mut receiver: UnboundedReceiver<Signal<M>>) {
        self.startup();
        self.enter_state().await;

        while let Some(signal) = receiver.recv().await {
            if self.stop_flag.load(Ordering::SeqCst) {
                // stop() drops pending mail; only the terminal Stop is acted on.
                match signal {
                    Signal::Stop => {
                        self.shutdown().await;
                        break;
                    }
                    other => {
                        trace!(actor = %self.id, signal = ?other, "stopping; dropping pending signal");
                        continue;
                    }
                }
            }
            self.handle_signal(signal).await;
        }
    }

    /// Restore-time child spawning, before the initial entry sequence.
    fn startup(&mut self) {
        debug!(actor = %self.id, resuming = self.resuming, "actor starting");

        let Some(restore) = self.restore_children.take() else {
            return;
        };

        for (child_id, persisted) in restore {
            let spawner = self.definition.declared_child(&child_id).cloned();
            match spawner {
                Some(spawner) => self.spawn_child(SpawnRequest {
                    child_id,
                    spawner,
                    restore: Some(persisted),
                }),
                None => warn!(
                    actor = %self.id,
                    child_id = %child_id,
                    "restore snapshot names an undeclared child; skipping"
                ),
            }
        }
    }

    async fn handle_signal(&mut self, signal: Signal<M>) {
        match signal {
            Signal::Event(event) => {
                let current = self.snapshot.read().clone();
                let outcome = resolve(&self.definition, &current.state, &current.context, &event);
                if outcome.is_no_match() {
                    trace!(actor = %self.id, event = ?event, "no handler matched");
                    return;
                }
                self.apply_outcome(outcome, Some(event)).await;
            }
            Signal::After {
                source,
                epoch,
                persistent,
            } => self.handle_after(source, epoch, persistent).await,
            Signal::InvokeDone { epoch, result } => self.handle_invoke_done(epoch, result).await,
            Signal::Sync { snapshot, children } => self.apply_sync(snapshot, children).await,
            Signal::WaitFor { predicate, reply } => {
                let current = self.snapshot.read().clone();
                if predicate(&current) {
                    let _ = reply.send(current);
                } else {
                    self.waiters.push(Waiter { predicate, reply });
                }
            }
            Signal::CancelDelay(delay_id) => self.cancel_persistent(&delay_id),
            // Handled by the run loop.
            Signal::Stop => {}
        }
    }

    /// Apply one outcome through the fixed pipeline: context patch, snapshot
    /// publish + observer notification, child-tree mutations (despawns,
    /// spawns, sends), emissions, actions, then state exit/entry if the tag
    /// changed.
    async fn apply_outcome(&mut self, outcome: Outcome<M>, event: Option<EventOf<M>>) {
        let (target, patch, effects) = match outcome {
            Outcome::Goto {
                target,
                patch,
                effects,
            } => (Some(target), patch, effects),
            Outcome::Update { patch, effects } => (None, Some(patch), effects),
            Outcome::Stay { effects } => (None, None, effects),
            Outcome::NoMatch => return,
        };

        let previous = self.snapshot.read().clone();

        // 1. Form the new context functionally against the pre-event context.
        let new_context = match &patch {
            Some(patch) => {
                match catch_unwind(AssertUnwindSafe(|| patch(&previous.context))) {
                    Ok(context) => context,
                    Err(_) => {
                        warn!(actor = %self.id, "context patch panicked; outcome discarded");
                        return;
                    }
                }
            }
            None => previous.context.clone(),
        };

        // 2. Publish atomically and notify observers. `Stay` leaves the
        //    snapshot untouched and is not observed.
        let tag_changed = target
            .as_ref()
            .map(|state| state.tag() != previous.state.tag())
            .unwrap_or(false);

        if target.is_some() || patch.is_some() {
            let snapshot = Snapshot {
                state: target.clone().unwrap_or_else(|| previous.state.clone()),
                context: new_context,
                last_event: event.clone().or_else(|| previous.last_event.clone()),
            };
            *self.snapshot.write() = snapshot.clone();
            self.publish(&snapshot);
        }

        // 3. Child-tree mutations: despawns, spawns, sends.
        for child_id in &effects.despawns {
            self.children.lock().despawn(child_id);
        }
        for request in effects.spawns {
            self.spawn_child(request);
        }
        for (child_id, event) in effects.sends_to_children {
            let child = self.children.lock().actor(&child_id);
            match child {
                Some(child) => child.send_dyn(event),
                None => trace!(actor = %self.id, child_id = %child_id, "send to absent child; no-op"),
            }
        }
        for child_id in effects.forwards {
            let Some(forwarded) = event.clone() else {
                trace!(actor = %self.id, child_id = %child_id, "forward without in-flight event; no-op");
                continue;
            };
            let child = self.children.lock().actor(&child_id);
            match child {
                Some(child) => child.send_dyn(crate::child::DynEvent::new(forwarded)),
                None => trace!(actor = %self.id, child_id = %child_id, "forward to absent child; no-op"),
            }
        }
        for event in effects.sends_to_parent {
            match &self.parent {
                Some(parent) => parent.send(event),
                None => trace!(actor = %self.id, "send_parent without parent; no-op"),
            }
        }
        for delay_id in &effects.cancels {
            self.cancel_persistent(delay_id);
        }

        // 4. Emissions, in declaration order.
        for event in &effects.emissions {
            self.emitter.emit(event);
        }

        // 5. Actions, in registration order; a panicking action never
        //    touches the already-published context.
        for action in &effects.actions {
            if catch_unwind(AssertUnwindSafe(|| action())).is_err() {
                warn!(actor = %self.id, "outcome action panicked; isolated");
            }
        }

        // 6. State change: old scope closed and awaited, exit detached, then
        //    the new state's entry sequence.
        if tag_changed {
            debug!(
                actor = %self.id,
                from = previous.state.tag(),
                to = self.snapshot.read().state.tag(),
                "transition"
            );
            self.exit_state(previous.state.tag(), previous.context).await;
            self.enter_state().await;
        }
    }

    fn publish(&mut self, snapshot: &Snapshot<M>) {
        if self.stop_flag.load(Ordering::SeqCst) {
            return;
        }

        self.observers.notify(snapshot);

        let mut remaining = Vec::new();
        for waiter in self.waiters.drain(..) {
            if (waiter.predicate)(snapshot) {
                let _ = waiter.reply.send(snapshot.clone());
            } else if !waiter.reply.is_closed() {
                remaining.push(waiter);
            }
        }
        self.waiters = remaining;
    }

    /// Start the current state's scope: entry effect, `run`, `after`.
    async fn enter_state(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;

        let snapshot = self.snapshot.read().clone();
        let tag = snapshot.state.tag();
        let definition = Arc::clone(&self.definition);

        let mut scope = StateScope::new();

        let Some(config) = definition.state(tag) else {
            self.scope = Some(scope);
            return;
        };

        if let Some(entry) = config.entry_effect() {
            let future = entry(snapshot.context.clone());
            scope.spawn(async move {
                if AssertUnwindSafe(future).catch_unwind().await.is_err() {
                    warn!(state = tag, "entry effect panicked; isolated");
                }
            });
        }

        match config.run_config() {
            Some(Run::Stream(factory)) => {
                let mut stream = factory(&snapshot.context);
                let mailbox = self.mailbox.clone();
                let token = scope.token();
                scope.spawn(async move {
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            item = stream.next() => match item {
                                Some(event) => mailbox.enqueue(Signal::Event(event)),
                                None => break,
                            },
                        }
                    }
                });
            }
            Some(Run::Invoke(factory)) => {
                let future = factory(&snapshot.context);
                let mailbox = self.mailbox.clone();
                let token = scope.token();
                scope.spawn(async move {
                    // A separate task turns panics into joinable defects.
                    let inner = tokio::spawn(future);
                    let abort_handle = inner.abort_handle();
                    tokio::select! {
                        _ = token.cancelled() => {
                            abort_handle.abort();
                            mailbox.enqueue(Signal::InvokeDone {
                                epoch,
                                result: Err(InvokeError::Interrupted),
                            });
                        }
                        joined = inner => {
                            let result = match joined {
                                Ok(Ok(outcome)) => Ok(outcome),
                                Ok(Err(failure)) => Err(InvokeError::Failure(failure)),
                                Err(join_error) if join_error.is_panic() => Err(InvokeError::Defect {
                                    message: format!("{join_error}"),
                                }),
                                Err(_) => Err(InvokeError::Interrupted),
                            };
                            mailbox.enqueue(Signal::InvokeDone { epoch, result });
                        }
                    }
                });
            }
            None => {}
        }

        if let Some(after) = config.after_config() {
            let delay = after.delay;
            match &after.persistent {
                None => {
                    let mailbox = self.mailbox.clone();
                    let token = scope.token();
                    scope.spawn(async move {
                        tokio::select! {
                            _ = token.cancelled() => {}
                            _ = tokio::time::sleep(delay) => {
                                mailbox.enqueue(Signal::After {
                                    source: tag,
                                    epoch,
                                    persistent: None,
                                });
                            }
                        }
                    });
                }
                Some(delay_id) => {
                    let mailbox = self.mailbox.clone();
                    let id = delay_id.clone();
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        mailbox.enqueue(Signal::After {
                            source: tag,
                            epoch,
                            persistent: Some(id),
                        });
                    });
                    // Re-arming a live id replaces the prior timer.
                    if let Some((_, previous)) = self
                        .persistent_delays
                        .insert(delay_id.clone(), (epoch, handle))
                    {
                        debug!(actor = %self.id, delay_id = %delay_id, "replacing persistent delay");
                        previous.abort();
                    }
                }
            }
        }

        self.scope = Some(scope);
    }

    /// Close the old state's scope (awaited), then fork `exit` detached.
    async fn exit_state(&mut self, old_tag: &'static str, old_context: ContextOf<M>) {
        if let Some(scope) = self.scope.take() {
            scope.close().await;
        }

        let definition = Arc::clone(&self.definition);
        if let Some(exit) = definition.state(old_tag).and_then(|c| c.exit_effect()) {
            let future = exit(old_context);
            tokio::spawn(async move {
                if AssertUnwindSafe(future).catch_unwind().await.is_err() {
                    warn!(state = old_tag, "exit effect panicked; isolated");
                }
            });
        }
    }

    async fn handle_after(&mut self, source: &'static str, epoch: u64, persistent: Option<String>) {
        match persistent {
            Some(delay_id) => {
                // Persistent delays fire regardless of the current state, but
                // only while this arming's table entry is live: a firing that
                // raced a replace or a cancel is stale and dropped.
                match self.persistent_delays.get(&delay_id) {
                    Some((armed_epoch, _)) if *armed_epoch == epoch => {
                        if let Some((_, handle)) = self.persistent_delays.remove(&delay_id) {
                            handle.abort();
                        }
                    }
                    _ => {
                        trace!(actor = %self.id, delay_id = %delay_id, "stale persistent delay firing; dropped");
                        return;
                    }
                }
            }
            None => {
                if epoch != self.epoch {
                    trace!(actor = %self.id, source, "stale delay firing; dropped");
                    return;
                }
                let current_tag = self.snapshot.read().state.tag();
                if current_tag != source {
                    trace!(actor = %self.id, source, current = current_tag, "state changed; delay dropped");
                    return;
                }
            }
        }

        let make = self
            .definition
            .state(source)
            .and_then(|config| config.after_config())
            .map(|after| after.make.clone());

        let Some(make) = make else {
            return;
        };

        let context = self.snapshot.read().context.clone();
        match catch_unwind(AssertUnwindSafe(|| make(&context))) {
            Ok(outcome) => self.apply_outcome(outcome, None).await,
            Err(_) => warn!(actor = %self.id, source, "delayed-transition factory panicked"),
        }
    }

    async fn handle_invoke_done(&mut self, epoch: u64, result: Result<Outcome<M>, InvokeError>) {
        if epoch != self.epoch {
            debug!(actor = %self.id, "stale invoke termination; dropped");
            return;
        }

        let current = self.snapshot.read().clone();
        let definition = Arc::clone(&self.definition);
        let handlers = definition
            .state(current.state.tag())
            .map(|config| config.invoke_handlers());

        match result {
            Ok(outcome) => self.apply_outcome(outcome, None).await,
            Err(InvokeError::Failure(failure)) => {
                let handler = handlers.and_then(|h| h.on_failure.get(&failure.tag)).cloned();
                match handler {
                    Some(handler) => {
                        let outcome =
                            catch_unwind(AssertUnwindSafe(|| handler(&current.context, &failure)));
                        match outcome {
                            Ok(Some(outcome)) => self.apply_outcome(outcome, None).await,
                            Ok(None) => {}
                            Err(_) => warn!(actor = %self.id, tag = %failure.tag, "failure handler panicked"),
                        }
                    }
                    None => warn!(
                        actor = %self.id,
                        state = current.state.tag(),
                        tag = %failure.tag,
                        "unhandled invoke failure; staying"
                    ),
                }
            }
            Err(InvokeError::Defect { message }) => {
                error!(actor = %self.id, state = current.state.tag(), %message, "invoke defected");
                let handler = handlers.and_then(|h| h.on_defect.clone());
                if let Some(handler) = handler {
                    let outcome = catch_unwind(AssertUnwindSafe(|| handler(&current.context)));
                    if let Ok(Some(outcome)) = outcome {
                        self.apply_outcome(outcome, None).await;
                    }
                }
            }
            Err(InvokeError::Interrupted) => {
                let handler = handlers.and_then(|h| h.on_interrupt.clone());
                if let Some(handler) = handler {
                    let outcome = catch_unwind(AssertUnwindSafe(|| handler(&current.context)));
                    if let Ok(Some(outcome)) = outcome {
                        self.apply_outcome(outcome, None).await;
                    }
                } else {
                    trace!(actor = %self.id, "invoke interrupted; swallowed");
                }
            }
        }
    }

    /// Out-of-band snapshot replacement.
    async fn apply_sync(
        &mut self,
        snapshot: Snapshot<M>,
        children: Option<HashMap<String, PersistedSnapshot>>,
    ) {
        let previous = self.snapshot.read().clone();
        let tag_changed = previous.state.tag() != snapshot.state.tag();

        if tag_changed {
            self.exit_state(previous.state.tag(), previous.context).await;
        }

        *self.snapshot.write() = snapshot.clone();

        if tag_changed {
            self.enter_state().await;
        }

        if let Some(children) = children {
            self.apply_child_sync(children);
        }

        // Observers (and waiters) see the synced snapshot only once the
        // whole tree has been brought up to date.
        self.publish(&snapshot);
    }

    fn apply_child_sync(&mut self, children: HashMap<String, PersistedSnapshot>) {
        for (child_id, persisted) in children {
            let existing = self.children.lock().actor(&child_id);
            match existing {
                Some(child) => {
                    if let Err(error) = child.sync_persisted(persisted, None) {
                        warn!(
                            actor = %self.id,
                            child_id = %child_id,
                            %error,
                            "child snapshot sync failed; child unchanged"
                        );
                    }
                }
                None => {
                    let spawner = self.definition.declared_child(&child_id).cloned();
                    match spawner {
                        Some(spawner) => self.spawn_child(SpawnRequest {
                            child_id,
                            spawner,
                            restore: Some(persisted),
                        }),
                        None => warn!(
                            actor = %self.id,
                            child_id = %child_id,
                            "sync names an undeclared, unspawned child; skipping"
                        ),
                    }
                }
            }
        }
    }

    /// Idempotent child spawn: an already-present id is a no-op.
    fn spawn_child(&mut self, request: SpawnRequest) {
        if self.children.lock().contains(&request.child_id) {
            trace!(actor = %self.id, child_id = %request.child_id, "child already present; spawn skipped");
            return;
        }

        let parent = ParentLink::new(Arc::new(self.handle.clone()));
        let spawned = request.spawner.spawn(SpawnContext {
            child_id: request.child_id.clone(),
            parent,
            restore: request.restore,
        });

        self.children.lock().insert(request.child_id, spawned);
    }

    fn cancel_persistent(&mut self, delay_id: &str) {
        if let Some((_, handle)) = self.persistent_delays.remove(delay_id) {
            debug!(actor = %self.id, delay_id = %delay_id, "persistent delay cancelled");
            handle.abort();
        }
    }

    /// Stop: close the scope (awaited), fork exit detached, abort persistent
    /// timers, stop children depth-first, release observation channels.
    async fn shutdown(&mut self) {
        debug!(actor = %self.id, "actor stopping");

        let current = self.snapshot.read().clone();
        self.exit_state(current.state.tag(), current.context).await;

        for (_, (_, handle)) in self.persistent_delays.drain() {
            handle.abort();
        }

        self.children.lock().stop_all();
        self.observers.clear();
        self.emitter.clear();
        self.waiters.clear();
    }
}
