//! Immutable machine definitions.
//!
//! A definition describes everything an actor needs: the initial snapshot,
//! an optional codec for persistence, per-state configuration (event
//! handlers, entry/exit effects, a long-running `run`, a delayed
//! transition), optional cross-state global handlers, and the declared
//! child registry used by snapshot restore. Definitions are validated when
//! built and never change while actors run against them.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use thiserror::Error;

// Layer 3: Internal module imports
use super::outcome::{Handler, Outcome};
use super::traits::{ContextOf, EventOf, Machine, MachineEvent, MachineState, StateOf};
use crate::child::ChildSpawner;
use crate::codec::SnapshotCodec;
use crate::effect::InvokeFailure;
use crate::persist::Snapshot;

/// A forked entry/exit effect. Receives a clone of the context captured at
/// the transition; errors never propagate into the machine.
pub type EffectFn<M> = Arc<dyn Fn(ContextOf<M>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Factory for a per-state event stream.
pub type StreamFn<M> =
    Arc<dyn Fn(&ContextOf<M>) -> BoxStream<'static, EventOf<M>> + Send + Sync>;

/// Factory for a one-shot `run` effect producing an outcome or a typed
/// failure.
pub type InvokeFn<M> = Arc<
    dyn Fn(&ContextOf<M>) -> BoxFuture<'static, Result<Outcome<M>, InvokeFailure>> + Send + Sync,
>;

/// Handler for a typed invoke failure.
pub type FailureHandler<M> =
    Arc<dyn Fn(&ContextOf<M>, &InvokeFailure) -> Option<Outcome<M>> + Send + Sync>;

/// Handler for invoke defects and interrupts (no payload beyond context).
pub type SimpleHandler<M> = Arc<dyn Fn(&ContextOf<M>) -> Option<Outcome<M>> + Send + Sync>;

/// Factory for a delayed-transition outcome.
pub type AfterFn<M> = Arc<dyn Fn(&ContextOf<M>) -> Outcome<M> + Send + Sync>;

/// The long-running computation tied to a state's scope.
pub enum Run<M: Machine> {
    /// A possibly-infinite event stream consumed while the state is active.
    Stream(StreamFn<M>),
    /// A one-shot effect whose termination re-enters through the mailbox.
    Invoke(InvokeFn<M>),
}

/// Per-tag dispatch tables for invoke terminations.
pub struct InvokeHandlers<M: Machine> {
    /// Typed-failure handlers keyed by failure tag.
    pub on_failure: HashMap<String, FailureHandler<M>>,
    /// Handler for unexpected defects (panics inside the invoke).
    pub on_defect: Option<SimpleHandler<M>>,
    /// Handler for cancelled invokes.
    pub on_interrupt: Option<SimpleHandler<M>>,
}

impl<M: Machine> Default for InvokeHandlers<M> {
    fn default() -> Self {
        Self {
            on_failure: HashMap::new(),
            on_defect: None,
            on_interrupt: None,
        }
    }
}

/// A delayed transition armed on state entry.
pub struct After<M: Machine> {
    /// Delay before firing.
    pub delay: Duration,
    /// When set, the delay is keyed by this id, survives state transitions,
    /// and fires regardless of the current state. Re-arming a live id
    /// replaces the prior timer.
    pub persistent: Option<String>,
    /// Builds the outcome applied when the timer fires.
    pub make: AfterFn<M>,
}

/// Configuration of one state.
pub struct StateConfig<M: Machine> {
    tag: &'static str,
    on: HashMap<&'static str, Handler<M>>,
    entry: Option<EffectFn<M>>,
    exit: Option<EffectFn<M>>,
    run: Option<Run<M>>,
    invoke_handlers: InvokeHandlers<M>,
    after: Option<After<M>>,
    strict: bool,
}

impl<M: Machine> StateConfig<M> {
    /// Start configuring the state with `tag`.
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            on: HashMap::new(),
            entry: None,
            exit: None,
            run: None,
            invoke_handlers: InvokeHandlers::default(),
            after: None,
            strict: false,
        }
    }

    /// Register a handler for events with `event_tag`.
    pub fn on(
        mut self,
        event_tag: &'static str,
        handler: impl Fn(&ContextOf<M>, &EventOf<M>) -> Option<Outcome<M>> + Send + Sync + 'static,
    ) -> Self {
        self.on.insert(event_tag, Arc::new(handler));
        self
    }

    /// Fork this effect on entry to the state.
    pub fn entry<F, Fut>(mut self, effect: F) -> Self
    where
        F: Fn(ContextOf<M>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.entry = Some(Arc::new(move |ctx| effect(ctx).boxed()));
        self
    }

    /// Fork this effect, detached, on exit from the state.
    pub fn exit<F, Fut>(mut self, effect: F) -> Self
    where
        F: Fn(ContextOf<M>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.exit = Some(Arc::new(move |ctx| effect(ctx).boxed()));
        self
    }

    /// Consume this stream while the state is active; every produced event
    /// is enqueued on the actor's mailbox.
    pub fn run_stream<F, St>(mut self, stream: F) -> Self
    where
        F: Fn(&ContextOf<M>) -> St + Send + Sync + 'static,
        St: Stream<Item = EventOf<M>> + Send + 'static,
    {
        self.run = Some(Run::Stream(Arc::new(move |ctx| stream(ctx).boxed())));
        self
    }

    /// Fork this one-shot effect on entry; its termination is routed to the
    /// invoke handler tables.
    pub fn invoke<F, Fut>(mut self, invoke: F) -> Self
    where
        F: Fn(&ContextOf<M>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Outcome<M>, InvokeFailure>> + Send + 'static,
    {
        self.run = Some(Run::Invoke(Arc::new(move |ctx| invoke(ctx).boxed())));
        self
    }

    /// Handle a typed invoke failure with `failure_tag`.
    pub fn on_failure(
        mut self,
        failure_tag: impl Into<String>,
        handler: impl Fn(&ContextOf<M>, &InvokeFailure) -> Option<Outcome<M>> + Send + Sync + 'static,
    ) -> Self {
        self.invoke_handlers
            .on_failure
            .insert(failure_tag.into(), Arc::new(handler));
        self
    }

    /// Handle an invoke defect (panic).
    pub fn on_defect(
        mut self,
        handler: impl Fn(&ContextOf<M>) -> Option<Outcome<M>> + Send + Sync + 'static,
    ) -> Self {
        self.invoke_handlers.on_defect = Some(Arc::new(handler));
        self
    }

    /// Handle an interrupted invoke.
    pub fn on_interrupt(
        mut self,
        handler: impl Fn(&ContextOf<M>) -> Option<Outcome<M>> + Send + Sync + 'static,
    ) -> Self {
        self.invoke_handlers.on_interrupt = Some(Arc::new(handler));
        self
    }

    /// Arm a delayed transition on entry, cancelled on exit.
    pub fn after(
        mut self,
        delay: Duration,
        make: impl Fn(&ContextOf<M>) -> Outcome<M> + Send + Sync + 'static,
    ) -> Self {
        self.after = Some(After {
            delay,
            persistent: None,
            make: Arc::new(make),
        });
        self
    }

    /// Arm a persistent delayed transition keyed by `id`; it survives state
    /// transitions and fires regardless of the current state.
    pub fn after_persistent(
        mut self,
        id: impl Into<String>,
        delay: Duration,
        make: impl Fn(&ContextOf<M>) -> Outcome<M> + Send + Sync + 'static,
    ) -> Self {
        self.after = Some(After {
            delay,
            persistent: Some(id.into()),
            make: Arc::new(make),
        });
        self
    }

    /// Require a handler for every event tag in the machine's vocabulary
    /// (checked when the definition is built).
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// The state tag this config describes.
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub(crate) fn handler(&self, event_tag: &str) -> Option<&Handler<M>> {
        self.on.get(event_tag)
    }

    pub(crate) fn entry_effect(&self) -> Option<&EffectFn<M>> {
        self.entry.as_ref()
    }

    pub(crate) fn exit_effect(&self) -> Option<&EffectFn<M>> {
        self.exit.as_ref()
    }

    pub(crate) fn run_config(&self) -> Option<&Run<M>> {
        self.run.as_ref()
    }

    pub(crate) fn invoke_handlers(&self) -> &InvokeHandlers<M> {
        &self.invoke_handlers
    }

    pub(crate) fn after_config(&self) -> Option<&After<M>> {
        self.after.as_ref()
    }
}

/// Definition-time validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    /// The same state tag was configured twice.
    #[error("state `{tag}` is configured more than once")]
    DuplicateState {
        /// The duplicated tag.
        tag: &'static str,
    },

    /// A configured state tag is not in the machine's state vocabulary.
    #[error("state `{tag}` is not in the machine's state vocabulary")]
    UnknownStateTag {
        /// The unknown tag.
        tag: &'static str,
    },

    /// A handler was registered for an event tag outside the vocabulary.
    #[error("state `{state}` handles unknown event tag `{event}`")]
    UnknownEventTag {
        /// The state carrying the handler ("<global>" for global handlers).
        state: &'static str,
        /// The unknown event tag.
        event: &'static str,
    },

    /// A strict state is missing handlers for part of the event vocabulary.
    #[error("strict state `{state}` is missing handlers for {missing:?}")]
    StrictStateMissingHandlers {
        /// The strict state.
        state: &'static str,
        /// Event tags without an explicit handler.
        missing: Vec<&'static str>,
    },
}

/// An immutable, validated machine definition.
pub struct MachineDefinition<M: Machine> {
    initial_state: StateOf<M>,
    initial_context: ContextOf<M>,
    states: HashMap<&'static str, StateConfig<M>>,
    global: HashMap<&'static str, Handler<M>>,
    children: HashMap<String, ChildSpawner>,
    codec: Option<Arc<dyn SnapshotCodec<StateOf<M>, ContextOf<M>>>>,
}

impl<M: Machine> MachineDefinition<M> {
    /// Start building a definition from the initial snapshot values.
    pub fn builder(
        initial_state: StateOf<M>,
        initial_context: ContextOf<M>,
    ) -> MachineDefinitionBuilder<M> {
        MachineDefinitionBuilder {
            initial_state,
            initial_context,
            states: Vec::new(),
            global: HashMap::new(),
            children: HashMap::new(),
            codec: None,
        }
    }

    /// The initial snapshot for fresh actors.
    pub fn initial_snapshot(&self) -> Snapshot<M> {
        Snapshot::new(self.initial_state.clone(), self.initial_context.clone())
    }

    /// Configuration of the state with `tag`, if any.
    pub fn state(&self, tag: &str) -> Option<&StateConfig<M>> {
        self.states.get(tag)
    }

    /// Cross-state handler for `event_tag`, if any.
    pub fn global_handler(&self, event_tag: &str) -> Option<&Handler<M>> {
        self.global.get(event_tag)
    }

    /// The declared child registry (used by restore and snapshot sync).
    pub fn declared_child(&self, child_id: &str) -> Option<&ChildSpawner> {
        self.children.get(child_id)
    }

    /// The codec, if one is configured.
    pub fn codec(&self) -> Option<&Arc<dyn SnapshotCodec<StateOf<M>, ContextOf<M>>>> {
        self.codec.as_ref()
    }
}

/// Builder for [`MachineDefinition`]; `build` validates the whole
/// definition.
pub struct MachineDefinitionBuilder<M: Machine> {
    initial_state: StateOf<M>,
    initial_context: ContextOf<M>,
    states: Vec<StateConfig<M>>,
    global: HashMap<&'static str, Handler<M>>,
    children: HashMap<String, ChildSpawner>,
    codec: Option<Arc<dyn SnapshotCodec<StateOf<M>, ContextOf<M>>>>,
}

impl<M: Machine> MachineDefinitionBuilder<M> {
    /// Add a state configuration.
    pub fn state(mut self, config: StateConfig<M>) -> Self {
        self.states.push(config);
        self
    }

    /// Register a cross-state handler, consulted before per-state handlers;
    /// a `None` result falls through to the current state's handler.
    pub fn global(
        mut self,
        event_tag: &'static str,
        handler: impl Fn(&ContextOf<M>, &EventOf<M>) -> Option<Outcome<M>> + Send + Sync + 'static,
    ) -> Self {
        self.global.insert(event_tag, Arc::new(handler));
        self
    }

    /// Declare a child spawnable by id (required for restore and sync of
    /// children not yet spawned by entry effects).
    pub fn child(mut self, child_id: impl Into<String>, spawner: ChildSpawner) -> Self {
        self.children.insert(child_id.into(), spawner);
        self
    }

    /// Configure the persistence codec.
    pub fn codec(mut self, codec: impl SnapshotCodec<StateOf<M>, ContextOf<M>>) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Validate and freeze the definition.
    pub fn build(self) -> Result<MachineDefinition<M>, DefinitionError> {
        let mut states: HashMap<&'static str, StateConfig<M>> = HashMap::new();

        for config in self.states {
            let tag = config.tag;
            if !StateOf::<M>::TAGS.contains(&tag) {
                return Err(DefinitionError::UnknownStateTag { tag });
            }
            if states.insert(tag, config).is_some() {
                return Err(DefinitionError::DuplicateState { tag });
            }
        }

        for event_tag in self.global.keys() {
            if !EventOf::<M>::TAGS.contains(event_tag) {
                return Err(DefinitionError::UnknownEventTag {
                    state: "<global>",
                    event: *event_tag,
                });
            }
        }

        for config in states.values() {
            for event_tag in config.on.keys() {
                if !EventOf::<M>::TAGS.contains(event_tag) {
                    return Err(DefinitionError::UnknownEventTag {
                        state: config.tag,
                        event: *event_tag,
                    });
                }
            }

            if config.strict {
                let missing: Vec<&'static str> = EventOf::<M>::TAGS
                    .iter()
                    .filter(|tag| !config.on.contains_key(*tag))
                    .copied()
                    .collect();
                if !missing.is_empty() {
                    return Err(DefinitionError::StrictStateMissingHandlers {
                        state: config.tag,
                        missing,
                    });
                }
            }
        }

        Ok(MachineDefinition {
            initial_state: self.initial_state,
            initial_context: self.initial_context,
            states,
            global: self.global,
            children: self.children,
            codec: self.codec,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::machine::MachineEvent;

    #[derive(Debug, Clone, PartialEq)]
    enum IdleState {
        Idle,
        Busy,
    }

    impl MachineState for IdleState {
        const TAGS: &'static [&'static str] = &["Idle", "Busy"];

        fn tag(&self) -> &'static str {
            match self {
                IdleState::Idle => "Idle",
                IdleState::Busy => "Busy",
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum IdleEvent {
        A,
        B,
        C,
    }

    impl MachineEvent for IdleEvent {
        const TAGS: &'static [&'static str] = &["A", "B", "C"];

        fn tag(&self) -> &'static str {
            match self {
                IdleEvent::A => "A",
                IdleEvent::B => "B",
                IdleEvent::C => "C",
            }
        }
    }

    struct IdleMachine;

    impl Machine for IdleMachine {
        type State = IdleState;
        type Event = IdleEvent;
        type Context = ();
    }

    fn handled(_: &(), _: &IdleEvent) -> Option<Outcome<IdleMachine>> {
        Some(Outcome::stay())
    }

    #[test]
    fn test_build_minimal_definition() {
        let definition = MachineDefinition::<IdleMachine>::builder(IdleState::Idle, ())
            .state(StateConfig::new("Idle").on("A", handled))
            .build()
            .unwrap();

        assert_eq!(definition.initial_snapshot().state_tag(), "Idle");
        assert!(definition.state("Idle").is_some());
        assert!(definition.state("Busy").is_none());
    }

    #[test]
    fn test_strict_state_missing_handlers_rejected() {
        // Vocabulary is {A, B, C} but only {A, B} are handled.
        let result = MachineDefinition::<IdleMachine>::builder(IdleState::Idle, ())
            .state(
                StateConfig::new("Idle")
                    .on("A", handled)
                    .on("B", handled)
                    .strict(),
            )
            .build();

        match result.err() {
            Some(DefinitionError::StrictStateMissingHandlers { state, missing }) => {
                assert_eq!(state, "Idle");
                assert_eq!(missing, vec!["C"]);
            }
            other => panic!("expected strict violation, got {other:?}"),
        }
    }

    #[test]
    fn test_strict_state_fully_handled_accepted() {
        let result = MachineDefinition::<IdleMachine>::builder(IdleState::Idle, ())
            .state(
                StateConfig::new("Idle")
                    .on("A", handled)
                    .on("B", handled)
                    .on("C", handled)
                    .strict(),
            )
            .build();

        assert!(result.is_ok());
    }

    #[test]
    fn test_duplicate_state_rejected() {
        let result = MachineDefinition::<IdleMachine>::builder(IdleState::Idle, ())
            .state(StateConfig::new("Idle"))
            .state(StateConfig::new("Idle"))
            .build();

        assert_eq!(result.err(), Some(DefinitionError::DuplicateState { tag: "Idle" }));
    }

    #[test]
    fn test_unknown_state_tag_rejected() {
        let result = MachineDefinition::<IdleMachine>::builder(IdleState::Idle, ())
            .state(StateConfig::new("Sleeping"))
            .build();

        assert_eq!(
            result.err(),
            Some(DefinitionError::UnknownStateTag { tag: "Sleeping" })
        );
    }

    #[test]
    fn test_unknown_event_tag_rejected() {
        let result = MachineDefinition::<IdleMachine>::builder(IdleState::Idle, ())
            .state(StateConfig::new("Idle").on("D", handled))
            .build();

        assert_eq!(
            result.err(),
            Some(DefinitionError::UnknownEventTag {
                state: "Idle",
                event: "D",
            })
        );
    }

    #[test]
    fn test_unknown_global_event_tag_rejected() {
        let result = MachineDefinition::<IdleMachine>::builder(IdleState::Idle, ())
            .global("Z", handled)
            .build();

        assert_eq!(
            result.err(),
            Some(DefinitionError::UnknownEventTag {
                state: "<global>",
                event: "Z",
            })
        );
    }

    #[test]
    fn test_after_config_is_kept() {
        let definition = MachineDefinition::<IdleMachine>::builder(IdleState::Idle, ())
            .state(
                StateConfig::new("Idle")
                    .after(Duration::from_secs(2), |_| Outcome::goto(IdleState::Busy)),
            )
            .build()
            .unwrap();

        let after = definition.state("Idle").unwrap().after_config().unwrap();
        assert_eq!(after.delay, Duration::from_secs(2));
        assert_eq!(after.persistent, None);
    }

    #[test]
    fn test_persistent_after_keeps_id() {
        let definition = MachineDefinition::<IdleMachine>::builder(IdleState::Idle, ())
            .state(StateConfig::new("Idle").after_persistent(
                "nap",
                Duration::from_secs(60),
                |_| Outcome::goto(IdleState::Busy),
            ))
            .build()
            .unwrap();

        let after = definition.state("Idle").unwrap().after_config().unwrap();
        assert_eq!(after.persistent.as_deref(), Some("nap"));
    }
}
