//! # stator-rt - Hierarchical State-Machine Actor Runtime
//!
//! A runtime that owns running *actors* and drives them through *states* and
//! *transitions* in response to *events*, with strict lifecycle discipline
//! for per-state effects and streams, a parent/child actor tree with
//! snapshot restore, and re-entrancy-safe observation and emission channels.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stator_rt::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum ToggleState { Off, On }
//!
//! impl MachineState for ToggleState {
//!     const TAGS: &'static [&'static str] = &["Off", "On"];
//!     fn tag(&self) -> &'static str {
//!         match self {
//!             ToggleState::Off => "Off",
//!             ToggleState::On => "On",
//!         }
//!     }
//! }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum ToggleEvent { Toggle }
//!
//! impl MachineEvent for ToggleEvent {
//!     const TAGS: &'static [&'static str] = &["Toggle"];
//!     fn tag(&self) -> &'static str { "Toggle" }
//! }
//!
//! struct Toggle;
//!
//! impl Machine for Toggle {
//!     type State = ToggleState;
//!     type Event = ToggleEvent;
//!     type Context = u32;
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let definition = Arc::new(
//!         MachineDefinition::<Toggle>::builder(ToggleState::Off, 0)
//!             .state(StateConfig::new("Off").on("Toggle", |_, _| {
//!                 Some(Outcome::goto(ToggleState::On).update(|count| count + 1))
//!             }))
//!             .state(StateConfig::new("On").on("Toggle", |_, _| {
//!                 Some(Outcome::goto(ToggleState::Off))
//!             }))
//!             .build()
//!             .unwrap(),
//!     );
//!
//!     let actor = interpret(definition, Default::default());
//!     actor.send(ToggleEvent::Toggle);
//!     let snapshot = actor.wait_for(|s| s.state_tag() == "On").await.unwrap();
//!     assert_eq!(snapshot.context, 1);
//!     actor.stop();
//! }
//! ```
//!
//! # Core Guarantees
//!
//! - **Serialized processing**: each actor has one mailbox consumer; no two
//!   events are resolved concurrently for the same actor, and observer
//!   notifications follow snapshot transitions in the same total order.
//! - **Scoped effects**: entry effects, `run` streams/invokes, and
//!   non-persistent delays live in a per-activation scope that is cancelled
//!   and awaited before the next state's entry starts.
//! - **Owned children**: the parent's registry exclusively owns child
//!   actors; stopping the parent releases the whole subtree, observers, and
//!   listeners.
//! - **Recovering supervisor**: handler panics resolve as `NoMatch`, effect
//!   failures are logged without transitioning the machine, and typed invoke
//!   failures dispatch through per-state handler tables.
//!
//! # Module Organization
//!
//! - [`machine`] - Vocabulary traits, definitions, outcomes, and the pure
//!   resolver
//! - [`actor`] - `interpret`, `ActorRef`, and the supervisor event loop
//! - [`mailbox`] - The per-actor FIFO serializing all processing
//! - [`effect`] - State scopes and invoke terminations
//! - [`child`] - The parent/child tree: spawners, erased handles, registry
//! - [`observer`] - Snapshot observers and per-tag emission listeners
//! - [`codec`] - The pluggable persistence codec boundary
//! - [`persist`] - Snapshot values and the persistence row
//! - [`util`] - Ids and serde helpers

pub mod actor;
pub mod child;
pub mod codec;
pub mod effect;
pub mod machine;
pub mod mailbox;
pub mod observer;
pub mod persist;
pub mod prelude;
pub mod util;

// Re-export commonly used types
pub use actor::{interpret, ActorError, ActorRef, InterpretOptions};
pub use child::{AnyActor, ChildSpawner, DynEvent, ParentLink};
pub use codec::{CodecError, FieldTransform, JsonCodec, SnapshotCodec, TransformCodec};
pub use effect::{InvokeError, InvokeFailure};
pub use machine::{
    DefinitionError, Effects, Machine, MachineDefinition, MachineEvent, MachineState, Outcome,
    StateConfig,
};
pub use observer::Subscription;
pub use persist::{ChildRow, PersistedSnapshot, PersistenceRow, Snapshot};
pub use util::ActorId;
