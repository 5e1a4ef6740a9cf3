//! Machine vocabulary, definitions, outcomes, and the pure resolver.
//!
//! - [`traits`]: the `Machine` / `MachineState` / `MachineEvent` vocabulary
//! - [`outcome`]: the `Outcome` value type and its fluent builder
//! - [`definition`]: immutable, validated `MachineDefinition`
//! - [`resolver`]: pure `(state, context, event) → Outcome` resolution

pub mod definition;
pub mod outcome;
pub mod resolver;
pub mod traits;

pub use definition::{
    After, AfterFn, DefinitionError, EffectFn, FailureHandler, InvokeFn, InvokeHandlers,
    MachineDefinition, MachineDefinitionBuilder, Run, SimpleHandler, StateConfig, StreamFn,
};
pub use outcome::{Action, ContextPatch, Effects, Handler, Outcome, SpawnRequest};
pub use resolver::resolve;
pub use traits::{ContextOf, EventOf, Machine, MachineEvent, MachineState, StateOf};
