//! Convenience re-exports of the user-facing surface.
//!
//! ```rust
//! use stator_rt::prelude::*;
//! ```

pub use crate::actor::{interpret, ActorError, ActorRef, InterpretOptions};
pub use crate::child::{AnyActor, ChildSpawner, DynEvent, ParentLink};
pub use crate::codec::{CodecError, FieldTransform, JsonCodec, SnapshotCodec, TransformCodec};
pub use crate::effect::{InvokeError, InvokeFailure};
pub use crate::machine::{
    DefinitionError, Effects, Machine, MachineDefinition, MachineEvent, MachineState, Outcome,
    StateConfig,
};
pub use crate::observer::Subscription;
pub use crate::persist::{PersistedSnapshot, PersistenceRow, Snapshot};
pub use crate::util::ActorId;
