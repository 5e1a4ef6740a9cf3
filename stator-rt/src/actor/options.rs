//! Options for `interpret`.

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::child::ParentLink;
use crate::machine::Machine;
use crate::persist::{PersistedSnapshot, Snapshot};

/// Construction options for a new actor.
///
/// All fields default to empty; `interpret(definition, Default::default())`
/// starts fresh from the definition's initial snapshot.
pub struct InterpretOptions<M: Machine> {
    /// Restore the actor from this snapshot instead of the initial one.
    pub snapshot: Option<Snapshot<M>>,

    /// Persisted snapshots for declared children, spawned before the
    /// parent's initial entry runs. Entry-driven spawns of the same ids are
    /// idempotently skipped.
    pub child_snapshots: Option<HashMap<String, PersistedSnapshot>>,

    /// Non-owning link to the parent actor, enabling `send_parent`.
    pub parent: Option<ParentLink>,
}

impl<M: Machine> Default for InterpretOptions<M> {
    fn default() -> Self {
        Self {
            snapshot: None,
            child_snapshots: None,
            parent: None,
        }
    }
}
