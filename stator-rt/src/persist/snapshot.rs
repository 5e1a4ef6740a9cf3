//! Snapshot values: the observable `(state, context)` pair and its
//! codec-shaped persisted form.

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use crate::codec::{CodecError, SnapshotCodec};
use crate::machine::{ContextOf, EventOf, Machine, MachineState, StateOf};

/// The pair made visible to observers after every transition.
///
/// `last_event` records the external event that produced this snapshot, if
/// any; internal signals (timers, invoke terminations, sync) leave it
/// untouched. It is not persisted.
pub struct Snapshot<M: Machine> {
    /// The current state (tag + payload).
    pub state: StateOf<M>,
    /// The current context.
    pub context: ContextOf<M>,
    /// The last external event processed, if any.
    pub last_event: Option<EventOf<M>>,
}

impl<M: Machine> Snapshot<M> {
    /// Build a snapshot with no recorded event.
    pub fn new(state: StateOf<M>, context: ContextOf<M>) -> Self {
        Self {
            state,
            context,
            last_event: None,
        }
    }

    /// The current state's tag.
    pub fn state_tag(&self) -> &'static str {
        self.state.tag()
    }
}

// Manual impls: derives would demand `M: Clone` etc. on the marker type.
impl<M: Machine> Clone for Snapshot<M> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            context: self.context.clone(),
            last_event: self.last_event.clone(),
        }
    }
}

impl<M: Machine> fmt::Debug for Snapshot<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("state", &self.state)
            .field("context", &self.context)
            .field("last_event", &self.last_event)
            .finish()
    }
}

impl<M: Machine> PartialEq for Snapshot<M> {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.context == other.context
            && self.last_event == other.last_event
    }
}

/// Codec-shaped snapshot: `{state: {tag, ...fields}, context: {...fields}}`.
///
/// This is the unit of persistence and of cross-process snapshot sync. The
/// `last_event` of the live snapshot is intentionally not part of this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    /// Encoded state, usually a `{"tag": ..., ...fields}` object.
    pub state: Value,
    /// Encoded context object.
    pub context: Value,
}

impl PersistedSnapshot {
    /// Encode a live snapshot through `codec`.
    pub fn encode<M: Machine>(
        snapshot: &Snapshot<M>,
        codec: &dyn SnapshotCodec<StateOf<M>, ContextOf<M>>,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            state: codec.encode_state(&snapshot.state)?,
            context: codec.encode_context(&snapshot.context)?,
        })
    }

    /// Decode back into a live snapshot (with no recorded event).
    pub fn decode<M: Machine>(
        &self,
        codec: &dyn SnapshotCodec<StateOf<M>, ContextOf<M>>,
    ) -> Result<Snapshot<M>, CodecError> {
        Ok(Snapshot::new(
            codec.decode_state(&self.state)?,
            codec.decode_context(&self.context)?,
        ))
    }
}
