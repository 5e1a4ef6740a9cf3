//! The implementation-neutral persistence row.
//!
//! Storage back-ends persist one row per actor tree:
//! `{id, parent_value, parent_context, child_snapshots, updated_at}` with
//! `updated_at` in integer Unix millis and `child_snapshots` mapping
//! `child_id → {value, context}` through the same codec. The row keeps only
//! the parent's state *tag* (`parent_value`); machines that persist state
//! payload keep it in context, and [`JsonCodec`](crate::codec::JsonCodec)
//! widens a bare tag back to the object shape on decode.

// Layer 1: Standard library imports
use std::collections::BTreeMap;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use super::snapshot::{PersistedSnapshot, Snapshot};
use crate::codec::{CodecError, SnapshotCodec};
use crate::machine::{ContextOf, Machine, MachineState, StateOf};
use crate::util::serde_helpers::datetime_millis;

/// One persisted child: encoded state value and context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRow {
    /// Encoded child state.
    pub value: Value,
    /// Encoded child context.
    pub context: Value,
}

impl From<PersistedSnapshot> for ChildRow {
    fn from(snapshot: PersistedSnapshot) -> Self {
        Self {
            value: snapshot.state,
            context: snapshot.context,
        }
    }
}

impl From<ChildRow> for PersistedSnapshot {
    fn from(row: ChildRow) -> Self {
        Self {
            state: row.value,
            context: row.context,
        }
    }
}

/// The persisted form of one actor tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceRow {
    /// Row identifier (machine instance id chosen by the persistence layer).
    pub id: String,
    /// Parent state tag.
    pub parent_value: String,
    /// Encoded parent context.
    pub parent_context: Value,
    /// Persisted children keyed by child id.
    pub child_snapshots: BTreeMap<String, ChildRow>,
    /// Last write time, integer Unix millis.
    #[serde(with = "datetime_millis")]
    pub updated_at: DateTime<Utc>,
}

impl PersistenceRow {
    /// Build a row from a live parent snapshot and already-encoded children.
    pub fn from_snapshot<M: Machine>(
        id: impl Into<String>,
        snapshot: &Snapshot<M>,
        codec: &dyn SnapshotCodec<StateOf<M>, ContextOf<M>>,
        children: impl IntoIterator<Item = (String, PersistedSnapshot)>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            id: id.into(),
            parent_value: snapshot.state.tag().to_owned(),
            parent_context: codec.encode_context(&snapshot.context)?,
            child_snapshots: children
                .into_iter()
                .map(|(child_id, persisted)| (child_id, persisted.into()))
                .collect(),
            updated_at,
        })
    }

    /// Split the row back into the parent snapshot and the child map, the
    /// shapes `interpret` restore and snapshot sync consume.
    pub fn into_snapshots(self) -> (PersistedSnapshot, BTreeMap<String, PersistedSnapshot>) {
        let parent = PersistedSnapshot {
            state: Value::String(self.parent_value),
            context: self.parent_context,
        };

        let children = self
            .child_snapshots
            .into_iter()
            .map(|(child_id, row)| (child_id, row.into()))
            .collect();

        (parent, children)
    }
}
