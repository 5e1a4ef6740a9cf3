//! Snapshot values and persistence shapes.

pub mod row;
pub mod snapshot;

pub use row::{ChildRow, PersistenceRow};
pub use snapshot::{PersistedSnapshot, Snapshot};
