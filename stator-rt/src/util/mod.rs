//! Shared utilities: actor identifiers and serialization helpers.

pub mod ids;
pub mod serde_helpers;

pub use ids::ActorId;
