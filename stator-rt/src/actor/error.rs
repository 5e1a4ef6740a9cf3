//! Error types for the actor surface.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Errors surfaced by actor handle operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActorError {
    /// The actor has been stopped; the requested operation can no longer
    /// complete.
    #[error("actor is stopped")]
    Stopped,
}
