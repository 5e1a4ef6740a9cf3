//! Invoke terminations: how a one-shot `run` effect ends.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// A typed failure produced by a one-shot `run` effect.
///
/// The tag selects the state's failure handler; the message is diagnostic
/// payload available to that handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invoke failed with `{tag}`: {message}")]
pub struct InvokeFailure {
    /// Failure tag, dispatched against the state's `on_failure` table.
    pub tag: String,
    /// Diagnostic message.
    pub message: String,
}

impl InvokeFailure {
    /// Build a failure with `tag` and `message`.
    pub fn new(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            message: message.into(),
        }
    }
}

/// Terminal classification of a one-shot `run` effect that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    /// A typed failure returned by the effect itself.
    #[error(transparent)]
    Failure(InvokeFailure),

    /// An unexpected defect (the effect panicked).
    #[error("invoke defected: {message}")]
    Defect {
        /// Panic payload rendered as text, when available.
        message: String,
    },

    /// The effect was cancelled before completing.
    #[error("invoke interrupted")]
    Interrupted,
}
