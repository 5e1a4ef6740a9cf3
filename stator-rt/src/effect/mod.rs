//! Per-state effect lifecycles.
//!
//! - [`scope`]: the structured-cancellation container for one state
//!   activation
//! - [`invoke`]: terminal classification of one-shot `run` effects

pub mod invoke;
pub mod scope;

pub use invoke::{InvokeError, InvokeFailure};
pub(crate) use scope::StateScope;
