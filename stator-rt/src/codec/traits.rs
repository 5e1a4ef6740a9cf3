//! The pluggable codec contract for persisted snapshots.
//!
//! The runtime consults the codec only at the persistence boundary (save,
//! load, snapshot sync) and never during normal event processing. All four
//! functions are pure and total on their domain: they return a value or a
//! structured [`CodecError`], never panic.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::CodecError;

/// Pluggable encoder/decoder for a machine's state and context.
///
/// The wire shape is `serde_json::Value`: states encode as
/// `{"tag": ..., ...fields}` objects and contexts as plain objects. The
/// default implementation is [`JsonCodec`](super::JsonCodec); field-level
/// transforms (e.g. `Date ↔ integer millis`) are layered on with
/// [`TransformCodec`](super::TransformCodec).
///
/// Implementations must not capture the running actor; codecs are shared
/// (`Send + Sync`) and may be consulted from the persistence layer's own
/// tasks.
pub trait SnapshotCodec<S, C>: Send + Sync + 'static {
    /// Encode a state value into its persisted form.
    fn encode_state(&self, state: &S) -> Result<Value, CodecError>;

    /// Decode a persisted state value.
    ///
    /// Unknown state tags or missing required fields produce
    /// [`CodecError::Decode`] with the offending path; the caller decides
    /// whether to fall back to the initial state.
    fn decode_state(&self, value: &Value) -> Result<S, CodecError>;

    /// Encode a context value into its persisted form.
    fn encode_context(&self, context: &C) -> Result<Value, CodecError>;

    /// Decode a persisted context value.
    fn decode_context(&self, value: &Value) -> Result<C, CodecError>;
}
