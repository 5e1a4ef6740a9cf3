//! Default serde-backed codec.

// Layer 1: Standard library imports
use std::marker::PhantomData;

// Layer 2: Third-party crate imports
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::CodecError;
use super::traits::SnapshotCodec;

/// Serde-backed codec producing the `{"tag": ..., ...fields}` state shape.
///
/// State enums are expected to use serde internal tagging
/// (`#[serde(tag = "tag")]`) so the persisted shape carries the state tag as
/// a plain field. Contexts serialize as ordinary objects.
///
/// `decode_state` also accepts a bare tag string and widens it to
/// `{"tag": <string>}` before decoding, so persistence rows that store only
/// the state tag round-trip for data-less states. States with required
/// payload fields fail to decode from a bare tag, which is surfaced as a
/// [`CodecError::Decode`] for the caller's fallback policy.
///
/// # Example
/// ```rust
/// use serde::{Deserialize, Serialize};
/// use stator_rt::codec::{JsonCodec, SnapshotCodec};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// #[serde(tag = "tag")]
/// enum DoorState {
///     Closed,
///     Opening { position: u32 },
/// }
///
/// let codec = JsonCodec::<DoorState, ()>::new();
/// let encoded = codec.encode_state(&DoorState::Opening { position: 40 }).unwrap();
/// assert_eq!(encoded["tag"], "Opening");
/// assert_eq!(encoded["position"], 40);
///
/// let decoded = codec.decode_state(&encoded).unwrap();
/// assert_eq!(decoded, DoorState::Opening { position: 40 });
/// ```
pub struct JsonCodec<S, C> {
    _marker: PhantomData<fn() -> (S, C)>,
}

impl<S, C> JsonCodec<S, C> {
    /// Create a new serde-backed codec.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<S, C> Default for JsonCodec<S, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, C> Clone for JsonCodec<S, C> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<S, C> SnapshotCodec<S, C> for JsonCodec<S, C>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
    C: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn encode_state(&self, state: &S) -> Result<Value, CodecError> {
        serde_json::to_value(state).map_err(|e| CodecError::encode("state", e))
    }

    fn decode_state(&self, value: &Value) -> Result<S, CodecError> {
        // A bare tag string widens to the object shape used by rows that
        // persist only the parent state tag.
        let widened;
        let value = match value {
            Value::String(tag) => {
                widened = serde_json::json!({ "tag": tag });
                &widened
            }
            other => other,
        };

        serde_json::from_value(value.clone()).map_err(|e| CodecError::decode("state", e))
    }

    fn encode_context(&self, context: &C) -> Result<Value, CodecError> {
        serde_json::to_value(context).map_err(|e| CodecError::encode("context", e))
    }

    fn decode_context(&self, value: &Value) -> Result<C, CodecError> {
        serde_json::from_value(value.clone()).map_err(|e| CodecError::decode("context", e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "tag")]
    enum TestState {
        Off,
        Running { position: u32 },
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestContext {
        position: u32,
        label: String,
    }

    fn codec() -> JsonCodec<TestState, TestContext> {
        JsonCodec::new()
    }

    #[test]
    fn test_state_roundtrip() {
        let state = TestState::Running { position: 42 };
        let encoded = codec().encode_state(&state).unwrap();

        assert_eq!(encoded["tag"], "Running");
        assert_eq!(encoded["position"], 42);

        let decoded = codec().decode_state(&encoded).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_context_roundtrip() {
        let context = TestContext {
            position: 7,
            label: "door".into(),
        };

        let encoded = codec().encode_context(&context).unwrap();
        let decoded = codec().decode_context(&encoded).unwrap();
        assert_eq!(decoded, context);
    }

    #[test]
    fn test_bare_tag_decodes_unit_state() {
        let decoded = codec().decode_state(&json!("Off")).unwrap();
        assert_eq!(decoded, TestState::Off);
    }

    #[test]
    fn test_bare_tag_fails_for_state_with_fields() {
        let result = codec().decode_state(&json!("Running"));
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn test_unknown_tag_is_decode_error() {
        let result = codec().decode_state(&json!({ "tag": "Bogus" }));
        match result {
            Err(CodecError::Decode { path, .. }) => assert_eq!(path, "state"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_context_field() {
        let result = codec().decode_context(&json!({ "position": 1 }));
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }
}
