//! Compositional field transforms layered over an inner codec.
//!
//! Transforms rewrite individual fields of the already-encoded value before
//! it is persisted and after it is loaded, leaving the inner codec's
//! understanding of the in-memory types untouched. The stock transform maps
//! RFC 3339 date strings (chrono's serde default for `DateTime<Utc>`) to
//! integer Unix millis on the wire.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::CodecError;
use super::traits::SnapshotCodec;

/// A bidirectional rewrite of one encoded field.
#[derive(Clone)]
pub enum FieldTransform {
    /// RFC 3339 date string in memory, integer Unix millis on the wire.
    DateMillis,

    /// Caller-supplied rewrites. `encode` runs toward the wire, `decode`
    /// back toward the inner codec's shape.
    Custom {
        /// In-memory encoded value → wire value.
        encode: Arc<dyn Fn(&Value) -> Result<Value, CodecError> + Send + Sync>,
        /// Wire value → in-memory encoded value.
        decode: Arc<dyn Fn(&Value) -> Result<Value, CodecError> + Send + Sync>,
    },
}

impl FieldTransform {
    fn apply_encode(&self, path: &str, value: &Value) -> Result<Value, CodecError> {
        match self {
            FieldTransform::DateMillis => {
                let text = value
                    .as_str()
                    .ok_or_else(|| CodecError::encode(path, "expected RFC 3339 date string"))?;
                let parsed: DateTime<Utc> = text
                    .parse()
                    .map_err(|e| CodecError::encode(path, format!("invalid date: {e}")))?;
                Ok(Value::from(parsed.timestamp_millis()))
            }
            FieldTransform::Custom { encode, .. } => encode(value),
        }
    }

    fn apply_decode(&self, path: &str, value: &Value) -> Result<Value, CodecError> {
        match self {
            FieldTransform::DateMillis => {
                let millis = value
                    .as_i64()
                    .ok_or_else(|| CodecError::decode(path, "expected integer millis"))?;
                let datetime = Utc
                    .timestamp_millis_opt(millis)
                    .single()
                    .ok_or_else(|| CodecError::decode(path, format!("millis out of range: {millis}")))?;
                Ok(Value::from(datetime.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)))
            }
            FieldTransform::Custom { decode, .. } => decode(value),
        }
    }
}

/// Codec wrapper applying per-field transforms around an inner codec.
///
/// Transforms are configured per context field and per `(state tag, field)`
/// pair. Fields absent from the encoded value are skipped; a present field
/// that fails to transform is a codec error at that field's path.
///
/// # Example
/// ```rust,ignore
/// let codec = TransformCodec::new(JsonCodec::<S, C>::new())
///     .context_field("opened_at", FieldTransform::DateMillis)
///     .state_field("Open", "since", FieldTransform::DateMillis);
/// ```
pub struct TransformCodec<S, C> {
    inner: Arc<dyn SnapshotCodec<S, C>>,
    state_fields: HashMap<(String, String), FieldTransform>,
    context_fields: HashMap<String, FieldTransform>,
}

impl<S, C> TransformCodec<S, C> {
    /// Wrap `inner` with an empty transform set.
    pub fn new(inner: impl SnapshotCodec<S, C>) -> Self {
        Self {
            inner: Arc::new(inner),
            state_fields: HashMap::new(),
            context_fields: HashMap::new(),
        }
    }

    /// Register a transform for a context field.
    pub fn context_field(mut self, field: impl Into<String>, transform: FieldTransform) -> Self {
        self.context_fields.insert(field.into(), transform);
        self
    }

    /// Register a transform for a state-payload field of one state tag.
    pub fn state_field(
        mut self,
        state_tag: impl Into<String>,
        field: impl Into<String>,
        transform: FieldTransform,
    ) -> Self {
        self.state_fields
            .insert((state_tag.into(), field.into()), transform);
        self
    }

    fn rewrite_object<'a>(
        value: Value,
        root: &str,
        transforms: impl Iterator<Item = (&'a String, &'a FieldTransform)>,
        encode: bool,
    ) -> Result<Value, CodecError> {
        let Value::Object(mut map) = value else {
            // Nothing to rewrite on non-object encodings.
            return Ok(value);
        };

        for (field, transform) in transforms {
            if let Some(current) = map.get(field.as_str()) {
                let path = format!("{root}.{field}");
                let rewritten = if encode {
                    transform.apply_encode(&path, current)?
                } else {
                    transform.apply_decode(&path, current)?
                };
                map.insert(field.clone(), rewritten);
            }
        }

        Ok(Value::Object(map))
    }

    fn state_transforms<'s>(
        &'s self,
        tag: &str,
    ) -> impl Iterator<Item = (&'s String, &'s FieldTransform)> + 's {
        let tag = tag.to_owned();
        self.state_fields
            .iter()
            .filter(move |((t, _), _)| *t == tag)
            .map(|((_, field), transform)| (field, transform))
    }
}

impl<S, C> SnapshotCodec<S, C> for TransformCodec<S, C>
where
    S: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    fn encode_state(&self, state: &S) -> Result<Value, CodecError> {
        let encoded = self.inner.encode_state(state)?;
        let tag = encoded
            .get("tag")
            .and_then(Value::as_str)
            .map(str::to_owned);

        match tag {
            Some(tag) => Self::rewrite_object(encoded, "state", self.state_transforms(&tag), true),
            None => Ok(encoded),
        }
    }

    fn decode_state(&self, value: &Value) -> Result<S, CodecError> {
        let tag = value.get("tag").and_then(Value::as_str).map(str::to_owned);

        let restored = match tag {
            Some(tag) => {
                Self::rewrite_object(value.clone(), "state", self.state_transforms(&tag), false)?
            }
            None => value.clone(),
        };

        self.inner.decode_state(&restored)
    }

    fn encode_context(&self, context: &C) -> Result<Value, CodecError> {
        let encoded = self.inner.encode_context(context)?;
        Self::rewrite_object(encoded, "context", self.context_fields.iter(), true)
    }

    fn decode_context(&self, value: &Value) -> Result<C, CodecError> {
        let restored =
            Self::rewrite_object(value.clone(), "context", self.context_fields.iter(), false)?;
        self.inner.decode_context(&restored)
    }
}
