//! Pluggable codec boundary for persisted snapshots.
//!
//! The codec owns the translation between live machine values and their
//! persisted `serde_json::Value` shapes:
//! - [`SnapshotCodec`]: the four-function contract (`encode_state`,
//!   `decode_state`, `encode_context`, `decode_context`)
//! - [`JsonCodec`]: the serde-backed default
//! - [`TransformCodec`] / [`FieldTransform`]: per-field wire rewrites such
//!   as `Date ↔ integer millis`
//! - [`CodecError`]: structured failures with value paths

pub mod error;
pub mod json;
pub mod traits;
pub mod transform;

pub use error::CodecError;
pub use json::JsonCodec;
pub use traits::SnapshotCodec;
pub use transform::{FieldTransform, TransformCodec};
