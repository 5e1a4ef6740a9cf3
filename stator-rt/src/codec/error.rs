//! Error types for the codec boundary.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Codec error types
///
/// Decode failures carry the path of the offending value so persistence
/// layers can log a precise reason before falling back to the initial state.
///
/// # Examples
///
/// ```rust
/// use stator_rt::codec::CodecError;
///
/// let err = CodecError::Decode {
///     path: "context.position".into(),
///     reason: "expected number".into(),
/// };
/// assert!(err.to_string().contains("context.position"));
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// A persisted value could not be decoded.
    #[error("decode failed at {path}: {reason}")]
    Decode {
        /// Path of the offending value, e.g. `state.tag` or `context.position`.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A live value could not be encoded.
    #[error("encode failed at {path}: {reason}")]
    Encode {
        /// Path of the offending value.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// The machine definition has no codec configured.
    #[error("machine definition has no codec configured")]
    MissingCodec,
}

impl CodecError {
    /// Build a decode error at `path`.
    pub fn decode(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build an encode error at `path`.
    pub fn encode(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Encode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = CodecError::decode("state", "unknown tag `Bogus`");
        let msg = err.to_string();
        assert!(msg.contains("state"));
        assert!(msg.contains("Bogus"));
    }

    #[test]
    fn test_encode_error_display() {
        let err = CodecError::encode("context", "not serializable");
        assert!(err.to_string().starts_with("encode failed"));
    }

    #[test]
    fn test_missing_codec_display() {
        let err = CodecError::MissingCodec;
        assert_eq!(err.to_string(), "machine definition has no codec configured");
    }
}
