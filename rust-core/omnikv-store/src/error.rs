// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error types for the omnikv store contract.
//
// One enum covers every failure a `Store` can report: validation failures
// raised before any engine access, codec failures on either side of the
// engine, opaque engine errors carried as their original source, cache
// admission refusals, use after close, and option validation at construction.

use thiserror::Error;

/// Boxed engine error, kept intact as the `source` of [`StoreError::Engine`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur when interacting with a [`Store`](crate::Store).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key was empty. Raised by validation before the engine is touched.
    #[error("key must not be empty")]
    EmptyKey,

    /// The value to write was nil (`None` or `()`). Raised by validation
    /// before the engine is touched.
    #[error("value must not be nil")]
    NilValue,

    /// The codec could not represent the value.
    #[error("{codec} serialization failed: {message}")]
    Serialization {
        /// Name of the codec that failed.
        codec: &'static str,
        /// Codec-specific failure description.
        message: String,
    },

    /// The codec could not populate the read target from the stored bytes.
    #[error("{codec} deserialization failed: {message}")]
    Deserialization {
        /// Name of the codec that failed.
        codec: &'static str,
        /// Codec-specific failure description.
        message: String,
    },

    /// The underlying engine failed. The engine's own error is the source.
    #[error("{backend} engine error: {source}")]
    Engine {
        /// Name of the engine that failed.
        backend: &'static str,
        /// The engine error, unmodified.
        #[source]
        source: BoxError,
    },

    /// A caching engine refused to admit the entry.
    #[error("{backend} did not admit key '{key}': {reason}")]
    Admission {
        /// Name of the refusing engine.
        backend: &'static str,
        /// The key that was refused.
        key: String,
        /// Why admission failed.
        reason: String,
    },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// Adapter options were rejected at construction.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StoreError {
    /// Wrap an engine error, keeping it as the error source.
    pub fn engine(backend: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Engine {
            backend,
            source: source.into(),
        }
    }

    /// True for the errors raised by the validation module.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyKey | Self::NilValue)
    }

    /// True for serialization and deserialization failures.
    pub fn is_codec(&self) -> bool {
        matches!(self, Self::Serialization { .. } | Self::Deserialization { .. })
    }
}

/// Errors raised while resolving adapter options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly supplied option value is unusable.
    #[error("invalid option `{option}`: {reason}")]
    InvalidOption {
        /// Option field name.
        option: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_validation_display() {
        assert_eq!(StoreError::EmptyKey.to_string(), "key must not be empty");
        assert_eq!(StoreError::NilValue.to_string(), "value must not be nil");
        assert!(StoreError::EmptyKey.is_validation());
        assert!(StoreError::NilValue.is_validation());
        assert!(!StoreError::Closed.is_validation());
    }

    #[test]
    fn test_codec_display() {
        let err = StoreError::Serialization {
            codec: "json",
            message: "key must be a string".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "json serialization failed: key must be a string"
        );
        assert!(err.is_codec());

        let err = StoreError::Deserialization {
            codec: "cbor",
            message: "unexpected end".to_string(),
        };
        assert!(err.to_string().contains("cbor deserialization failed"));
        assert!(err.is_codec());
    }

    #[test]
    fn test_engine_error_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = StoreError::engine("sled", io_err);
        assert!(err.to_string().contains("sled engine error"));

        let source = err.source().expect("engine error must carry its source");
        let io = source
            .downcast_ref::<std::io::Error>()
            .expect("source should be the original io::Error");
        assert_eq!(io.to_string(), "disk gone");
    }

    #[test]
    fn test_admission_display() {
        let err = StoreError::Admission {
            backend: "moka",
            key: "big".to_string(),
            reason: "cost 200 exceeds max cost 100".to_string(),
        };
        assert!(err.to_string().contains("moka did not admit key 'big'"));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_config_error_converts() {
        let err: StoreError = ConfigError::InvalidOption {
            option: "max_cost",
            reason: "must be positive".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "invalid option `max_cost`: must be positive"
        );
    }
}
