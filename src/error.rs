//! Error types for the attendance tracker.

use std::path::PathBuf;

use crate::extraction::DocumentKind;

/// Failures while obtaining or interpreting an analysis-service result.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The service answered, but the payload does not match the document shape.
    #[error("malformed {kind} extraction: {reason}")]
    Malformed {
        /// Document kind that was requested.
        kind: DocumentKind,
        /// Parser message describing the mismatch.
        reason: String,
    },

    /// The service itself failed (network error, non-success response).
    #[error("analysis service failed: {0}")]
    ServiceFailure(String),

    /// Returned when an image has an extension other than png, jpg or jpeg.
    #[error("unsupported image type for {path}")]
    UnsupportedImage {
        /// Offending file.
        path: PathBuf,
    },

    /// Returned when an image exceeds the upload limit.
    #[error("image {path} is {size} bytes, limit is {limit}")]
    ImageTooLarge {
        /// Offending file.
        path: PathBuf,
        /// Actual size in bytes.
        size: u64,
        /// Upload limit in bytes.
        limit: u64,
    },

    /// Returned when an image file has no content.
    #[error("image {path} is empty")]
    EmptyImage {
        /// Offending file.
        path: PathBuf,
    },

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the key/value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store i/o failed for key {key}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be decoded.
    #[error("stored record {key} is corrupt")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of state-container operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Import documents must carry both `subjects` and `settings`.
    #[error("import is missing required keys: subjects and settings")]
    MissingKeys,

    #[error("import is not valid attendance data")]
    InvalidJson(#[source] serde_json::Error),

    #[error("no subject with id {0}")]
    UnknownSubject(String),

    #[error("csv import failed")]
    Csv(#[from] csv::Error),

    /// Goals are percentages.
    #[error("goal must be within 0..=100, got {0}")]
    GoalOutOfRange(f64),

    /// Goals are whole percentages.
    #[error("goal must be a whole percentage, got {0}")]
    FractionalGoal(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_names_document_kind() {
        let e = ExtractionError::Malformed {
            kind: DocumentKind::Leaves,
            reason: "missing field".to_string(),
        };
        assert_eq!(e.to_string(), "malformed leaves extraction: missing field");
    }

    #[test]
    fn image_too_large_message() {
        let e = ExtractionError::ImageTooLarge {
            path: PathBuf::from("shot.png"),
            size: 11,
            limit: 10,
        };
        assert_eq!(e.to_string(), "image shot.png is 11 bytes, limit is 10");
    }

    #[test]
    fn state_error_messages() {
        assert_eq!(
            StateError::GoalOutOfRange(120.0).to_string(),
            "goal must be within 0..=100, got 120"
        );
        assert_eq!(
            StateError::UnknownSubject("abc".into()).to_string(),
            "no subject with id abc"
        );
        assert_eq!(
            StateError::FractionalGoal(99.9).to_string(),
            "goal must be a whole percentage, got 99.9"
        );
    }

    #[test]
    fn errors_are_send_and_sync() {
        fn assert_impl<T: std::error::Error + Send + Sync>() {}
        assert_impl::<ExtractionError>();
        assert_impl::<StoreError>();
        assert_impl::<StateError>();
    }
}
