//! Error types for subject sessions.

use std::path::PathBuf;

use brainspace_core::TransformError;
use thiserror::Error;

use crate::colormap::ColormapError;
use crate::keyframe::KeyframeError;

/// Main error type for subject operations.
#[derive(Error, Debug)]
pub enum SubjectError {
    /// Transform algebra failure.
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Keyframe(#[from] KeyframeError),

    #[error(transparent)]
    Colormap(#[from] ColormapError),

    /// Failure reported by a file reader.
    #[error(transparent)]
    Io(#[from] anyhow::Error),

    /// Subject codes start with a letter and contain only letters, digits,
    /// `_` and `-`.
    #[error("Invalid subject code: {0:?}")]
    InvalidSubjectCode(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// A required table column is absent.
    #[error("Invalid table, must contain column '{0}'")]
    MissingColumn(String),

    /// Electrode numbers are positive integers.
    #[error("Invalid electrode number {value:?} on row {row}, must start from 1")]
    InvalidElectrodeNumber { row: usize, value: String },

    /// A position given in a space the operation does not accept.
    #[error("Invalid position: {0}")]
    InvalidPosition(String),
}

/// Result type for subject operations.
pub type Result<T> = std::result::Result<T, SubjectError>;

impl SubjectError {
    pub fn missing_column(name: impl Into<String>) -> Self {
        Self::MissingColumn(name.into())
    }

    pub fn invalid_position(msg: impl Into<String>) -> Self {
        Self::InvalidPosition(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainspace_core::Space;

    #[test]
    fn test_error_display() {
        let err = SubjectError::missing_column("Electrode");
        assert_eq!(err.to_string(), "Invalid table, must contain column 'Electrode'");

        let err = SubjectError::InvalidElectrodeNumber {
            row: 3,
            value: "0".to_string(),
        };
        assert!(err.to_string().contains("row 3"));
    }

    #[test]
    fn test_transform_error_conversion() {
        let err: SubjectError = TransformError::SpaceMismatch {
            expected: Space::Mni305,
            actual: Space::Ras,
        }
        .into();
        assert!(matches!(err, SubjectError::Transform(_)));
        assert_eq!(err.to_string(), "Space mismatch: expected mni305, got ras");
    }
}
