//! Error types for transform algebra operations.
//!
//! Every failure of the tagged algebra is surfaced to the caller. Missing
//! source transforms are not errors; they are represented by identity
//! matrices flagged in their provenance.

use thiserror::Error;

use crate::spatial::{Modality, Space};

/// Main error type for coordinate-space operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// A space name outside the supported set.
    #[error("Unsupported space: {0} (supported: voxel, ras, ras_tkr, mni305, mni152)")]
    UnsupportedSpace(String),

    /// Tags of two matrices do not chain.
    #[error("Incompatible transform: {left} cannot be applied after {right}")]
    IncompatibleTransform { left: String, right: String },

    /// A non-T1 side of a transform does not match the requested space.
    #[error("Modality mismatch: {modality} transform is anchored to {actual}, requested {requested}")]
    ModalityMismatch {
        modality: Modality,
        actual: Space,
        requested: Space,
    },

    /// The affine cannot be inverted.
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    /// Vector operands live in different spaces.
    #[error("Space mismatch: expected {expected}, got {actual}")]
    SpaceMismatch { expected: Space, actual: Space },

    /// A matrix buffer with an unsupported number of elements.
    #[error("Invalid matrix buffer: expected 12 or 16 elements, got {0}")]
    InvalidBuffer(usize),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for coordinate-space operations.
pub type Result<T> = std::result::Result<T, TransformError>;

impl TransformError {
    /// Create an unsupported space error.
    pub fn unsupported_space(name: impl Into<String>) -> Self {
        Self::UnsupportedSpace(name.into())
    }

    /// Create a singular matrix error.
    pub fn singular(msg: impl Into<String>) -> Self {
        Self::SingularMatrix(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
