//! Provenance side-channel carried by tagged matrices.

use std::fmt;

use serde::{Deserialize, Serialize};

/// File format a transform was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// NIfTI-1/2 (`.nii`, `.nii.gz`).
    Nii,
    /// FreeSurfer MGH (`.mgz`, `.mgh`).
    Mgz,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Nii => "nii",
            SourceFormat::Mgz => "mgz",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a transform came from. Never affects the math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Provenance {
    /// The transform stands in for one that could not be observed.
    pub missing: bool,
    /// Header format the transform was read from.
    pub source_format: Option<SourceFormat>,
}

impl Provenance {
    /// Provenance of a placeholder identity.
    pub fn missing() -> Self {
        Self {
            missing: true,
            source_format: None,
        }
    }

    /// Provenance of a transform read from a volume header.
    pub fn from_format(format: SourceFormat) -> Self {
        Self {
            missing: false,
            source_format: Some(format),
        }
    }

    /// Provenance of a transform derived from two others.
    pub fn derived(left: &Provenance, right: &Provenance) -> Self {
        Self {
            missing: left.missing || right.missing,
            source_format: None,
        }
    }
}
