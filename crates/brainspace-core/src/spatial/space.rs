//! Coordinate spaces and imaging modalities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TransformError;

/// The closed set of coordinate spaces understood by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Space {
    /// Voxel (IJK) indexing space of a volume.
    Voxel,
    /// Scanner right-anterior-superior space.
    Ras,
    /// FreeSurfer tk-registered RAS, the viewer's native frame.
    RasTkr,
    /// MNI305 template space.
    Mni305,
    /// MNI152 template space.
    Mni152,
}

impl Space {
    /// All supported spaces.
    pub const ALL: [Space; 5] = [
        Space::Voxel,
        Space::Ras,
        Space::RasTkr,
        Space::Mni305,
        Space::Mni152,
    ];

    /// Canonical lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Space::Voxel => "voxel",
            Space::Ras => "ras",
            Space::RasTkr => "ras_tkr",
            Space::Mni305 => "mni305",
            Space::Mni152 => "mni152",
        }
    }

    /// Whether the space is one of the two template spaces.
    pub fn is_template(&self) -> bool {
        matches!(self, Space::Mni305 | Space::Mni152)
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Space {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "voxel" => Ok(Space::Voxel),
            "ras" => Ok(Space::Ras),
            "ras_tkr" => Ok(Space::RasTkr),
            "mni305" => Ok(Space::Mni305),
            "mni152" => Ok(Space::Mni152),
            other => Err(TransformError::unsupported_space(other)),
        }
    }
}

/// Imaging channel an endpoint of a transform is anchored to.
///
/// The set is open; `T1` is the identity modality that transforms may be
/// re-anchored through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modality(String);

impl Modality {
    /// Name of the identity modality.
    pub const T1: &'static str = "T1";

    /// Create a modality tag.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// T1-weighted MRI.
    pub fn t1() -> Self {
        Self(Self::T1.to_string())
    }

    /// Computed tomography.
    pub fn ct() -> Self {
        Self("CT".to_string())
    }

    /// Whether this is the identity modality.
    pub fn is_identity(&self) -> bool {
        self.0 == Self::T1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Modality {
    fn default() -> Self {
        Self::t1()
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Modality {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_round_trip_names() {
        for space in Space::ALL {
            let parsed: Space = space.as_str().parse().unwrap();
            assert_eq!(parsed, space);
        }
    }

    #[test]
    fn test_space_rejects_unknown() {
        let err = "talairach".parse::<Space>().unwrap_err();
        assert_eq!(err, TransformError::UnsupportedSpace("talairach".to_string()));
        // Names are case-sensitive
        assert!("RAS".parse::<Space>().is_err());
    }

    #[test]
    fn test_space_serde_names() {
        let json = serde_json::to_string(&Space::RasTkr).unwrap();
        assert_eq!(json, "\"ras_tkr\"");
        let back: Space = serde_json::from_str("\"mni152\"").unwrap();
        assert_eq!(back, Space::Mni152);
    }

    #[test]
    fn test_modality_identity() {
        assert!(Modality::t1().is_identity());
        assert!(Modality::default().is_identity());
        assert!(!Modality::ct().is_identity());
        assert!(!Modality::new("t1").is_identity());
    }
}
