//! Serializable subject summaries consumed by the viewer.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::electrode::Hemisphere;
use crate::error::Result;
use crate::keyframe::KeyframeExport;

pub use crate::colormap::ColormapExport;

/// Subject transforms and available volumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectInfo {
    pub subject_code: String,
    /// voxel → scanner RAS.
    #[serde(rename = "Norig")]
    pub norig: [[f64; 4]; 4],
    /// voxel → tkrRAS.
    #[serde(rename = "Torig")]
    pub torig: [[f64; 4]; 4],
    /// scanner RAS → MNI305.
    pub xfm: [[f64; 4]; 4],
    /// tkrRAS → MNI305.
    #[serde(rename = "vox2vox_MNI305")]
    pub vox2vox_mni305: [[f64; 4]; 4],
    pub volume_types: Vec<String>,
    pub atlas_types: Vec<String>,
    /// Base transforms served as identity.
    pub missing_transforms: Vec<String>,
}

/// One electrode contact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElectrodeExport {
    pub name: String,
    pub group_name: String,
    pub number: u32,
    pub label: String,
    /// tkrRAS position.
    pub position: [f64; 3],
    #[serde(rename = "MNI305_position")]
    pub mni305_position: [f64; 3],
    pub sphere_position: [f64; 3],
    pub radius: f64,
    pub width_segments: u32,
    pub height_segments: u32,
    pub is_electrode: bool,
    pub is_surface_electrode: bool,
    pub sub_cortical: bool,
    pub use_template: bool,
    pub surface_type: String,
    pub hemisphere: Hemisphere,
    pub search_geoms: Hemisphere,
    pub vertex_number: i64,
    pub layer: u8,
    pub keyframes: BTreeMap<String, KeyframeExport>,
    /// Electrode group transform, row-major.
    pub transform: [f64; 16],
}

/// Everything the viewer needs for one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectExport {
    pub subject_data: SubjectInfo,
    pub electrodes: Vec<ElectrodeExport>,
    pub colormaps: BTreeMap<String, ColormapExport>,
    /// First colormap by name.
    pub default_colormap: Option<String>,
}

impl SubjectExport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self).map_err(anyhow::Error::from)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self).map_err(anyhow::Error::from)?)
    }
}
