//! Configuration injected into a subject session.
//!
//! Collects the constants the viewer back-end relies on: the MNI305→MNI152
//! affine, volume discovery prefixes, electrode resolution limits, viewer
//! layer indices and colormap defaults. Built once at startup and passed
//! explicitly; every section has serde defaults so partial JSON files work.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransformError};
use crate::spatial::Space;
use crate::transform::TaggedMatrix;

/// FreeSurfer's fixed MNI305 → MNI152 affine.
pub const MNI305_TO_MNI152: [[f64; 4]; 4] = [
    [0.99750, -0.00730, 0.01760, -0.04290],
    [0.01460, 1.00090, -0.00240, 1.54960],
    [-0.01300, -0.00930, 0.99710, 1.18400],
    [0.00000, 0.00000, 0.00000, 1.00000],
];

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainspaceConfig {
    pub transforms: TransformConfig,
    pub volumes: VolumeConfig,
    pub electrodes: ElectrodeConfig,
    pub layers: LayerConfig,
    pub colormap: ColormapConfig,
}

impl BrainspaceConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TransformError::invalid_configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON config file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TransformError::invalid_configuration(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Set the MNI305 → MNI152 affine.
    pub fn with_mni305_to_mni152(mut self, rows: [[f64; 4]; 4]) -> Self {
        self.transforms.mni305_to_mni152 = rows;
        self
    }

    /// Set the upper bound of a valid electrode coordinate length.
    pub fn with_max_valid_length(mut self, length: f64) -> Self {
        self.electrodes.max_valid_length = length;
        self
    }

    /// Set the volume prefixes searched at subject construction.
    pub fn with_volume_prefixes(mut self, slices: Vec<String>, atlases: Vec<String>) -> Self {
        self.volumes.slice_prefixes = slices;
        self.volumes.atlas_prefixes = atlases;
        self
    }

    /// Enable or disable symmetrical colormap ranges by default.
    pub fn with_symmetrical_colormaps(mut self, symmetrical: bool) -> Self {
        self.colormap.symmetrical = symmetrical;
        self
    }

    /// Check every section for values the algorithms cannot work with.
    pub fn validate(&self) -> Result<()> {
        let m = &self.transforms.mni305_to_mni152;
        if m.iter().flatten().any(|v| !v.is_finite()) {
            return Err(TransformError::invalid_configuration(
                "mni305_to_mni152 contains non-finite values",
            ));
        }
        if m[3] != [0.0, 0.0, 0.0, 1.0] {
            return Err(TransformError::invalid_configuration(
                "mni305_to_mni152 must be affine (bottom row 0 0 0 1)",
            ));
        }
        let e = &self.electrodes;
        for (name, value) in [
            ("max_valid_length", e.max_valid_length),
            ("sphere_radius", e.sphere_radius),
            ("sphere_min_length", e.sphere_min_length),
            ("surface_radius", e.surface_radius),
            ("depth_radius", e.depth_radius),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(TransformError::invalid_configuration(format!(
                    "electrodes.{name} must be positive and finite, got {value}"
                )));
            }
        }
        if self.colormap.n_colors < 2 {
            return Err(TransformError::invalid_configuration(format!(
                "colormap.n_colors must be at least 2, got {}",
                self.colormap.n_colors
            )));
        }
        if self.volumes.extensions.is_empty() {
            return Err(TransformError::invalid_configuration(
                "volumes.extensions must not be empty",
            ));
        }
        Ok(())
    }
}

/// Fixed transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub mni305_to_mni152: [[f64; 4]; 4],
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            mni305_to_mni152: MNI305_TO_MNI152,
        }
    }
}

impl TransformConfig {
    /// The MNI305 → MNI152 constant as a tagged matrix.
    pub fn mni305_to_mni152(&self) -> TaggedMatrix {
        TaggedMatrix::from_rows(self.mni305_to_mni152, Space::Mni305, Space::Mni152)
    }
}

/// Where to look for volumes and the registration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// MRI directory relative to the subject root.
    pub mri_dir: String,
    /// Linear registration file relative to the subject root.
    pub xfm_path: String,
    pub slice_prefixes: Vec<String>,
    pub atlas_prefixes: Vec<String>,
    /// Extensions in priority order.
    pub extensions: Vec<String>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            mri_dir: "mri".to_string(),
            xfm_path: "mri/transforms/talairach.xfm".to_string(),
            slice_prefixes: owned(&[
                "brain.finalsurfs",
                "synthSR.norm",
                "synthSR",
                "brain",
                "brainmask",
                "brainmask.auto",
                "T1",
            ]),
            atlas_prefixes: owned(&[
                "aparc+aseg",
                "aparc.a2009s+aseg",
                "aparc.DKTatlas+aseg",
                "aseg",
            ]),
            extensions: owned(&["mgz", "nii.gz", "nii"]),
        }
    }
}

impl VolumeConfig {
    /// Candidate files for the default slice and atlas prefixes.
    ///
    /// Ordered by extension first, then slice prefixes before atlas
    /// prefixes, so every MGZ candidate precedes every NIfTI candidate.
    pub fn default_volume_files(&self, subject_root: &Path) -> Vec<PathBuf> {
        let mri = subject_root.join(&self.mri_dir);
        let prefixes: Vec<&String> = self
            .slice_prefixes
            .iter()
            .chain(self.atlas_prefixes.iter())
            .collect();
        self.extensions
            .iter()
            .flat_map(|ext| {
                let mri = &mri;
                prefixes
                    .iter()
                    .map(move |prefix| mri.join(format!("{prefix}.{ext}")))
            })
            .collect()
    }

    /// Candidate files for a single prefix.
    pub fn volume_files_for(&self, subject_root: &Path, prefix: &str) -> Vec<PathBuf> {
        let mri = subject_root.join(&self.mri_dir);
        self.extensions
            .iter()
            .map(|ext| mri.join(format!("{prefix}.{ext}")))
            .collect()
    }
}

/// Electrode coordinate resolution limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectrodeConfig {
    /// Candidate coordinates at or beyond this length are rejected.
    pub max_valid_length: f64,
    /// Magnitude sphere positions are rescaled to.
    pub sphere_radius: f64,
    /// Sphere positions shorter than this snap to the origin.
    pub sphere_min_length: f64,
    /// Default radius of surface (ECoG) contacts.
    pub surface_radius: f64,
    /// Default radius of depth (sEEG) contacts.
    pub depth_radius: f64,
}

impl Default for ElectrodeConfig {
    fn default() -> Self {
        Self {
            max_valid_length: 500.0,
            sphere_radius: 100.0,
            sphere_min_length: 1e-3,
            surface_radius: 2.0,
            depth_radius: 1.0,
        }
    }
}

/// Viewer render-layer indices.
///
/// 0, 2, 3 belong to the main camera, 1 is shared by all cameras, 4-6 to the
/// side cameras, 7-13 are reserved by the viewer, 14-31 are invisible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    pub user_main_camera: u8,
    pub user_all_cameras: u8,
    pub user_all_side_cameras: u8,
    pub sys_all_cameras: u8,
    pub sys_main_camera: u8,
    pub sys_coronal: u8,
    pub sys_axial: u8,
    pub sys_sagittal: u8,
    pub sys_all_side_cameras: u8,
    pub sys_raycaster: u8,
    pub invisible: u8,
    pub max_render_order: u32,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            user_main_camera: 0,
            user_all_cameras: 1,
            user_all_side_cameras: 4,
            sys_all_cameras: 7,
            sys_main_camera: 8,
            sys_coronal: 9,
            sys_axial: 10,
            sys_sagittal: 11,
            sys_all_side_cameras: 13,
            sys_raycaster: 14,
            invisible: 31,
            max_render_order: 9_999_999,
        }
    }
}

/// Colormap defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColormapConfig {
    /// Suggested number of colours for continuous values.
    pub n_colors: usize,
    pub continuous_palette: Vec<String>,
    pub discrete_palette: Vec<String>,
    /// Whether new colormaps centre their range on zero.
    pub symmetrical: bool,
}

impl Default for ColormapConfig {
    fn default() -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            n_colors: 64,
            continuous_palette: owned(&[
                "#053061", "#2166ac", "#4393c3", "#92c5de", "#d1e5f0", "#ffffff", "#fddbc7",
                "#f4a582", "#d6604d", "#b2182b", "#67001f",
            ]),
            discrete_palette: owned(&["#FFA500", "#1874CD", "#006400", "#FF4500", "#A52A2A", "#7D26CD"]),
            symmetrical: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BrainspaceConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.electrodes.max_valid_length, 500.0);
        assert_eq!(config.colormap.n_colors, 64);
    }

    #[test]
    fn test_partial_json() {
        let config = BrainspaceConfig::from_json_str(
            r#"{ "electrodes": { "max_valid_length": 300.0 }, "colormap": { "symmetrical": false } }"#,
        )
        .unwrap();
        assert_eq!(config.electrodes.max_valid_length, 300.0);
        assert_eq!(config.electrodes.sphere_radius, 100.0);
        assert!(!config.colormap.symmetrical);
        assert_eq!(config.transforms.mni305_to_mni152, MNI305_TO_MNI152);
    }

    #[test]
    fn test_rejects_non_affine_constant() {
        let mut rows = MNI305_TO_MNI152;
        rows[3] = [0.0, 0.0, 1.0, 1.0];
        let config = BrainspaceConfig::new().with_mni305_to_mni152(rows);
        assert!(matches!(config.validate(), Err(TransformError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rejects_bad_lengths() {
        let config = BrainspaceConfig::new().with_max_valid_length(0.0);
        assert!(config.validate().is_err());
        assert!(BrainspaceConfig::from_json_str(r#"{ "colormap": { "n_colors": 1 } }"#).is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brainspace.json");
        std::fs::write(&path, r#"{ "volumes": { "slice_prefixes": ["T1"] } }"#).unwrap();
        let config = BrainspaceConfig::from_path(&path).unwrap();
        assert_eq!(config.volumes.slice_prefixes, vec!["T1".to_string()]);
        assert!(BrainspaceConfig::from_path(dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_default_volume_files_order() {
        let config = VolumeConfig {
            slice_prefixes: vec!["T1".to_string()],
            atlas_prefixes: vec!["aseg".to_string()],
            ..VolumeConfig::default()
        };
        let files = config.default_volume_files(Path::new("/subj"));
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["T1.mgz", "aseg.mgz", "T1.nii.gz", "aseg.nii.gz", "T1.nii", "aseg.nii"]
        );
        assert!(files[0].starts_with("/subj/mri"));
    }

    #[test]
    fn test_mni_constant_tags() {
        let m = TransformConfig::default().mni305_to_mni152();
        assert_eq!(m.space_from(), Space::Mni305);
        assert_eq!(m.space_to(), Space::Mni152);
        assert_eq!(m[(1, 3)], 1.54960);
    }
}
