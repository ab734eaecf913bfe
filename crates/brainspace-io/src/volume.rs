//! Volume header access.
//!
//! Only the header fields needed for the voxel→RAS and voxel→tkrRAS affines
//! are read; voxel data is never decoded.

use std::path::Path;

use anyhow::{bail, Result};
use brainspace_core::spatial::Space;
use brainspace_core::transform::{SourceFormat, TaggedMatrix};
use nalgebra::Matrix4;

use crate::mgh_io::read_mgh_header;
use crate::nifti_io::read_nifti_header;

/// Geometry extracted from a volume header.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeHeader {
    /// Voxel → scanner RAS, tagged with the source format.
    pub affine: TaggedMatrix,
    /// Voxel → tkrRAS, tagged with the source format.
    pub tkr_affine: TaggedMatrix,
    pub format: SourceFormat,
    pub shape: [usize; 3],
    pub zooms: [f64; 3],
}

impl VolumeHeader {
    /// Assemble a header from raw affines.
    pub fn new(
        affine: Matrix4<f64>,
        tkr_affine: Matrix4<f64>,
        format: SourceFormat,
        shape: [usize; 3],
        zooms: [f64; 3],
    ) -> Self {
        Self {
            affine: TaggedMatrix::new(affine, Space::Voxel, Space::Ras).with_source_format(format),
            tkr_affine: TaggedMatrix::new(tkr_affine, Space::Voxel, Space::RasTkr)
                .with_source_format(format),
            format,
            shape,
            zooms,
        }
    }
}

/// Access to volume files on behalf of a subject.
pub trait VolumeReader {
    /// Whether a volume exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Read the geometry header of the volume at `path`.
    fn read_header(&self, path: &Path) -> Result<VolumeHeader>;
}

/// Infer the volume format from a file name.
pub fn infer_format(path: &Path) -> Option<SourceFormat> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    if name.ends_with(".nii") || name.ends_with(".nii.gz") {
        Some(SourceFormat::Nii)
    } else if name.ends_with(".mgz") || name.ends_with(".mgh") {
        Some(SourceFormat::Mgz)
    } else {
        None
    }
}

/// Whether `path` names a compressed `.mgz` volume. Plain `.mgh` files share
/// the MGH format but are not preferred over NIfTI for the tkr transform.
pub fn is_mgz_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase().ends_with(".mgz"))
        .unwrap_or(false)
}

/// Reads headers from the local file system, dispatching on extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileVolumeReader;

impl FileVolumeReader {
    pub fn new() -> Self {
        Self
    }
}

impl VolumeReader for FileVolumeReader {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_header(&self, path: &Path) -> Result<VolumeHeader> {
        match infer_format(path) {
            Some(SourceFormat::Nii) => read_nifti_header(path),
            Some(SourceFormat::Mgz) => read_mgh_header(path),
            None => bail!("Unsupported volume format: {}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_infer_format() {
        assert_eq!(infer_format(Path::new("mri/T1.mgz")), Some(SourceFormat::Mgz));
        assert_eq!(infer_format(Path::new("mri/orig.MGH")), Some(SourceFormat::Mgz));
        assert_eq!(infer_format(Path::new("mri/T1.nii.gz")), Some(SourceFormat::Nii));
        assert_eq!(infer_format(Path::new("mri/T1.nii")), Some(SourceFormat::Nii));
        assert_eq!(infer_format(Path::new("mri/T1.img")), None);
        assert_eq!(infer_format(&PathBuf::new()), None);
    }

    #[test]
    fn test_is_mgz_file() {
        assert!(is_mgz_file(Path::new("mri/T1.mgz")));
        assert!(is_mgz_file(Path::new("mri/T1.MGZ")));
        assert!(!is_mgz_file(Path::new("mri/T1.mgh")));
        assert!(!is_mgz_file(Path::new("mri/T1.nii.gz")));
        assert!(!is_mgz_file(&PathBuf::new()));
    }

    #[test]
    fn test_header_tags() {
        let header = VolumeHeader::new(
            Matrix4::identity(),
            Matrix4::identity(),
            SourceFormat::Mgz,
            [256, 256, 256],
            [1.0, 1.0, 1.0],
        );
        assert_eq!(header.affine.space_to(), Space::Ras);
        assert_eq!(header.tkr_affine.space_to(), Space::RasTkr);
        assert_eq!(header.tkr_affine.source_format(), Some(SourceFormat::Mgz));
    }

    #[test]
    fn test_unsupported_extension() {
        let reader = FileVolumeReader::new();
        assert!(reader.read_header(Path::new("volume.img")).is_err());
        assert!(!reader.exists(Path::new("/definitely/not/here.mgz")));
    }
}
