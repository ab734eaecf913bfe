use anyhow::{Context, Result};
use brainspace_core::transform::SourceFormat;
use nalgebra::Matrix4;
use nifti::NiftiHeader;
use std::path::Path;

use crate::volume::VolumeHeader;

/// Read the geometry of a NIfTI file (`.nii` or `.nii.gz`).
pub fn read_nifti_header<P: AsRef<Path>>(path: P) -> Result<VolumeHeader> {
    let path = path.as_ref();
    let header = NiftiHeader::from_file(path)
        .with_context(|| format!("Failed to read NIfTI header: {}", path.display()))?;

    let shape = [
        (header.dim[1] as usize).max(1),
        (header.dim[2] as usize).max(1),
        (header.dim[3] as usize).max(1),
    ];
    let zooms = [
        header.pixdim[1] as f64,
        header.pixdim[2] as f64,
        header.pixdim[3] as f64,
    ];

    Ok(VolumeHeader::new(
        affine_from_header(&header),
        nifti_base_affine(shape, zooms),
        SourceFormat::Nii,
        shape,
        zooms,
    ))
}

/// Voxel → RAS affine: sform, else qform, else pixdim scaling.
pub fn affine_from_header(header: &NiftiHeader) -> Matrix4<f64> {
    let rows = if header.sform_code > 0 {
        [
            header.srow_x,
            header.srow_y,
            header.srow_z,
            [0.0, 0.0, 0.0, 1.0],
        ]
    } else if header.qform_code > 0 {
        // Quaternion form, see the NIfTI-1 standard
        let b = header.quatern_b;
        let c = header.quatern_c;
        let d = header.quatern_d;
        let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();

        let qfac = if header.pixdim[0] == 0.0 { 1.0 } else { header.pixdim[0] };

        let r11 = a * a + b * b - c * c - d * d;
        let r12 = 2.0 * b * c - 2.0 * a * d;
        let r13 = 2.0 * b * d + 2.0 * a * c;

        let r21 = 2.0 * b * c + 2.0 * a * d;
        let r22 = a * a + c * c - b * b - d * d;
        let r23 = 2.0 * c * d - 2.0 * a * b;

        let r31 = 2.0 * b * d - 2.0 * a * c;
        let r32 = 2.0 * c * d + 2.0 * a * b;
        let r33 = a * a + d * d - c * c - b * b;

        let dx = header.pixdim[1];
        let dy = header.pixdim[2];
        let dz = header.pixdim[3] * qfac;

        [
            [r11 * dx, r12 * dy, r13 * dz, header.quatern_x],
            [r21 * dx, r22 * dy, r23 * dz, header.quatern_y],
            [r31 * dx, r32 * dy, r33 * dz, header.quatern_z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    } else {
        let dx = header.pixdim[1];
        let dy = header.pixdim[2];
        let dz = header.pixdim[3];
        [
            [dx, 0.0, 0.0, 0.0],
            [0.0, dy, 0.0, 0.0],
            [0.0, 0.0, dz, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    };

    Matrix4::from_fn(|i, j| rows[i][j] as f64)
}

/// Voxel → tkrRAS for NIfTI volumes: `diag(-zx, zy, zz)` centred on the
/// middle of the grid, x flipped.
pub fn nifti_base_affine(shape: [usize; 3], zooms: [f64; 3]) -> Matrix4<f64> {
    let signed = [-zooms[0], zooms[1], zooms[2]];
    let mut m = Matrix4::identity();
    for i in 0..3 {
        let origin = (shape[i] as f64 - 1.0) / 2.0;
        m[(i, i)] = signed[i];
        m[(i, 3)] = -origin * signed[i];
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_affine() {
        let m = nifti_base_affine([256, 256, 256], [1.0, 1.0, 1.0]);
        assert_eq!(m[(0, 0)], -1.0);
        assert_eq!(m[(0, 3)], 127.5);
        assert_eq!(m[(1, 1)], 1.0);
        assert_eq!(m[(1, 3)], -127.5);
        assert_eq!(m[(2, 3)], -127.5);
        assert_eq!(m[(3, 3)], 1.0);
    }

    #[test]
    fn test_base_affine_anisotropic() {
        let m = nifti_base_affine([11, 21, 5], [2.0, 0.5, 3.0]);
        assert_eq!(m[(0, 3)], 10.0);
        assert_eq!(m[(1, 3)], -5.0);
        assert_eq!(m[(2, 3)], -6.0);
    }

    #[test]
    fn test_affine_sform_preferred() {
        let mut header = NiftiHeader::default();
        header.sform_code = 1;
        header.qform_code = 1;
        header.srow_x = [-1.0, 0.0, 0.0, 90.0];
        header.srow_y = [0.0, 1.0, 0.0, -126.0];
        header.srow_z = [0.0, 0.0, 1.0, -72.0];
        let m = affine_from_header(&header);
        assert_eq!(m[(0, 0)], -1.0);
        assert_eq!(m[(0, 3)], 90.0);
        assert_eq!(m[(2, 3)], -72.0);
        assert_eq!(m[(3, 3)], 1.0);
    }

    #[test]
    fn test_affine_qform_identity_rotation() {
        let mut header = NiftiHeader::default();
        header.sform_code = 0;
        header.qform_code = 1;
        header.quatern_b = 0.0;
        header.quatern_c = 0.0;
        header.quatern_d = 0.0;
        header.pixdim = [1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0];
        header.quatern_x = 10.0;
        header.quatern_y = 20.0;
        header.quatern_z = 30.0;
        let m = affine_from_header(&header);
        assert_eq!(m[(0, 0)], 2.0);
        assert_eq!(m[(1, 1)], 3.0);
        assert_eq!(m[(2, 2)], 4.0);
        assert_eq!(m[(1, 3)], 20.0);
    }

    #[test]
    fn test_affine_pixdim_fallback() {
        let mut header = NiftiHeader::default();
        header.sform_code = 0;
        header.qform_code = 0;
        header.pixdim = [1.0, 0.5, 0.5, 2.0, 0.0, 0.0, 0.0, 0.0];
        let m = affine_from_header(&header);
        assert_eq!(m[(0, 0)], 0.5);
        assert_eq!(m[(2, 2)], 2.0);
        assert_eq!(m[(0, 3)], 0.0);
    }
}
