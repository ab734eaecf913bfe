//! FreeSurfer MGH/MGZ header reader.
//!
//! The header is big-endian: version, width, height, depth, frames, type,
//! dof (all `i32`), then `goodRASFlag` (`i16`). When the flag is positive it
//! is followed by the voxel spacing, the three direction cosines and the
//! centre RAS (15 `f32`). `.mgz` files are gzip-compressed.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use brainspace_core::transform::SourceFormat;
use flate2::read::GzDecoder;
use nalgebra::{Matrix3, Matrix4, Vector3};

use crate::volume::VolumeHeader;

/// Raw MGH geometry fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MghGeometry {
    pub dims: [usize; 3],
    pub spacing: [f64; 3],
    /// Direction cosines of the column, row and slice axes, as columns.
    pub mdc: Matrix3<f64>,
    pub c_ras: Vector3<f64>,
    pub good_ras: bool,
}

impl Default for MghGeometry {
    /// Coronal (LIA) 256³ conformed geometry.
    fn default() -> Self {
        Self {
            dims: [256, 256, 256],
            spacing: [1.0, 1.0, 1.0],
            mdc: lia_cosines(),
            c_ras: Vector3::zeros(),
            good_ras: false,
        }
    }
}

fn lia_cosines() -> Matrix3<f64> {
    Matrix3::new(-1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, -1.0, 0.0)
}

impl MghGeometry {
    /// Voxel → scanner RAS.
    pub fn vox2ras(&self) -> Matrix4<f64> {
        let mdc_d = self.mdc * Matrix3::from_diagonal(&Vector3::from(self.spacing));
        let centre = Vector3::new(
            self.dims[0] as f64 / 2.0,
            self.dims[1] as f64 / 2.0,
            self.dims[2] as f64 / 2.0,
        );
        let p0 = self.c_ras - mdc_d * centre;
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&mdc_d);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&p0);
        m
    }

    /// Voxel → tkrRAS.
    pub fn vox2ras_tkr(&self) -> Matrix4<f64> {
        let [dx, dy, dz] = self.spacing;
        let [nx, ny, nz] = self.dims.map(|n| n as f64);
        Matrix4::new(
            -dx, 0.0, 0.0, nx * dx / 2.0,
            0.0, 0.0, dz, -nz * dz / 2.0,
            0.0, -dy, 0.0, ny * dy / 2.0,
            0.0, 0.0, 0.0, 1.0,
        )
    }
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_i16<R: Read>(reader: &mut R) -> Result<i16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(i16::from_be_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R) -> Result<f64> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_be_bytes(buf) as f64)
}

/// Parse an uncompressed MGH header stream.
pub fn parse_mgh_header<R: Read>(mut reader: R) -> Result<MghGeometry> {
    let version = read_i32(&mut reader).context("Truncated MGH header")?;
    if version != 1 {
        bail!("Unsupported MGH version: {}", version);
    }
    let mut dims = [0usize; 3];
    for dim in dims.iter_mut() {
        let n = read_i32(&mut reader).context("Truncated MGH header")?;
        if n <= 0 {
            bail!("Invalid MGH dimension: {}", n);
        }
        *dim = n as usize;
    }
    // frames, type, dof
    for _ in 0..3 {
        read_i32(&mut reader).context("Truncated MGH header")?;
    }
    let good_ras = read_i16(&mut reader).context("Truncated MGH header")? > 0;
    if !good_ras {
        return Ok(MghGeometry {
            dims,
            ..MghGeometry::default()
        });
    }

    let mut values = [0.0f64; 15];
    for value in values.iter_mut() {
        *value = read_f32(&mut reader).context("Truncated MGH geometry")?;
    }
    let spacing = [values[0], values[1], values[2]];
    let mdc = Matrix3::from_columns(&[
        Vector3::new(values[3], values[4], values[5]),
        Vector3::new(values[6], values[7], values[8]),
        Vector3::new(values[9], values[10], values[11]),
    ]);
    let c_ras = Vector3::new(values[12], values[13], values[14]);

    Ok(MghGeometry {
        dims,
        spacing,
        mdc,
        c_ras,
        good_ras,
    })
}

/// Read the geometry of an `.mgh` or `.mgz` file.
pub fn read_mgh_header<P: AsRef<Path>>(path: P) -> Result<VolumeHeader> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open MGH file: {}", path.display()))?;
    let compressed = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("mgz") || ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    let geometry = if compressed {
        parse_mgh_header(GzDecoder::new(BufReader::new(file)))
    } else {
        parse_mgh_header(BufReader::new(file))
    }
    .with_context(|| format!("Failed to read MGH header: {}", path.display()))?;

    Ok(VolumeHeader::new(
        geometry.vox2ras(),
        geometry.vox2ras_tkr(),
        SourceFormat::Mgz,
        geometry.dims,
        geometry.spacing,
    ))
}
