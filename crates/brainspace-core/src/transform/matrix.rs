//! Space- and modality-tagged 4×4 affine matrices.
//!
//! A `TaggedMatrix` maps a homogeneous point tagged `(space_from,
//! modality_from)` to one tagged `(space_to, modality_to)`. Every algebraic
//! operation returns a new value and checks that the tags chain.

use std::fmt;

use nalgebra::Matrix4;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use super::provenance::{Provenance, SourceFormat};
use crate::error::{Result, TransformError};
use crate::spatial::{Modality, Space};

/// Memory order of a flat matrix buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixLayout {
    #[default]
    RowMajor,
    ColumnMajor,
}

/// A 4×4 affine transform annotated with the spaces and modalities it
/// connects.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedMatrix {
    matrix: Matrix4<f64>,
    space_from: Space,
    space_to: Space,
    modality_from: Modality,
    modality_to: Modality,
    provenance: Provenance,
}

impl TaggedMatrix {
    /// Create a T1-anchored transform from a matrix.
    pub fn new(matrix: Matrix4<f64>, space_from: Space, space_to: Space) -> Self {
        Self {
            matrix,
            space_from,
            space_to,
            modality_from: Modality::t1(),
            modality_to: Modality::t1(),
            provenance: Provenance::default(),
        }
    }

    /// The identity, tagged as requested.
    ///
    /// Used when `space_from == space_to` to still carry modality metadata.
    pub fn identity(
        space_from: Space,
        space_to: Space,
        modality_from: Modality,
        modality_to: Modality,
    ) -> Self {
        Self::new(Matrix4::identity(), space_from, space_to)
            .with_modalities(modality_from, modality_to)
    }

    /// A T1 identity flagged as standing in for an unobserved transform.
    pub fn missing(space_from: Space, space_to: Space) -> Self {
        Self::new(Matrix4::identity(), space_from, space_to).with_provenance(Provenance::missing())
    }

    /// Create a T1-anchored transform from row arrays.
    pub fn from_rows(rows: [[f64; 4]; 4], space_from: Space, space_to: Space) -> Self {
        let mut matrix = Matrix4::zeros();
        for (i, row) in rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                matrix[(i, j)] = *value;
            }
        }
        Self::new(matrix, space_from, space_to)
    }

    /// Create a T1-anchored transform from a flat 12- or 16-element buffer.
    ///
    /// A 12-element buffer holds the upper 3×4 block; the `[0, 0, 0, 1]`
    /// bottom row is appended.
    pub fn from_buffer(
        buffer: &[f64],
        layout: MatrixLayout,
        space_from: Space,
        space_to: Space,
    ) -> Result<Self> {
        let rows = match buffer.len() {
            12 => 3,
            16 => 4,
            n => return Err(TransformError::InvalidBuffer(n)),
        };
        let mut matrix = Matrix4::identity();
        for i in 0..rows {
            for j in 0..4 {
                matrix[(i, j)] = match layout {
                    MatrixLayout::RowMajor => buffer[i * 4 + j],
                    MatrixLayout::ColumnMajor => buffer[j * rows + i],
                };
            }
        }
        Ok(Self::new(matrix, space_from, space_to))
    }

    /// Replace the modality tags.
    pub fn with_modalities(mut self, modality_from: Modality, modality_to: Modality) -> Self {
        self.modality_from = modality_from;
        self.modality_to = modality_to;
        self
    }

    /// Replace the provenance record.
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Record the header format this transform was read from.
    pub fn with_source_format(mut self, format: SourceFormat) -> Self {
        self.provenance.source_format = Some(format);
        self
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn space_from(&self) -> Space {
        self.space_from
    }

    pub fn space_to(&self) -> Space {
        self.space_to
    }

    pub fn modality_from(&self) -> &Modality {
        &self.modality_from
    }

    pub fn modality_to(&self) -> &Modality {
        &self.modality_to
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Whether this transform is a placeholder for an unobserved one.
    pub fn is_missing(&self) -> bool {
        self.provenance.missing
    }

    pub fn source_format(&self) -> Option<SourceFormat> {
        self.provenance.source_format
    }

    /// Apply `right` first, then `self`.
    ///
    /// Fails unless `self.space_from == right.space_to` and
    /// `self.modality_from == right.modality_to`.
    pub fn compose(&self, right: &TaggedMatrix) -> Result<TaggedMatrix> {
        if self.modality_from != right.modality_to || self.space_from != right.space_to {
            return Err(TransformError::IncompatibleTransform {
                left: self.describe(),
                right: right.describe(),
            });
        }
        Ok(TaggedMatrix {
            matrix: self.matrix * right.matrix,
            space_from: right.space_from,
            space_to: self.space_to,
            modality_from: right.modality_from.clone(),
            modality_to: self.modality_to.clone(),
            provenance: Provenance::derived(&self.provenance, &right.provenance),
        })
    }

    /// Matrix inverse with both tag pairs swapped.
    pub fn inverse(&self) -> Result<TaggedMatrix> {
        let inverted = self
            .matrix
            .try_inverse()
            .ok_or_else(|| TransformError::singular(self.describe()))?;
        Ok(TaggedMatrix {
            matrix: inverted,
            space_from: self.space_to,
            space_to: self.space_from,
            modality_from: self.modality_to.clone(),
            modality_to: self.modality_from.clone(),
            provenance: Provenance {
                missing: self.provenance.missing,
                source_format: None,
            },
        })
    }

    fn check_same_tags(&self, other: &TaggedMatrix) -> Result<()> {
        if self.space_from != other.space_from
            || self.space_to != other.space_to
            || self.modality_from != other.modality_from
            || self.modality_to != other.modality_to
        {
            return Err(TransformError::IncompatibleTransform {
                left: self.describe(),
                right: other.describe(),
            });
        }
        Ok(())
    }

    /// Element-wise sum; all four tags must match.
    pub fn add(&self, other: &TaggedMatrix) -> Result<TaggedMatrix> {
        self.check_same_tags(other)?;
        Ok(self.with_matrix(self.matrix + other.matrix))
    }

    /// Element-wise difference; all four tags must match.
    pub fn sub(&self, other: &TaggedMatrix) -> Result<TaggedMatrix> {
        self.check_same_tags(other)?;
        Ok(self.with_matrix(self.matrix - other.matrix))
    }

    fn with_matrix(&self, matrix: Matrix4<f64>) -> TaggedMatrix {
        TaggedMatrix {
            matrix,
            space_from: self.space_from,
            space_to: self.space_to,
            modality_from: self.modality_from.clone(),
            modality_to: self.modality_to.clone(),
            provenance: Provenance::default(),
        }
    }

    /// Coefficients flattened in row-major order.
    pub fn to_row_major(&self) -> [f64; 16] {
        let mut out = [0.0; 16];
        for i in 0..4 {
            for j in 0..4 {
                out[i * 4 + j] = self.matrix[(i, j)];
            }
        }
        out
    }

    /// Coefficients as row arrays.
    pub fn rows(&self) -> [[f64; 4]; 4] {
        let mut out = [[0.0; 4]; 4];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = self.matrix[(i, j)];
            }
        }
        out
    }

    /// Whether the coefficients agree within `tol` (tags are ignored).
    pub fn approx_eq(&self, other: &TaggedMatrix, tol: f64) -> bool {
        self.matrix
            .iter()
            .zip(other.matrix.iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }

    /// Whether the matrix is the identity within `tol`.
    pub fn is_identity(&self, tol: f64) -> bool {
        (self.matrix - Matrix4::identity()).iter().all(|d| d.abs() <= tol)
    }

    fn describe(&self) -> String {
        format!(
            "{}.{} -> {}.{}",
            self.modality_from, self.space_from, self.modality_to, self.space_to
        )
    }
}

impl std::ops::Neg for &TaggedMatrix {
    type Output = TaggedMatrix;

    fn neg(self) -> Self::Output {
        self.with_matrix(-self.matrix)
    }
}

impl std::ops::Index<(usize, usize)> for TaggedMatrix {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.matrix[index]
    }
}

impl fmt::Display for TaggedMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TaggedMatrix ({}):", self.describe())?;
        for row in self.rows() {
            writeln!(f, "  [{:>12.6} {:>12.6} {:>12.6} {:>12.6}]", row[0], row[1], row[2], row[3])?;
        }
        Ok(())
    }
}

/// Serialized as the 16 coefficients in row-major order.
impl Serialize for TaggedMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(16))?;
        for value in self.to_row_major() {
            seq.serialize_element(&value)?;
        }
        seq.end()
    }
}

/// `left ∘ right`: apply `right` first.
pub fn compose(left: &TaggedMatrix, right: &TaggedMatrix) -> Result<TaggedMatrix> {
    left.compose(right)
}
