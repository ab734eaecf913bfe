//! Space-tagged 3D points.
//!
//! A `TaggedVector` stores a homogeneous 4-vector (w = 1) together with the
//! coordinate space it is expressed in. Binary operations require both
//! operands to share a space.

use nalgebra::{Vector3, Vector4};

use super::Space;
use crate::error::{Result, TransformError};
use crate::transform::TaggedMatrix;

/// Coordinate emitted for points that cannot be rendered.
pub const FAR_AWAY: f64 = 9999.0;

/// A 3D point tagged with its coordinate space.
///
/// All-`NaN` coordinates represent an absent point; `length()` is then `NaN`
/// and the point must be treated as invalid rather than as the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaggedVector {
    xyz: Vector4<f64>,
    space: Space,
}

impl TaggedVector {
    /// Create a point from coordinates.
    pub fn new(x: f64, y: f64, z: f64, space: Space) -> Self {
        Self {
            xyz: Vector4::new(x, y, z, 1.0),
            space,
        }
    }

    /// Create an absent point (all coordinates `NaN`).
    pub fn missing(space: Space) -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN, space)
    }

    /// Create a point at the origin.
    pub fn origin(space: Space) -> Self {
        Self::new(0.0, 0.0, 0.0, space)
    }

    /// Create a point from a slice of 3 or 4 components (the 4th is ignored).
    pub fn from_slice(components: &[f64], space: Space) -> Result<Self> {
        match components.len() {
            3 | 4 => Ok(Self::new(components[0], components[1], components[2], space)),
            n => Err(TransformError::InvalidBuffer(n)),
        }
    }

    /// Create a point from optional components; any absent component makes
    /// the whole point absent.
    pub fn from_optional(x: Option<f64>, y: Option<f64>, z: Option<f64>, space: Space) -> Self {
        match (x, y, z) {
            (Some(x), Some(y), Some(z)) => Self::new(x, y, z, space),
            _ => Self::missing(space),
        }
    }

    pub fn x(&self) -> f64 {
        self.xyz[0]
    }

    pub fn y(&self) -> f64 {
        self.xyz[1]
    }

    pub fn z(&self) -> f64 {
        self.xyz[2]
    }

    /// The space this point is expressed in.
    pub fn space(&self) -> Space {
        self.space
    }

    /// The cartesian components.
    pub fn coords(&self) -> Vector3<f64> {
        self.xyz.xyz()
    }

    /// The homogeneous components.
    pub fn homogeneous(&self) -> &Vector4<f64> {
        &self.xyz
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.xyz[0], self.xyz[1], self.xyz[2]]
    }

    /// Export form: the coordinates, or `[9999, 9999, 9999]` when the length
    /// is not finite.
    pub fn to_export_array(&self) -> [f64; 3] {
        if self.length().is_finite() {
            self.to_array()
        } else {
            [FAR_AWAY; 3]
        }
    }

    /// Euclidean length; `NaN` for absent points.
    pub fn length(&self) -> f64 {
        self.coords().norm()
    }

    /// Whether every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.coords().iter().all(|c| c.is_finite())
    }

    /// Return a copy re-tagged to another space without changing coordinates.
    pub fn with_space(mut self, space: Space) -> Self {
        self.space = space;
        self
    }

    fn check_space(&self, other: &Self) -> Result<()> {
        if self.space != other.space {
            return Err(TransformError::SpaceMismatch {
                expected: self.space,
                actual: other.space,
            });
        }
        Ok(())
    }

    fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Result<Self> {
        self.check_space(other)?;
        Ok(Self::new(
            f(self.x(), other.x()),
            f(self.y(), other.y()),
            f(self.z(), other.z()),
            self.space,
        ))
    }

    /// Component-wise sum.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Component-wise difference.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Component-wise product.
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Component-wise quotient.
    pub fn div(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a / b)
    }

    pub fn dot(&self, other: &Self) -> Result<f64> {
        self.check_space(other)?;
        Ok(self.coords().dot(&other.coords()))
    }

    pub fn distance_to(&self, other: &Self) -> Result<f64> {
        self.distance_to_squared(other).map(f64::sqrt)
    }

    pub fn distance_to_squared(&self, other: &Self) -> Result<f64> {
        self.check_space(other)?;
        Ok((self.coords() - other.coords()).norm_squared())
    }

    /// Scale to unit length; a zero-length point is returned unchanged.
    pub fn normalize(&self) -> Self {
        let l = self.length();
        if l == 0.0 {
            return *self;
        }
        self.scale(1.0 / l)
    }

    /// Multiply every component by a scalar.
    pub fn scale(&self, scalar: f64) -> Self {
        Self::new(self.x() * scalar, self.y() * scalar, self.z() * scalar, self.space)
    }

    /// Apply an affine transform; the point must be in the matrix's source
    /// space and the result is tagged with its target space.
    pub fn apply(&self, transform: &TaggedMatrix) -> Result<Self> {
        if self.space != transform.space_from() {
            return Err(TransformError::SpaceMismatch {
                expected: transform.space_from(),
                actual: self.space,
            });
        }
        let mapped = transform.matrix() * self.xyz;
        Ok(Self::new(mapped[0], mapped[1], mapped[2], transform.space_to()))
    }
}

impl std::ops::Index<usize> for TaggedVector {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        assert!(index < 3, "TaggedVector index out of range: {index}");
        &self.xyz[index]
    }
}

impl std::ops::Neg for TaggedVector {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x(), -self.y(), -self.z(), self.space)
    }
}

impl std::fmt::Display for TaggedVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TaggedVector({}, {}, {}) [{}]", self.x(), self.y(), self.z(), self.space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_creation() {
        let v = TaggedVector::new(1.0, 2.0, 3.0, Space::Ras);
        assert_eq!(v[0], 1.0);
        assert_eq!(v[1], 2.0);
        assert_eq!(v[2], 3.0);
        assert_eq!(v.homogeneous()[3], 1.0);
        assert_eq!(v.space(), Space::Ras);
    }

    #[test]
    fn test_vector_from_slice() {
        let v = TaggedVector::from_slice(&[1.0, 2.0, 3.0, 7.0], Space::Voxel).unwrap();
        assert_eq!(v.to_array(), [1.0, 2.0, 3.0]);
        assert_eq!(v.homogeneous()[3], 1.0);
        assert!(matches!(
            TaggedVector::from_slice(&[1.0, 2.0], Space::Voxel),
            Err(TransformError::InvalidBuffer(2))
        ));
    }

    #[test]
    fn test_missing_vector_length_is_nan() {
        let v = TaggedVector::missing(Space::Ras);
        assert!(v.length().is_nan());
        assert!(!v.is_finite());
        assert_eq!(v.to_export_array(), [FAR_AWAY; 3]);
    }

    #[test]
    fn test_from_optional_partial_is_missing() {
        let v = TaggedVector::from_optional(Some(1.0), None, Some(2.0), Space::Ras);
        assert!(v.length().is_nan());
    }

    #[test]
    fn test_vector_arithmetic() {
        let v1 = TaggedVector::new(1.0, 2.0, 3.0, Space::Ras);
        let v2 = TaggedVector::new(4.0, 5.0, 6.0, Space::Ras);

        assert_eq!(v1.add(&v2).unwrap().to_array(), [5.0, 7.0, 9.0]);
        assert_eq!(v2.sub(&v1).unwrap().to_array(), [3.0, 3.0, 3.0]);
        assert_eq!(v1.mul(&v2).unwrap().to_array(), [4.0, 10.0, 18.0]);
        assert_eq!(v2.div(&v1).unwrap().to_array(), [4.0, 2.5, 2.0]);
        assert_eq!(v1.dot(&v2).unwrap(), 32.0);
        assert_eq!(v1.scale(2.0).to_array(), [2.0, 4.0, 6.0]);
        assert_eq!((-v1).to_array(), [-1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_vector_space_mismatch() {
        let v1 = TaggedVector::new(1.0, 2.0, 3.0, Space::Ras);
        let v2 = TaggedVector::new(1.0, 2.0, 3.0, Space::RasTkr);
        assert!(matches!(v1.add(&v2), Err(TransformError::SpaceMismatch { .. })));
        assert!(v1.distance_to(&v2).is_err());
        assert!(v1.dot(&v2).is_err());
    }

    #[test]
    fn test_distance() {
        let v1 = TaggedVector::new(0.0, 0.0, 0.0, Space::Mni305);
        let v2 = TaggedVector::new(3.0, 4.0, 0.0, Space::Mni305);
        assert_eq!(v1.distance_to(&v2).unwrap(), 5.0);
        assert_eq!(v1.distance_to_squared(&v2).unwrap(), 25.0);
    }

    #[test]
    fn test_normalize() {
        let v = TaggedVector::new(3.0, 0.0, 4.0, Space::Ras).normalize();
        assert!((v.length() - 1.0).abs() < 1e-12);
        let zero = TaggedVector::origin(Space::Ras).normalize();
        assert_eq!(zero.to_array(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_apply_retags() {
        let m = TaggedMatrix::from_rows(
            [
                [1.0, 0.0, 0.0, 10.0],
                [0.0, 1.0, 0.0, 20.0],
                [0.0, 0.0, 1.0, 30.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            Space::Voxel,
            Space::Ras,
        );
        let v = TaggedVector::new(1.0, 1.0, 1.0, Space::Voxel);
        let mapped = v.apply(&m).unwrap();
        assert_eq!(mapped.space(), Space::Ras);
        assert_eq!(mapped.to_array(), [11.0, 21.0, 31.0]);

        let wrong = TaggedVector::new(1.0, 1.0, 1.0, Space::Ras);
        assert!(wrong.apply(&m).is_err());
    }
}
