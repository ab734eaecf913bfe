//! Spatial types: coordinate spaces, modalities and space-tagged points.
//!
//! All types are based on nalgebra for the underlying linear algebra.

pub mod space;
pub mod vector;

pub use space::{Modality, Space};
pub use vector::TaggedVector;
