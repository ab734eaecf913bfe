//! Tagged affine transforms and the per-subject transform graph.

pub mod graph;
pub mod matrix;
pub mod policy;
pub mod provenance;

pub use graph::TransformGraph;
pub use matrix::{compose, MatrixLayout, TaggedMatrix};
pub use policy::{UpdateDecision, UpdateLevel};
pub use provenance::{Provenance, SourceFormat};
