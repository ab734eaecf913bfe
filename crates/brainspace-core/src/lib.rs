pub mod config;
pub mod error;
pub mod spatial;
pub mod transform;

pub use config::BrainspaceConfig;
pub use error::{Result, TransformError};
pub use spatial::{Modality, Space, TaggedVector};
pub use transform::{
    MatrixLayout, Provenance, SourceFormat, TaggedMatrix, TransformGraph, UpdateDecision,
    UpdateLevel,
};
