//! Per-subject transform graph.
//!
//! Holds the three independently observed transforms (voxel→RAS,
//! voxel→tkrRAS, RAS→MNI305) and derives every other pairwise transform
//! through scanner RAS, plus the fixed MNI305→MNI152 constant. Unset base
//! transforms are served as identities flagged missing.

use tracing::debug;

use super::matrix::TaggedMatrix;
use super::policy::{self, BaseState, UpdateDecision, UpdateLevel};
use crate::config::TransformConfig;
use crate::error::{Result, TransformError};
use crate::spatial::{Modality, Space};

/// Base and derived transforms of one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformGraph {
    vox2ras: Option<TaggedMatrix>,
    vox2ras_tkr: Option<TaggedMatrix>,
    ras2mni305: Option<TaggedMatrix>,
    mni305_to_mni152: TaggedMatrix,
}

impl Default for TransformGraph {
    fn default() -> Self {
        Self::from_config(&TransformConfig::default())
    }
}

impl TransformGraph {
    /// Create an empty graph with the given MNI305→MNI152 constant.
    pub fn new(mni305_to_mni152: TaggedMatrix) -> Result<Self> {
        expect_spaces(&mni305_to_mni152, Space::Mni305, Space::Mni152)?;
        Ok(Self {
            vox2ras: None,
            vox2ras_tkr: None,
            ras2mni305: None,
            mni305_to_mni152,
        })
    }

    /// Create an empty graph from configuration.
    pub fn from_config(config: &TransformConfig) -> Self {
        Self {
            vox2ras: None,
            vox2ras_tkr: None,
            ras2mni305: None,
            mni305_to_mni152: config.mni305_to_mni152(),
        }
    }

    pub fn set_vox2ras(&mut self, transform: TaggedMatrix) -> Result<()> {
        expect_spaces(&transform, Space::Voxel, Space::Ras)?;
        self.vox2ras = Some(transform);
        Ok(())
    }

    pub fn set_vox2ras_tkr(&mut self, transform: TaggedMatrix) -> Result<()> {
        expect_spaces(&transform, Space::Voxel, Space::RasTkr)?;
        self.vox2ras_tkr = Some(transform);
        Ok(())
    }

    pub fn set_ras2mni305(&mut self, transform: TaggedMatrix) -> Result<()> {
        expect_spaces(&transform, Space::Ras, Space::Mni305)?;
        self.ras2mni305 = Some(transform);
        Ok(())
    }

    /// Voxel → scanner RAS.
    pub fn vox2ras(&self) -> TaggedMatrix {
        self.vox2ras
            .clone()
            .unwrap_or_else(|| TaggedMatrix::missing(Space::Voxel, Space::Ras))
    }

    /// Voxel → tkrRAS.
    pub fn vox2ras_tkr(&self) -> TaggedMatrix {
        self.vox2ras_tkr
            .clone()
            .unwrap_or_else(|| TaggedMatrix::missing(Space::Voxel, Space::RasTkr))
    }

    /// Scanner RAS → MNI305 (talairach registration).
    pub fn ras2mni305(&self) -> TaggedMatrix {
        self.ras2mni305
            .clone()
            .unwrap_or_else(|| TaggedMatrix::missing(Space::Ras, Space::Mni305))
    }

    pub fn mni305_to_mni152(&self) -> &TaggedMatrix {
        &self.mni305_to_mni152
    }

    /// `vox2ras_tkr ∘ vox2ras⁻¹`
    pub fn ras2ras_tkr(&self) -> Result<TaggedMatrix> {
        self.vox2ras_tkr().compose(&self.vox2ras().inverse()?)
    }

    /// `mni305_to_mni152 ∘ ras2mni305`
    pub fn ras2mni152(&self) -> Result<TaggedMatrix> {
        self.mni305_to_mni152.compose(&self.ras2mni305())
    }

    /// `ras2mni305 ∘ vox2ras ∘ vox2ras_tkr⁻¹`
    pub fn ras_tkr2mni305(&self) -> Result<TaggedMatrix> {
        self.ras2mni305()
            .compose(&self.vox2ras())?
            .compose(&self.vox2ras_tkr().inverse()?)
    }

    /// `mni305_to_mni152 ∘ ras_tkr2mni305`
    pub fn ras_tkr2mni152(&self) -> Result<TaggedMatrix> {
        self.mni305_to_mni152.compose(&self.ras_tkr2mni305()?)
    }

    /// Scanner RAS → `space`.
    fn from_ras(&self, space: Space) -> Result<TaggedMatrix> {
        match space {
            Space::Ras => Ok(TaggedMatrix::identity(
                Space::Ras,
                Space::Ras,
                Modality::t1(),
                Modality::t1(),
            )),
            Space::Voxel => self.vox2ras().inverse(),
            Space::RasTkr => self.ras2ras_tkr(),
            Space::Mni305 => Ok(self.ras2mni305()),
            Space::Mni152 => self.ras2mni152(),
        }
    }

    /// `space` → scanner RAS.
    fn to_ras(&self, space: Space) -> Result<TaggedMatrix> {
        match space {
            Space::Voxel => Ok(self.vox2ras()),
            other => self.from_ras(other)?.inverse(),
        }
    }

    /// Transform between any two supported spaces, routed through scanner RAS.
    pub fn get_transform(&self, space_from: Space, space_to: Space) -> Result<TaggedMatrix> {
        if space_from == space_to {
            return Ok(TaggedMatrix::identity(
                space_from,
                space_to,
                Modality::t1(),
                Modality::t1(),
            ));
        }
        let to_hub = self.to_ras(space_from)?;
        if space_to == Space::Ras {
            return Ok(to_hub);
        }
        self.from_ras(space_to)?.compose(&to_hub)
    }

    /// String front-end for [`get_transform`](Self::get_transform).
    pub fn get_transform_str(&self, space_from: &str, space_to: &str) -> Result<TaggedMatrix> {
        self.get_transform(space_from.parse()?, space_to.parse()?)
    }

    /// Re-express `transform` so it maps `space_from` to `space_to`.
    ///
    /// T1-anchored sides are re-anchored through the graph; a side carrying
    /// any other modality must already be expressed in the requested space.
    pub fn set_transform_space(
        &self,
        transform: &TaggedMatrix,
        space_from: Space,
        space_to: Space,
    ) -> Result<TaggedMatrix> {
        if !transform.modality_from().is_identity() && transform.space_from() != space_from {
            return Err(TransformError::ModalityMismatch {
                modality: transform.modality_from().clone(),
                actual: transform.space_from(),
                requested: space_from,
            });
        }
        if !transform.modality_to().is_identity() && transform.space_to() != space_to {
            return Err(TransformError::ModalityMismatch {
                modality: transform.modality_to().clone(),
                actual: transform.space_to(),
                requested: space_to,
            });
        }
        let mut result = transform.clone();
        if transform.modality_from().is_identity() {
            result = result.compose(&self.get_transform(space_from, transform.space_from())?)?;
        }
        if transform.modality_to().is_identity() {
            result = self.get_transform(transform.space_to(), space_to)?.compose(&result)?;
        }
        Ok(result)
    }

    fn base_state(&self) -> BaseState {
        BaseState {
            has_vox2ras: self.vox2ras.is_some(),
            vox2ras_tkr_format: self.vox2ras_tkr.as_ref().map(|m| m.source_format()),
        }
    }

    /// Decide which base transforms a candidate volume replaces.
    /// `candidate_mgz` marks a `*.mgz` file.
    pub fn plan_update(&self, candidate_mgz: bool, level: UpdateLevel) -> UpdateDecision {
        policy::plan(self.base_state(), candidate_mgz, level)
    }

    /// Store the matrices selected by `decision`.
    pub fn apply_update(
        &mut self,
        vox2ras: TaggedMatrix,
        vox2ras_tkr: TaggedMatrix,
        decision: UpdateDecision,
    ) -> Result<()> {
        if decision.vox2ras {
            debug!("Updating vox2ras ({:?})", vox2ras.source_format());
            self.set_vox2ras(vox2ras)?;
        }
        if decision.vox2ras_tkr {
            debug!("Updating vox2ras_tkr ({:?})", vox2ras_tkr.source_format());
            self.set_vox2ras_tkr(vox2ras_tkr)?;
        }
        Ok(())
    }

    /// Names of base transforms that are still unset.
    pub fn missing_transforms(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.vox2ras.is_none() {
            missing.push("vox2ras");
        }
        if self.vox2ras_tkr.is_none() {
            missing.push("vox2ras_tkr");
        }
        if self.ras2mni305.is_none() {
            missing.push("ras2mni305");
        }
        missing
    }
}

fn expect_spaces(transform: &TaggedMatrix, from: Space, to: Space) -> Result<()> {
    if transform.space_from() != from {
        return Err(TransformError::SpaceMismatch {
            expected: from,
            actual: transform.space_from(),
        });
    }
    if transform.space_to() != to {
        return Err(TransformError::SpaceMismatch {
            expected: to,
            actual: transform.space_to(),
        });
    }
    Ok(())
}
