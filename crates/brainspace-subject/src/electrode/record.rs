//! Electrode contacts and their positions.

use std::collections::BTreeMap;

use serde::Serialize;

use brainspace_core::{Space, TaggedMatrix, TaggedVector, TransformGraph};

use super::hemisphere::Hemisphere;
use crate::error::{Result, SubjectError};
use crate::export::ElectrodeExport;
use crate::keyframe::Keyframe;

/// Position on the registration sphere, magnitude `radius` or the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SpherePosition([f64; 3]);

impl SpherePosition {
    /// Rescale `xyz` to length `radius`; shorter than `min_length` snaps to
    /// the origin and non-finite input gives `None`.
    pub fn from_xyz(xyz: [f64; 3], radius: f64, min_length: f64) -> Option<Self> {
        let length = xyz.iter().map(|c| c * c).sum::<f64>().sqrt();
        if !length.is_finite() {
            return None;
        }
        if length < min_length {
            return Some(Self([0.0; 3]));
        }
        Some(Self(xyz.map(|c| c / length * radius)))
    }

    pub fn to_array(&self) -> [f64; 3] {
        self.0
    }
}

/// Input for [`Subject::add_electrode_contact`](crate::Subject::add_electrode_contact).
#[derive(Debug, Clone, PartialEq)]
pub struct ElectrodeContact {
    pub number: u32,
    pub label: String,
    pub position: Option<TaggedVector>,
    /// MNI305 or MNI152 position.
    pub mni_position: Option<TaggedVector>,
    pub sphere_position: Option<SpherePosition>,
    /// Contact radius; the surface/depth default when `None`.
    pub radius: Option<f64>,
    pub is_surface: bool,
    pub hemisphere: Hemisphere,
}

impl ElectrodeContact {
    pub fn new(number: u32, label: impl Into<String>) -> Self {
        Self {
            number,
            label: label.into(),
            position: None,
            mni_position: None,
            sphere_position: None,
            radius: None,
            is_surface: false,
            hemisphere: Hemisphere::Auto,
        }
    }

    pub fn with_position(mut self, position: TaggedVector) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_mni_position(mut self, position: TaggedVector) -> Self {
        self.mni_position = Some(position);
        self
    }

    pub fn with_sphere_position(mut self, position: SpherePosition) -> Self {
        self.sphere_position = Some(position);
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_surface(mut self, is_surface: bool) -> Self {
        self.is_surface = is_surface;
        self
    }

    pub fn with_hemisphere(mut self, hemisphere: Hemisphere) -> Self {
        self.hemisphere = hemisphere;
        self
    }
}

/// A stored electrode contact.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectrodeRecord {
    pub(crate) number: u32,
    pub(crate) label: String,
    pub(crate) name: String,
    pub(crate) group_name: String,
    pub(crate) position: Option<TaggedVector>,
    pub(crate) mni_position: Option<TaggedVector>,
    pub(crate) sphere_position: Option<SpherePosition>,
    pub(crate) radius: f64,
    pub(crate) is_surface: bool,
    pub(crate) hemisphere: Hemisphere,
    pub(crate) layer: u8,
    pub(crate) keyframes: BTreeMap<String, Keyframe>,
}

impl ElectrodeRecord {
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Display name, `"{subject}, {number} - {label}"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Native position as given, in its own space.
    pub fn position(&self) -> Option<&TaggedVector> {
        self.position.as_ref()
    }

    /// Stored MNI305 position.
    pub fn mni_position(&self) -> Option<&TaggedVector> {
        self.mni_position.as_ref()
    }

    pub fn sphere_position(&self) -> Option<SpherePosition> {
        self.sphere_position
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn is_surface(&self) -> bool {
        self.is_surface
    }

    pub fn hemisphere(&self) -> Hemisphere {
        self.hemisphere
    }

    /// Position in `space`.
    ///
    /// Template spaces use the stored MNI305 position when present. Without
    /// any position the result is an absent point.
    pub fn get_position(&self, graph: &TransformGraph, space: Space) -> Result<TaggedVector> {
        if space.is_template() {
            if let Some(mni) = &self.mni_position {
                return Ok(mni.apply(&graph.get_transform(Space::Mni305, space)?)?);
            }
        }
        match &self.position {
            Some(p) => Ok(p.apply(&graph.get_transform(p.space(), space)?)?),
            None => Ok(TaggedVector::missing(space)),
        }
    }

    /// Position in `space` after the electrode group transform.
    pub fn get_world_position(
        &self,
        graph: &TransformGraph,
        space: Space,
        group_transform: &TaggedMatrix,
    ) -> Result<TaggedVector> {
        let position = self.get_position(graph, space)?;
        if !position.is_finite() {
            return Ok(position);
        }
        let world = graph.set_transform_space(group_transform, space, space)?;
        Ok(position.apply(&world)?)
    }

    /// Store an MNI position; MNI152 input is converted to MNI305.
    pub fn set_mni_position(&mut self, graph: &TransformGraph, position: TaggedVector) -> Result<()> {
        self.mni_position = resolve_mni(graph, position)?;
        Ok(())
    }

    /// Add or replace the keyframe with the same name.
    pub fn set_keyframe(&mut self, keyframe: Keyframe) {
        self.keyframes.insert(keyframe.name().to_string(), keyframe);
    }

    pub fn keyframe(&self, name: &str) -> Option<&Keyframe> {
        self.keyframes.get(name)
    }

    pub fn keyframes(&self) -> impl Iterator<Item = &Keyframe> {
        self.keyframes.values()
    }

    pub fn clear_keyframes(&mut self) {
        self.keyframes.clear();
    }

    /// Export form with positions in tkrRAS and MNI305.
    pub fn to_export(&self, graph: &TransformGraph, group_transform: &TaggedMatrix) -> Result<ElectrodeExport> {
        let position = self.get_position(graph, Space::RasTkr)?;
        let mni305 = self.get_position(graph, Space::Mni305)?;
        Ok(ElectrodeExport {
            name: self.name.clone(),
            group_name: self.group_name.clone(),
            number: self.number,
            label: self.label.clone(),
            position: position.to_export_array(),
            mni305_position: mni305.to_export_array(),
            sphere_position: self.sphere_position.map(|s| s.to_array()).unwrap_or([0.0; 3]),
            radius: self.radius,
            width_segments: 10,
            height_segments: 6,
            is_electrode: true,
            is_surface_electrode: self.is_surface,
            sub_cortical: !self.is_surface,
            use_template: false,
            surface_type: "pial".to_string(),
            hemisphere: self.hemisphere,
            search_geoms: self.hemisphere,
            vertex_number: -1,
            layer: self.layer,
            keyframes: self
                .keyframes
                .iter()
                .map(|(name, kf)| (name.clone(), kf.to_export()))
                .collect(),
            transform: group_transform.to_row_major(),
        })
    }
}

/// Validate an MNI position and express it in MNI305; non-finite input
/// clears the position.
pub(crate) fn resolve_mni(graph: &TransformGraph, position: TaggedVector) -> Result<Option<TaggedVector>> {
    if !position.is_finite() {
        return Ok(None);
    }
    match position.space() {
        Space::Mni305 => Ok(Some(position)),
        Space::Mni152 => Ok(Some(position.apply(&graph.get_transform(Space::Mni152, Space::Mni305)?)?)),
        other => Err(SubjectError::invalid_position(format!(
            "MNI position must be in mni305 or mni152, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(position: Option<TaggedVector>) -> ElectrodeRecord {
        ElectrodeRecord {
            number: 1,
            label: "LA1".to_string(),
            name: "S01, 1 - LA1".to_string(),
            group_name: "Electrodes (S01)".to_string(),
            position,
            mni_position: None,
            sphere_position: None,
            radius: 1.0,
            is_surface: false,
            hemisphere: Hemisphere::Auto,
            layer: 1,
            keyframes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_sphere_position() {
        let s = SpherePosition::from_xyz([3.0, 0.0, 4.0], 100.0, 1e-3).unwrap();
        assert_eq!(s.to_array(), [60.0, 0.0, 80.0]);
        let s = SpherePosition::from_xyz([1e-4, 0.0, 0.0], 100.0, 1e-3).unwrap();
        assert_eq!(s.to_array(), [0.0; 3]);
        assert!(SpherePosition::from_xyz([f64::NAN, 0.0, 0.0], 100.0, 1e-3).is_none());
    }

    #[test]
    fn test_get_position_identity_graph() {
        let graph = TransformGraph::default();
        let rec = record(Some(TaggedVector::new(1.0, 2.0, 3.0, Space::Ras)));
        let tkr = rec.get_position(&graph, Space::RasTkr).unwrap();
        assert_eq!(tkr.space(), Space::RasTkr);
        assert!((tkr.x() - 1.0).abs() < 1e-12);
        let missing = record(None).get_position(&graph, Space::Ras).unwrap();
        assert!(missing.length().is_nan());
    }

    #[test]
    fn test_mni_position_preferred_for_templates() {
        let graph = TransformGraph::default();
        let mut rec = record(Some(TaggedVector::new(1.0, 2.0, 3.0, Space::Ras)));
        rec.set_mni_position(&graph, TaggedVector::new(10.0, 20.0, 30.0, Space::Mni305))
            .unwrap();
        let mni305 = rec.get_position(&graph, Space::Mni305).unwrap();
        assert_eq!(mni305.to_array(), [10.0, 20.0, 30.0]);
        let mni152 = rec.get_position(&graph, Space::Mni152).unwrap();
        assert_eq!(mni152.space(), Space::Mni152);
        assert!((mni152.x() - 10.3141).abs() < 1e-3);
    }

    #[test]
    fn test_set_mni_position_converts_mni152() {
        let graph = TransformGraph::default();
        let mut rec = record(None);
        let p152 = TaggedVector::new(10.0, 20.0, 30.0, Space::Mni152);
        rec.set_mni_position(&graph, p152).unwrap();
        let stored = rec.mni_position().unwrap();
        assert_eq!(stored.space(), Space::Mni305);
        let back = rec.get_position(&graph, Space::Mni152).unwrap();
        assert!(back.distance_to(&p152).unwrap() < 1e-9);

        let err = rec.set_mni_position(&graph, TaggedVector::new(1.0, 1.0, 1.0, Space::Ras));
        assert!(matches!(err, Err(SubjectError::InvalidPosition(_))));
    }

    #[test]
    fn test_world_position_applies_group_transform() {
        let graph = TransformGraph::default();
        let rec = record(Some(TaggedVector::new(1.0, 2.0, 3.0, Space::Ras)));
        let rows = [
            [1.0, 0.0, 0.0, 5.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let group = TaggedMatrix::from_rows(rows, Space::Ras, Space::Ras);
        let world = rec.get_world_position(&graph, Space::RasTkr, &group).unwrap();
        assert_eq!(world.space(), Space::RasTkr);
        assert!((world.x() - 6.0).abs() < 1e-12);
    }
}
