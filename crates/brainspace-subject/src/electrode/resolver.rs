//! Electrode table row resolution.
//!
//! Each row may carry several coordinate triples. The resolver walks ordered
//! strategy tables and keeps the first valid candidate for the native
//! position and, independently, for the MNI position.

use brainspace_core::config::ElectrodeConfig;
use brainspace_core::{Space, TaggedVector};
use brainspace_io::DataTable;
use tracing::{debug, warn};

use super::hemisphere::{Hemisphere, HemisphereClassifier};
use super::record::{ElectrodeContact, SpherePosition};
use crate::error::{Result, SubjectError};

/// Column holding the electrode number.
pub const ELECTRODE_COLUMN: &str = "Electrode";

/// A coordinate triple a table row may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateSource {
    /// `x, y, z` in the caller-declared space.
    Native,
    /// `Coord_x, Coord_y, Coord_z` in tkrRAS.
    Tkr,
    /// `T1R, T1A, T1S` in scanner RAS.
    T1,
    Mni305,
    Mni152,
}

impl CoordinateSource {
    pub fn columns(&self) -> [&'static str; 3] {
        match self {
            CoordinateSource::Native => ["x", "y", "z"],
            CoordinateSource::Tkr => ["Coord_x", "Coord_y", "Coord_z"],
            CoordinateSource::T1 => ["T1R", "T1A", "T1S"],
            CoordinateSource::Mni305 => ["MNI305_x", "MNI305_y", "MNI305_z"],
            CoordinateSource::Mni152 => ["MNI152_x", "MNI152_y", "MNI152_z"],
        }
    }

    /// Space of the triple; `native` for [`CoordinateSource::Native`].
    pub fn space(&self, native: Space) -> Space {
        match self {
            CoordinateSource::Native => native,
            CoordinateSource::Tkr => Space::RasTkr,
            CoordinateSource::T1 => Space::Ras,
            CoordinateSource::Mni305 => Space::Mni305,
            CoordinateSource::Mni152 => Space::Mni152,
        }
    }
}

/// Fallback order for the native position.
pub const NATIVE_PRIORITY: [CoordinateSource; 5] = [
    CoordinateSource::Native,
    CoordinateSource::Tkr,
    CoordinateSource::T1,
    CoordinateSource::Mni305,
    CoordinateSource::Mni152,
];

/// Fallback order for the MNI position.
pub const MNI_PRIORITY: [CoordinateSource; 2] = [CoordinateSource::Mni305, CoordinateSource::Mni152];

/// `finite(length) && length < max_length`; the origin is valid.
pub fn is_valid_position(position: &TaggedVector, max_length: f64) -> bool {
    let length = position.length();
    length.is_finite() && length < max_length
}

/// Candidate triples read from one row; absent columns give absent points.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateCoordinates {
    native: TaggedVector,
    tkr: TaggedVector,
    t1: TaggedVector,
    mni305: TaggedVector,
    mni152: TaggedVector,
}

impl CandidateCoordinates {
    pub fn from_row(table: &DataTable, row: usize, native_space: Space) -> Self {
        let read = |source: CoordinateSource| {
            let [x, y, z] = source.columns().map(|c| table.get_f64(row, c));
            TaggedVector::new(x, y, z, source.space(native_space))
        };
        Self {
            native: read(CoordinateSource::Native),
            tkr: read(CoordinateSource::Tkr),
            t1: read(CoordinateSource::T1),
            mni305: read(CoordinateSource::Mni305),
            mni152: read(CoordinateSource::Mni152),
        }
    }

    pub fn get(&self, source: CoordinateSource) -> &TaggedVector {
        match source {
            CoordinateSource::Native => &self.native,
            CoordinateSource::Tkr => &self.tkr,
            CoordinateSource::T1 => &self.t1,
            CoordinateSource::Mni305 => &self.mni305,
            CoordinateSource::Mni152 => &self.mni152,
        }
    }

    /// First valid candidate in `priority`.
    pub fn first_valid(&self, priority: &[CoordinateSource], max_length: f64) -> Option<(CoordinateSource, TaggedVector)> {
        priority
            .iter()
            .map(|&source| (source, *self.get(source)))
            .find(|(_, v)| is_valid_position(v, max_length))
    }
}

/// A resolved table row.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRow {
    pub contact: ElectrodeContact,
    /// Which triple supplied the native position.
    pub position_source: Option<CoordinateSource>,
}

/// Turns electrode table rows into contacts.
#[derive(Debug, Clone)]
pub struct ElectrodeCoordinateResolver {
    native_space: Space,
    config: ElectrodeConfig,
    hemispheres: HemisphereClassifier,
}

impl ElectrodeCoordinateResolver {
    /// `native_space` is the space of the `x, y, z` columns.
    pub fn new(native_space: Space, config: &ElectrodeConfig) -> Result<Self> {
        let hemispheres = HemisphereClassifier::new().map_err(anyhow::Error::from)?;
        Ok(Self {
            native_space,
            config: config.clone(),
            hemispheres,
        })
    }

    pub fn native_space(&self) -> Space {
        self.native_space
    }

    /// Native and MNI positions of a candidate set.
    pub fn resolve(
        &self,
        candidates: &CandidateCoordinates,
    ) -> (Option<(CoordinateSource, TaggedVector)>, Option<TaggedVector>) {
        let max = self.config.max_valid_length;
        let native = candidates.first_valid(&NATIVE_PRIORITY, max);
        let mni = candidates.first_valid(&MNI_PRIORITY, max).map(|(_, v)| v);
        (native, mni)
    }

    /// Resolve one table row.
    pub fn resolve_row(&self, table: &DataTable, row: usize) -> Result<ResolvedRow> {
        let number = parse_electrode_number(table, row)?;
        let label = match table.get_str(row, "Label") {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => format!("NoLabel{number}"),
        };
        let is_surface = table.get_bool(row, "SurfaceElectrode").unwrap_or(false);

        let candidates = CandidateCoordinates::from_row(table, row, self.native_space);
        let (native, mni) = self.resolve(&candidates);
        match &native {
            Some((source, v)) => debug!("Electrode {} resolved from {:?} ({})", number, source, v),
            None => warn!("Electrode {} (row {}) has no valid position", number, row),
        }

        let radius = table.get_f64(row, "Radius");
        let radius = if radius.is_finite() && radius > 0.0 {
            radius
        } else if is_surface {
            self.config.surface_radius
        } else {
            self.config.depth_radius
        };

        let sphere_position = if is_surface {
            let xyz = ["Sphere_x", "Sphere_y", "Sphere_z"].map(|c| table.get_f64(row, c));
            let length = xyz.iter().map(|c| c * c).sum::<f64>().sqrt();
            if length < self.config.max_valid_length {
                SpherePosition::from_xyz(xyz, self.config.sphere_radius, self.config.sphere_min_length)
            } else {
                None
            }
        } else {
            None
        };

        let hemisphere: Hemisphere = self
            .hemispheres
            .classify(table.get_str(row, "Hemisphere"), table.get_str(row, "FSLabel"));

        Ok(ResolvedRow {
            contact: ElectrodeContact {
                number,
                label,
                position: native.map(|(_, v)| v),
                mni_position: mni,
                sphere_position,
                radius: Some(radius),
                is_surface,
                hemisphere,
            },
            position_source: native.map(|(s, _)| s),
        })
    }

    /// Resolve every row, failing on the first invalid electrode number.
    pub fn resolve_table(&self, table: &DataTable) -> Result<Vec<ResolvedRow>> {
        if !table.has_column(ELECTRODE_COLUMN) {
            return Err(SubjectError::missing_column(ELECTRODE_COLUMN));
        }
        (0..table.n_rows()).map(|row| self.resolve_row(table, row)).collect()
    }
}

/// Electrode numbers are positive integers (`3` or `3.0`).
pub(crate) fn parse_electrode_number(table: &DataTable, row: usize) -> Result<u32> {
    let cell = table
        .get_str(row, ELECTRODE_COLUMN)
        .ok_or_else(|| SubjectError::missing_column(ELECTRODE_COLUMN))?;
    let invalid = || SubjectError::InvalidElectrodeNumber {
        row,
        value: cell.to_string(),
    };
    if let Ok(n) = cell.parse::<u32>() {
        return if n > 0 { Ok(n) } else { Err(invalid()) };
    }
    match cell.parse::<f64>() {
        Ok(v) if v >= 1.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => Ok(v as u32),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> DataTable {
        DataTable::parse(text, ',').unwrap()
    }

    fn resolver() -> ElectrodeCoordinateResolver {
        ElectrodeCoordinateResolver::new(Space::Ras, &ElectrodeConfig::default()).unwrap()
    }

    #[test]
    fn test_native_wins_over_tkr() {
        let t = table("Electrode,x,y,z,Coord_x,Coord_y,Coord_z\n1,1,2,3,4,5,6\n");
        let row = resolver().resolve_row(&t, 0).unwrap();
        assert_eq!(row.position_source, Some(CoordinateSource::Native));
        let p = row.contact.position.unwrap();
        assert_eq!(p.to_array(), [1.0, 2.0, 3.0]);
        assert_eq!(p.space(), Space::Ras);
    }

    #[test]
    fn test_falls_back_to_t1() {
        let t = table("Electrode,x,y,z,Coord_x,Coord_y,Coord_z,T1R,T1A,T1S\n1,,,,NA,NA,NA,7,8,9\n");
        let row = resolver().resolve_row(&t, 0).unwrap();
        assert_eq!(row.position_source, Some(CoordinateSource::T1));
        assert_eq!(row.contact.position.unwrap().to_array(), [7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_validity_boundary() {
        let max = ElectrodeConfig::default().max_valid_length;
        assert!(!is_valid_position(&TaggedVector::new(500.0, 0.0, 0.0, Space::Ras), max));
        assert!(is_valid_position(&TaggedVector::new(499.999, 0.0, 0.0, Space::Ras), max));
        assert!(is_valid_position(&TaggedVector::origin(Space::Ras), max));
        assert!(!is_valid_position(&TaggedVector::missing(Space::Ras), max));
    }

    #[test]
    fn test_mni_resolved_independently() {
        let t = table("Electrode,x,y,z,MNI305_x,MNI305_y,MNI305_z,MNI152_x,MNI152_y,MNI152_z\n1,1,2,3,900,0,0,4,5,6\n");
        let row = resolver().resolve_row(&t, 0).unwrap();
        assert_eq!(row.position_source, Some(CoordinateSource::Native));
        let mni = row.contact.mni_position.unwrap();
        assert_eq!(mni.space(), Space::Mni152);
        assert_eq!(mni.to_array(), [4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_defaults_and_surface() {
        let t = table(
            "Electrode,Label,x,y,z,SurfaceElectrode,Radius,Sphere_x,Sphere_y,Sphere_z\n\
             1,,1,1,1,TRUE,,0,3,4\n\
             2,LA2,1,1,1,no,0.5,0,3,4\n",
        );
        let r = resolver();
        let first = r.resolve_row(&t, 0).unwrap().contact;
        assert_eq!(first.label, "NoLabel1");
        assert!(first.is_surface);
        assert_eq!(first.radius, Some(2.0));
        assert_eq!(first.sphere_position.unwrap().to_array(), [0.0, 60.0, 80.0]);

        let second = r.resolve_row(&t, 1).unwrap().contact;
        assert_eq!(second.label, "LA2");
        assert!(!second.is_surface);
        assert_eq!(second.radius, Some(0.5));
        assert!(second.sphere_position.is_none());
    }

    #[test]
    fn test_hemisphere_from_fs_label() {
        let t = table("Electrode,x,y,z,FSLabel\n1,1,1,1,ctx-lh-precentral\n");
        let row = resolver().resolve_row(&t, 0).unwrap();
        assert_eq!(row.contact.hemisphere, Hemisphere::Left);
    }

    #[test]
    fn test_sphere_position_validity() {
        let t = table(
            "Electrode,x,y,z,SurfaceElectrode,Sphere_x,Sphere_y,Sphere_z\n\
             1,1,1,1,TRUE,0,30,40\n\
             2,1,1,1,TRUE,0,300,400\n\
             3,1,1,1,TRUE,NA,0,0\n\
             4,1,1,1,FALSE,0,30,40\n",
        );
        let r = resolver();
        let sphere = |row| r.resolve_row(&t, row).unwrap().contact.sphere_position;
        assert_eq!(sphere(0).map(|s| s.to_array()), Some([0.0, 60.0, 80.0]));
        assert!(sphere(1).is_none());
        assert!(sphere(2).is_none());
        assert!(sphere(3).is_none());
    }

    #[test]
    fn test_no_valid_position() {
        let t = table("Electrode,x,y,z\n4,600,0,0\n");
        let row = resolver().resolve_row(&t, 0).unwrap();
        assert!(row.contact.position.is_none());
        assert!(row.position_source.is_none());
    }

    #[test]
    fn test_electrode_numbers() {
        let t = table("Electrode,x\n3.0,1\n0,1\nabc,1\n-2,1\n");
        let r = resolver();
        assert_eq!(r.resolve_row(&t, 0).unwrap().contact.number, 3);
        for row in 1..4 {
            assert!(matches!(
                r.resolve_row(&t, row),
                Err(SubjectError::InvalidElectrodeNumber { .. })
            ));
        }
        let t = table("Label\nLA1\n");
        assert!(matches!(r.resolve_table(&t), Err(SubjectError::MissingColumn(_))));
    }
}
