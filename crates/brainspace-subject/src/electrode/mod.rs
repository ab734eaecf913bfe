//! Electrode contacts: table resolution, hemispheres and stored records.

pub mod hemisphere;
pub mod record;
pub mod resolver;

pub use hemisphere::{Hemisphere, HemisphereClassifier};
pub use record::{ElectrodeContact, ElectrodeRecord, SpherePosition};
pub use resolver::{
    is_valid_position, CandidateCoordinates, CoordinateSource, ElectrodeCoordinateResolver, ResolvedRow,
    ELECTRODE_COLUMN, MNI_PRIORITY, NATIVE_PRIORITY,
};
