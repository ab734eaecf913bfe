//! Subject sessions for the brain viewer back-end.
//!
//! Opens a FreeSurfer-style subject folder, discovers its coordinate
//! transforms, resolves electrode tables into contacts and turns value
//! tables into keyframes and colormaps ready for export.

pub mod color;
pub mod colormap;
pub mod electrode;
pub mod error;
pub mod export;
pub mod keyframe;
pub mod subject;

pub use colormap::{ColorTable, ColormapError, ElectrodeColormap};
pub use electrode::{
    CoordinateSource, ElectrodeContact, ElectrodeCoordinateResolver, ElectrodeRecord, Hemisphere,
    SpherePosition,
};
pub use error::{Result, SubjectError};
pub use export::{ColormapExport, ElectrodeExport, SubjectExport, SubjectInfo};
pub use keyframe::{Keyframe, KeyframeError, KeyframeExport, KeyframeValues, ValueType};
pub use subject::{ColorFormat, Subject, VolumeEntry};
