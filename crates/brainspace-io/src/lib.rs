pub mod mgh_io;
pub mod nifti_io;
pub mod table;
pub mod volume;
pub mod xfm_io;

pub use mgh_io::read_mgh_header;
pub use nifti_io::read_nifti_header;
pub use table::DataTable;
pub use volume::{infer_format, is_mgz_file, FileVolumeReader, VolumeHeader, VolumeReader};
pub use xfm_io::{parse_xfm, read_xfm};
