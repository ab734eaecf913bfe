//! FreeSurfer linear transform (`.xfm`) reader.

use std::path::Path;

use anyhow::{bail, Context, Result};
use brainspace_core::spatial::Space;
use brainspace_core::transform::{MatrixLayout, TaggedMatrix};
use regex::Regex;
use tracing::debug;

const ROW_PATTERN: &str = r"^ *(-?[0-9.]+) +(-?[0-9.]+) +(-?[0-9.]+) +(-?[0-9.]+)[ ;]*$";

/// Parse the text of a linear `.xfm` file into a RAS → MNI305 transform.
///
/// Every line holding exactly four numbers (optionally `;`-terminated) is a
/// matrix row; three rows get the `[0, 0, 0, 1]` bottom row appended.
pub fn parse_xfm(text: &str) -> Result<TaggedMatrix> {
    let row_pattern = Regex::new(ROW_PATTERN)?;
    let mut values = Vec::with_capacity(16);
    for line in text.lines() {
        let Some(caps) = row_pattern.captures(line.trim_end_matches('\r')) else {
            continue;
        };
        for i in 1..=4 {
            let token = &caps[i];
            let value: f64 = token
                .parse()
                .with_context(|| format!("Invalid number in xfm row: {token}"))?;
            values.push(value);
        }
    }
    match values.len() {
        12 | 16 => {}
        0 => bail!("No transform rows found"),
        n => bail!("Expected 3 or 4 transform rows, found {}", n / 4),
    }
    Ok(TaggedMatrix::from_buffer(
        &values,
        MatrixLayout::RowMajor,
        Space::Ras,
        Space::Mni305,
    )?)
}

/// Read a FreeSurfer `talairach.xfm`.
pub fn read_xfm<P: AsRef<Path>>(path: P) -> Result<TaggedMatrix> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read xfm file: {}", path.display()))?;
    let transform = parse_xfm(&text).with_context(|| format!("Failed to parse xfm file: {}", path.display()))?;
    debug!("Loaded linear transform from {}", path.display());
    Ok(transform)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TALAIRACH: &str = "MNI Transform File\n\
% avi2talxfm\n\
\n\
Transform_Type = Linear;\n\
Linear_Transform = \n\
 1.052033 0.012306 -0.024506 -1.866455 \n\
-0.009817 0.988654 0.227006 -20.312195 \n\
0.021290 -0.249612 1.118127 14.547882 ;\n";

    #[test]
    fn test_parse_talairach() {
        let m = parse_xfm(TALAIRACH).unwrap();
        assert_eq!(m.space_from(), Space::Ras);
        assert_eq!(m.space_to(), Space::Mni305);
        assert_eq!(m[(0, 0)], 1.052033);
        assert_eq!(m[(1, 3)], -20.312195);
        assert_eq!(m[(2, 3)], 14.547882);
        assert_eq!(m.rows()[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_parse_four_rows() {
        let text = "1 0 0 1\n0 1 0 2\n0 0 1 3\n0 0 0 1\n";
        let m = parse_xfm(text).unwrap();
        assert_eq!(m[(2, 3)], 3.0);
    }

    #[test]
    fn test_parse_failures() {
        assert!(parse_xfm("Transform_Type = Linear;\n").is_err());
        assert!(parse_xfm("1 0 0 1\n0 1 0 2\n").is_err());
        // matches the row shape but is not a number
        assert!(parse_xfm("1 0 0 1\n0 1 0 2\n0 0 1 1.2.3\n").is_err());
    }

    #[test]
    fn test_crlf_lines() {
        let text = "1 0 0 1\r\n0 1 0 2\r\n0 0 1 3 ;\r\n";
        assert!(parse_xfm(text).is_ok());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_xfm(dir.path().join("talairach.xfm")).is_err());
    }
}
