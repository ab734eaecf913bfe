//! Colour helpers: hex parsing, palette interpolation and hex output.

use crate::colormap::ColormapError;

/// RGBA colour with channels in `[0, 1]`.
pub type Rgba = [f64; 4];

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (a `0x` prefix is also accepted).
pub fn parse_hex(hex: &str) -> Result<Rgba, ColormapError> {
    let invalid = || ColormapError::InvalidColor(hex.to_string());
    let lower = hex.trim().to_ascii_lowercase();
    let digits = lower
        .strip_prefix("0x")
        .or_else(|| lower.strip_prefix('#'))
        .unwrap_or(&lower);
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let expanded = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).chain("ff".chars()).collect::<String>(),
        6 => format!("{digits}ff"),
        8 => digits.to_string(),
        _ => return Err(invalid()),
    };
    let mut rgba = [0.0; 4];
    for (i, channel) in rgba.iter_mut().enumerate() {
        let byte = u8::from_str_radix(&expanded[2 * i..2 * i + 2], 16).map_err(|_| invalid())?;
        *channel = byte as f64 / 255.0;
    }
    Ok(rgba)
}

/// Parse a list of hex colours.
pub fn parse_palette<S: AsRef<str>>(palette: &[S]) -> Result<Vec<Rgba>, ColormapError> {
    palette.iter().map(|c| parse_hex(c.as_ref())).collect()
}

/// Linearly interpolate `colors` to `n` evenly spaced entries.
///
/// With `truncate`, a palette that already has at least `n` colours is cut to
/// its first `n` instead of being resampled.
pub fn interpolate_colors(colors: &[Rgba], n: usize, truncate: bool) -> Result<Vec<Rgba>, ColormapError> {
    let rows = colors.len();
    if rows < 2 {
        return Err(ColormapError::NotEnoughColors(rows));
    }
    if n < 2 || (truncate && n <= rows) {
        return Ok(colors.iter().take(n).copied().collect());
    }
    let step = (rows - 1) as f64 / (n - 1) as f64;
    Ok((0..n)
        .map(|i| {
            let pos = i as f64 * step;
            let i0 = pos.floor() as usize;
            let a = pos - i0 as f64;
            if a < 1e-6 || i0 + 1 >= rows {
                return colors[i0.min(rows - 1)];
            }
            let (c0, c1) = (colors[i0], colors[i0 + 1]);
            [0, 1, 2, 3].map(|k| c0[k] * (1.0 - a) + c1[k] * a)
        })
        .collect())
}

/// Format a colour as hex, e.g. `#ff8000` or `0xff8000ff`.
pub fn to_hex(color: &Rgba, prefix: &str, drop_alpha: bool) -> String {
    let byte = |v: f64| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    let mut out = format!(
        "{prefix}{:02x}{:02x}{:02x}",
        byte(color[0]),
        byte(color[1]),
        byte(color[2])
    );
    if !drop_alpha {
        out.push_str(&format!("{:02x}", byte(color[3])));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(parse_hex("#fff").unwrap(), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(parse_hex("0xFF0000").unwrap(), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(parse_hex("#00ff0000").unwrap(), [0.0, 1.0, 0.0, 0.0]);
        assert!(parse_hex("#ffff").is_err());
        assert!(parse_hex("#gggggg").is_err());
        assert!(parse_hex("").is_err());
    }

    #[test]
    fn test_interpolate_endpoints() {
        let palette = parse_palette(&["#000000", "#ffffff"]).unwrap();
        let colors = interpolate_colors(&palette, 5, false).unwrap();
        assert_eq!(colors.len(), 5);
        assert_eq!(colors[0], palette[0]);
        assert_eq!(colors[4], palette[1]);
        assert!((colors[2][0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_interpolate_truncate() {
        let palette = parse_palette(&["#ff0000", "#00ff00", "#0000ff", "#ffffff"]).unwrap();
        let colors = interpolate_colors(&palette, 2, true).unwrap();
        assert_eq!(colors, palette[..2].to_vec());
        // more colours requested than available still interpolates
        assert_eq!(interpolate_colors(&palette, 8, true).unwrap().len(), 8);
    }

    #[test]
    fn test_interpolate_needs_two_colors() {
        let palette = parse_palette(&["#ff0000"]).unwrap();
        assert!(matches!(
            interpolate_colors(&palette, 4, false),
            Err(ColormapError::NotEnoughColors(1))
        ));
    }

    #[test]
    fn test_to_hex() {
        let c = parse_hex("#2166ac").unwrap();
        assert_eq!(to_hex(&c, "#", true), "#2166ac");
        assert_eq!(to_hex(&c, "0x", false), "0x2166acff");
        assert_eq!(to_hex(&[1.5, -0.2, 0.0, 1.0], "#", true), "#ff0000");
    }
}
