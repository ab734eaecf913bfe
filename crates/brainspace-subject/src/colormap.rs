//! Per-keyframe-name colormaps.
//!
//! An `ElectrodeColormap` accumulates the time range, value range (continuous)
//! or value names (discrete) of every keyframe sharing its name, and turns
//! them into colour keys for the viewer.

use serde::Serialize;
use thiserror::Error;

use brainspace_core::config::ColormapConfig;

use crate::color::{interpolate_colors, parse_palette, to_hex, Rgba};
use crate::keyframe::{Keyframe, ValueType};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColormapError {
    #[error("Keyframe {keyframe} is {actual} but colormap {colormap} is {expected}")]
    TypeMismatch {
        colormap: String,
        keyframe: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("Keyframe name {keyframe} does not match colormap name {colormap}")]
    NameMismatch { colormap: String, keyframe: String },

    #[error("Invalid hard range: [{0}, {1}]")]
    InvalidHardRange(f64, f64),

    #[error("Invalid number of colors: {0}, must be at least 2")]
    InvalidColorCount(usize),

    #[error("Cannot parse color: {0:?}")]
    InvalidColor(String),

    #[error("At least 2 palette colors are required, got {0}")]
    NotEnoughColors(usize),

    #[error("Colormap {0} has not been initialized")]
    Uninitialized(String),
}

/// Colour keys and colours generated from a colormap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorTable {
    pub keys: Vec<f64>,
    pub colors: Vec<String>,
}

/// Colormap shared by all keyframes with the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectrodeColormap {
    name: String,
    alias: String,
    value_type: ValueType,
    time_range: [f64; 2],
    value_range: [f64; 2],
    value_names: Vec<String>,
    hard_range: Option<[f64; 2]>,
    n_colors: usize,
    palette: Option<Vec<Rgba>>,
    default_palette: Vec<String>,
    /// Centre of the symmetrical range, `None` for an asymmetric range.
    symmetric_center: Option<f64>,
    initialized: bool,
}

fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() {
        b
    } else {
        a.min(b)
    }
}

fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() {
        b
    } else {
        a.max(b)
    }
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

impl ElectrodeColormap {
    /// Create an empty colormap with default settings.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::with_config(name, value_type, &ColormapConfig::default())
    }

    /// Create an empty colormap using configured defaults.
    pub fn with_config(name: impl Into<String>, value_type: ValueType, config: &ColormapConfig) -> Self {
        let name = name.into();
        let default_palette = match value_type {
            ValueType::Continuous => config.continuous_palette.clone(),
            ValueType::Discrete => config.discrete_palette.clone(),
        };
        Self {
            alias: name.clone(),
            name,
            value_type,
            time_range: [0.0, 0.0],
            value_range: [0.0, 0.0],
            value_names: Vec::new(),
            hard_range: None,
            n_colors: config.n_colors.max(2),
            palette: None,
            default_palette,
            symmetric_center: config.symmetrical.then_some(0.0),
            initialized: false,
        }
    }

    /// Create a colormap named and typed after `keyframe`, and fold it in.
    pub fn from_keyframe(keyframe: &Keyframe, config: &ColormapConfig) -> Result<Self, ColormapError> {
        let mut colormap = Self::with_config(keyframe.name(), keyframe.value_type(), config);
        colormap.update_from_keyframe(keyframe, false)?;
        Ok(colormap)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn set_alias(&mut self, alias: impl Into<String>) {
        self.alias = alias.into();
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Centre the range on `center`, or `None` for an asymmetric range.
    pub fn set_symmetrical(&mut self, center: Option<f64>) {
        self.symmetric_center = center;
    }

    /// Fold a keyframe's time and value ranges into this colormap.
    pub fn update_from_keyframe(&mut self, keyframe: &Keyframe, ignore_name: bool) -> Result<(), ColormapError> {
        if keyframe.name() != self.name && !ignore_name {
            return Err(ColormapError::NameMismatch {
                colormap: self.name.clone(),
                keyframe: keyframe.name().to_string(),
            });
        }
        if keyframe.value_type() != self.value_type {
            return Err(ColormapError::TypeMismatch {
                colormap: self.name.clone(),
                keyframe: keyframe.name().to_string(),
                expected: self.value_type,
                actual: keyframe.value_type(),
            });
        }

        if let Some([t0, t1]) = keyframe.time_range() {
            if self.initialized {
                self.time_range = [nan_min(self.time_range[0], t0), nan_max(self.time_range[1], t1)];
            } else {
                self.time_range = [t0, t1];
            }
        }

        match keyframe.value_type() {
            ValueType::Continuous => {
                if let Some([v0, v1]) = keyframe.range() {
                    let (mut lo, mut hi) = if self.initialized {
                        (nan_min(self.value_range[0], v0), nan_max(self.value_range[1], v1))
                    } else {
                        (v0, v1)
                    };
                    if let Some([h0, h1]) = self.hard_range {
                        lo = lo.max(h0);
                        hi = hi.min(h1);
                    }
                    self.value_range = [lo, hi];
                }
            }
            ValueType::Discrete => {
                for level in keyframe.levels().unwrap_or_default() {
                    if !self.value_names.contains(level) {
                        self.value_names.push(level.clone());
                    }
                }
            }
        }
        self.initialized = true;
        Ok(())
    }

    /// Time range; degenerate ranges widen by 1, `[0, 1]` when unknown.
    pub fn time_range(&self) -> [f64; 2] {
        if !self.initialized {
            return [0.0, 1.0];
        }
        widen(self.time_range[0], self.time_range[1])
    }

    /// Colour range: the hard range when set, otherwise the observed range
    /// shaped by the symmetry policy. `[-1, 1]` when uninitialized or
    /// discrete.
    pub fn value_range(&self) -> [f64; 2] {
        match self.hard_range {
            Some(range) => range,
            None => self.underlying_value_range(),
        }
    }

    /// Observed range, ignoring the hard range.
    pub fn underlying_value_range(&self) -> [f64; 2] {
        if !self.initialized || self.value_type == ValueType::Discrete {
            return [-1.0, 1.0];
        }
        let center = self.symmetric_center.unwrap_or(0.0);
        let lo = self.value_range[0] - center;
        let hi = self.value_range[1] - center;
        let [lo, hi] = if self.symmetric_center.is_some() {
            if lo.is_finite() || hi.is_finite() {
                let mut m = nan_max(lo.abs(), hi.abs());
                if !m.is_finite() {
                    m = if lo.is_finite() { lo.abs() } else { hi.abs() };
                }
                if m == 0.0 {
                    m = 1.0;
                }
                [-m, m]
            } else {
                [-1.0, 1.0]
            }
        } else {
            widen(lo, hi)
        };
        [lo + center, hi + center]
    }

    pub fn hard_range(&self) -> Option<[f64; 2]> {
        self.hard_range
    }

    /// Fix the colour range (e.g. `[0, 1]` for p-values); `None` clears it.
    pub fn set_hard_range(&mut self, range: Option<[f64; 2]>) -> Result<(), ColormapError> {
        if let Some([lo, hi]) = range {
            if !(lo.is_finite() && hi.is_finite()) {
                return Err(ColormapError::InvalidHardRange(lo, hi));
            }
        }
        self.hard_range = range;
        Ok(())
    }

    /// Observed discrete values; empty when continuous or uninitialized.
    pub fn value_names(&self) -> &[String] {
        if !self.initialized || self.value_type == ValueType::Continuous {
            return &[];
        }
        &self.value_names
    }

    /// Number of colours, always a power of two.
    pub fn n_colors(&self) -> usize {
        let n = match self.value_type {
            ValueType::Discrete => self.value_names.len(),
            ValueType::Continuous => self.n_colors,
        };
        n.max(2).next_power_of_two()
    }

    pub fn set_n_colors(&mut self, n: usize) -> Result<(), ColormapError> {
        if n < 2 {
            return Err(ColormapError::InvalidColorCount(n));
        }
        self.n_colors = n;
        Ok(())
    }

    /// Use a hex palette instead of the configured default.
    pub fn use_hex_palette<S: AsRef<str>>(&mut self, palette: &[S]) -> Result<(), ColormapError> {
        self.use_colors(parse_palette(palette)?)
    }

    /// Use RGBA colours (channels in `[0, 1]`).
    pub fn use_colors(&mut self, colors: Vec<Rgba>) -> Result<(), ColormapError> {
        if colors.len() < 2 {
            return Err(ColormapError::NotEnoughColors(colors.len()));
        }
        self.palette = Some(colors);
        Ok(())
    }

    /// Colour keys and hex colours (`#rrggbb`, or with `prefix`).
    pub fn generate_colors(&self, prefix: &str, drop_alpha: bool) -> Result<ColorTable, ColormapError> {
        if !self.initialized {
            return Err(ColormapError::Uninitialized(self.name.clone()));
        }
        let palette = match &self.palette {
            Some(p) => p.clone(),
            None => parse_palette(&self.default_palette)?,
        };
        let n = self.n_colors();
        let (colors, keys) = match self.value_type {
            ValueType::Continuous => {
                let [lo, hi] = self.value_range();
                (interpolate_colors(&palette, n, false)?, linspace(lo, hi, n))
            }
            ValueType::Discrete => (interpolate_colors(&palette, n, true)?, linspace(0.0, 1.0, n)),
        };
        Ok(ColorTable {
            keys,
            colors: colors.iter().map(|c| to_hex(c, prefix, drop_alpha)).collect(),
        })
    }

    /// Serializable form; `None` while uninitialized.
    pub fn to_export(&self) -> Result<Option<ColormapExport>, ColormapError> {
        if !self.initialized {
            return Ok(None);
        }
        let table = self.generate_colors("0x", true)?;
        Ok(Some(ColormapExport {
            name: self.name.clone(),
            alias: self.alias.clone(),
            time_range: self.time_range(),
            value_type: self.value_type,
            value_range: self.value_range(),
            hard_range: self.hard_range,
            value_names: self.value_names().to_vec(),
            color_levels: self.value_names.len(),
            color_keys: table.keys,
            color_vals: table.colors,
        }))
    }
}

fn widen(lo: f64, hi: f64) -> [f64; 2] {
    match (lo.is_finite(), hi.is_finite()) {
        (true, true) if lo == hi => [lo, hi + 1.0],
        (true, true) => [lo, hi],
        (true, false) => [lo, lo + 1.0],
        (false, true) => [hi - 1.0, hi],
        (false, false) => [-1.0, 1.0],
    }
}

/// Exported colormap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColormapExport {
    pub name: String,
    pub alias: String,
    pub time_range: [f64; 2],
    pub value_type: ValueType,
    pub value_range: [f64; 2],
    pub hard_range: Option<[f64; 2]>,
    pub value_names: Vec<String>,
    pub color_levels: usize,
    pub color_keys: Vec<f64>,
    pub color_vals: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn continuous(values: Vec<f64>) -> Keyframe {
        let time = (0..values.len()).map(|i| i as f64).collect();
        Keyframe::continuous("power", values, Some(time)).unwrap()
    }

    #[test]
    fn test_symmetrical_range() {
        let cmap = ElectrodeColormap::from_keyframe(&continuous(vec![-2.0, 5.0]), &ColormapConfig::default()).unwrap();
        assert_eq!(cmap.value_range(), [-5.0, 5.0]);
    }

    #[test]
    fn test_symmetrical_zero_range() {
        let cmap = ElectrodeColormap::from_keyframe(&continuous(vec![0.0, 0.0]), &ColormapConfig::default()).unwrap();
        assert_eq!(cmap.value_range(), [-1.0, 1.0]);
    }

    #[test]
    fn test_symmetrical_center() {
        let mut cmap = ElectrodeColormap::from_keyframe(&continuous(vec![1.0, 4.0]), &ColormapConfig::default()).unwrap();
        cmap.set_symmetrical(Some(2.0));
        assert_eq!(cmap.value_range(), [0.0, 4.0]);
    }

    #[test]
    fn test_asymmetric_range_widens() {
        let config = ColormapConfig {
            symmetrical: false,
            ..ColormapConfig::default()
        };
        let cmap = ElectrodeColormap::from_keyframe(&continuous(vec![3.0]), &config).unwrap();
        assert_eq!(cmap.value_range(), [3.0, 4.0]);
        let cmap = ElectrodeColormap::from_keyframe(&continuous(vec![-2.0, 5.0]), &config).unwrap();
        assert_eq!(cmap.value_range(), [-2.0, 5.0]);
    }

    #[test]
    fn test_running_range_accumulates() {
        let mut cmap = ElectrodeColormap::from_keyframe(&continuous(vec![1.0, 2.0]), &ColormapConfig::default()).unwrap();
        cmap.set_symmetrical(None);
        cmap.update_from_keyframe(&continuous(vec![-3.0, 0.0, 1.5]), false).unwrap();
        assert_eq!(cmap.underlying_value_range(), [-3.0, 2.0]);
        assert_eq!(cmap.time_range(), [0.0, 2.0]);
    }

    #[test]
    fn test_hard_range() {
        let mut cmap = ElectrodeColormap::new("power", ValueType::Continuous);
        cmap.set_hard_range(Some([0.0, 1.0])).unwrap();
        cmap.update_from_keyframe(&continuous(vec![-0.5, 3.0]), false).unwrap();
        assert_eq!(cmap.value_range(), [0.0, 1.0]);
        assert_eq!(cmap.underlying_value_range(), [-1.0, 1.0]);
        assert!(cmap.set_hard_range(Some([f64::NAN, 1.0])).is_err());
    }

    #[test]
    fn test_uninitialized_defaults() {
        let cmap = ElectrodeColormap::new("power", ValueType::Continuous);
        assert_eq!(cmap.value_range(), [-1.0, 1.0]);
        assert_eq!(cmap.time_range(), [0.0, 1.0]);
        assert!(cmap.generate_colors("#", true).is_err());
        assert_eq!(cmap.to_export().unwrap(), None);
    }

    #[test]
    fn test_type_and_name_checks() {
        let mut cmap = ElectrodeColormap::new("power", ValueType::Continuous);
        let discrete = Keyframe::discrete("power", vec!["A".into()], None).unwrap();
        assert!(matches!(
            cmap.update_from_keyframe(&discrete, false),
            Err(ColormapError::TypeMismatch { .. })
        ));
        let other = Keyframe::continuous("other", vec![1.0], None).unwrap();
        assert!(matches!(
            cmap.update_from_keyframe(&other, false),
            Err(ColormapError::NameMismatch { .. })
        ));
        assert!(cmap.update_from_keyframe(&other, true).is_ok());
    }

    #[test]
    fn test_n_colors_power_of_two() {
        let mut cmap = ElectrodeColormap::new("power", ValueType::Continuous);
        assert_eq!(cmap.n_colors(), 64);
        cmap.set_n_colors(100).unwrap();
        assert_eq!(cmap.n_colors(), 128);
        assert!(cmap.set_n_colors(1).is_err());

        let mut cmap = ElectrodeColormap::new("cls", ValueType::Discrete);
        assert_eq!(cmap.n_colors(), 2);
        let kf = Keyframe::discrete(
            "cls",
            vec!["A".into(), "B".into(), "C".into()],
            Some(vec![0.0, 1.0, 2.0]),
        )
        .unwrap();
        cmap.update_from_keyframe(&kf, false).unwrap();
        assert_eq!(cmap.value_names().len(), 3);
        assert_eq!(cmap.n_colors(), 4);
    }

    #[test]
    fn test_generate_continuous_colors() {
        let cmap = ElectrodeColormap::from_keyframe(&continuous(vec![-2.0, 5.0]), &ColormapConfig::default()).unwrap();
        let table = cmap.generate_colors("#", true).unwrap();
        assert_eq!(table.keys.len(), 64);
        assert_eq!(table.keys[0], -5.0);
        assert_eq!(table.keys[63], 5.0);
        assert_eq!(table.colors[0], "#053061");
        assert_eq!(table.colors[63], "#67001f");
    }

    #[test]
    fn test_generate_discrete_colors() {
        let kf = Keyframe::discrete("cls", vec!["A".into(), "B".into()], Some(vec![0.0, 1.0])).unwrap();
        let cmap = ElectrodeColormap::from_keyframe(&kf, &ColormapConfig::default()).unwrap();
        let table = cmap.generate_colors("#", true).unwrap();
        assert_eq!(table.keys, vec![0.0, 1.0]);
        assert_eq!(table.colors, vec!["#ffa500", "#1874cd"]);
    }

    #[test]
    fn test_export() {
        let cmap = ElectrodeColormap::from_keyframe(&continuous(vec![-2.0, 5.0]), &ColormapConfig::default()).unwrap();
        let export = cmap.to_export().unwrap().unwrap();
        assert_eq!(export.value_range, [-5.0, 5.0]);
        assert!(export.color_vals[0].starts_with("0x"));
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["value_type"], "continuous");
        assert_eq!(json["hard_range"], serde_json::Value::Null);
    }
}
