//! Time-indexed electrode values.
//!
//! A keyframe is a named series of `(time, value)` pairs, either continuous
//! (numbers) or discrete (labels). Continuous keyframes drop non-finite
//! pairs on construction; discrete keyframes remember the set of observed
//! values as their implicit levels.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use brainspace_io::table::is_numeric_cell;

/// Names that cannot be used for keyframes.
pub const RESERVED_NAMES: [&str; 4] = ["[None]", "None", "", "."];

/// Default material property animated by a keyframe.
pub const DEFAULT_TARGET: &str = ".material.color";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyframeError {
    #[error("Invalid keyframe name {0:?}, must not be one of [None], None, empty or \".\"")]
    ReservedName(String),

    #[error("Value and time lengths must be equal (time: {time}, value: {value})")]
    LengthMismatch { time: usize, value: usize },

    #[error("Value must be a scalar when time is missing, got {0} values")]
    ScalarRequired(usize),
}

/// Whether values are numbers or labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Continuous,
    Discrete,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Continuous => "continuous",
            ValueType::Discrete => "discrete",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyframe values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KeyframeValues {
    Continuous(Vec<f64>),
    Discrete(Vec<String>),
}

impl KeyframeValues {
    pub fn len(&self) -> usize {
        match self {
            KeyframeValues::Continuous(v) => v.len(),
            KeyframeValues::Discrete(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            KeyframeValues::Continuous(_) => ValueType::Continuous,
            KeyframeValues::Discrete(_) => ValueType::Discrete,
        }
    }
}

/// Replace every character outside `[A-Za-z0-9_[]]` with `.` and reject
/// reserved names.
pub fn sanitize_name(name: &str) -> Result<String, KeyframeError> {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '[' | ']') {
                c
            } else {
                '.'
            }
        })
        .collect();
    if RESERVED_NAMES.contains(&sanitized.as_str()) {
        return Err(KeyframeError::ReservedName(sanitized));
    }
    Ok(sanitized)
}

fn unique_in_order<'a>(values: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

/// A named series of time/value pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    name: String,
    target: String,
    time: Vec<f64>,
    values: KeyframeValues,
    implicit_levels: Vec<String>,
    levels: Option<Vec<String>>,
}

fn resolve_time(time: Option<Vec<f64>>, n_values: usize) -> Result<Vec<f64>, KeyframeError> {
    match time {
        None if n_values == 1 => Ok(vec![0.0]),
        None => Err(KeyframeError::ScalarRequired(n_values)),
        Some(t) if t.len() != n_values => Err(KeyframeError::LengthMismatch {
            time: t.len(),
            value: n_values,
        }),
        Some(t) => Ok(t),
    }
}

impl Keyframe {
    /// Numeric keyframe. A single value without `time` is placed at time 0.
    pub fn continuous(name: &str, values: Vec<f64>, time: Option<Vec<f64>>) -> Result<Self, KeyframeError> {
        let name = sanitize_name(name)?;
        let time = resolve_time(time, values.len())?;
        let (time, values): (Vec<f64>, Vec<f64>) = time
            .into_iter()
            .zip(values)
            .filter(|(_, v)| v.is_finite())
            .unzip();
        Ok(Self {
            name,
            target: DEFAULT_TARGET.to_string(),
            time,
            values: KeyframeValues::Continuous(values),
            implicit_levels: Vec::new(),
            levels: None,
        })
    }

    /// Label keyframe. A single value without `time` is placed at time 0.
    pub fn discrete(name: &str, values: Vec<String>, time: Option<Vec<f64>>) -> Result<Self, KeyframeError> {
        let name = sanitize_name(name)?;
        let time = resolve_time(time, values.len())?;
        let implicit_levels = unique_in_order(&values);
        Ok(Self {
            name,
            target: DEFAULT_TARGET.to_string(),
            time,
            values: KeyframeValues::Discrete(values),
            implicit_levels,
            levels: None,
        })
    }

    /// Build from text cells, continuous when every cell is a number or a
    /// missing-number token, discrete otherwise.
    pub fn from_cells(name: &str, cells: &[&str], time: Option<Vec<f64>>) -> Result<Self, KeyframeError> {
        if !cells.is_empty() && cells.iter().all(|c| is_numeric_cell(c)) {
            let values = cells
                .iter()
                .map(|c| c.trim().parse::<f64>().unwrap_or(f64::NAN))
                .collect();
            Self::continuous(name, values, time)
        } else {
            let values = cells.iter().map(|c| c.to_string()).collect();
            Self::discrete(name, values, time)
        }
    }

    /// Replace the animated material property.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn values(&self) -> &KeyframeValues {
        &self.values
    }

    pub fn value_type(&self) -> ValueType {
        self.values.value_type()
    }

    pub fn is_continuous(&self) -> bool {
        self.value_type() == ValueType::Continuous
    }

    /// Factor levels of a discrete keyframe; `None` when continuous.
    pub fn levels(&self) -> Option<&[String]> {
        if self.is_continuous() {
            return None;
        }
        Some(self.levels.as_deref().unwrap_or(&self.implicit_levels))
    }

    /// Set explicit levels (merged with the observed values). `None`
    /// restores the observed values. Ignored for continuous keyframes.
    pub fn set_levels(&mut self, levels: Option<Vec<String>>) {
        if self.is_continuous() {
            return;
        }
        self.levels = levels.map(|levels| unique_in_order(levels.iter().chain(&self.implicit_levels)));
    }

    /// `[min, max]` of a continuous keyframe.
    pub fn range(&self) -> Option<[f64; 2]> {
        match &self.values {
            KeyframeValues::Continuous(v) if !v.is_empty() => Some(min_max(v)),
            _ => None,
        }
    }

    /// `[min, max]` of the finite time stamps.
    pub fn time_range(&self) -> Option<[f64; 2]> {
        let finite: Vec<f64> = self.time.iter().copied().filter(|t| t.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        Some(min_max(&finite))
    }

    /// Serializable form.
    pub fn to_export(&self) -> KeyframeExport {
        KeyframeExport {
            name: self.name.clone(),
            time: self.time.clone(),
            value: self.values.clone(),
            data_type: self.value_type(),
            target: self.target.clone(),
            cached: false,
        }
    }
}

fn min_max(values: &[f64]) -> [f64; 2] {
    values
        .iter()
        .fold([f64::INFINITY, f64::NEG_INFINITY], |[lo, hi], &v| [lo.min(v), hi.max(v)])
}

/// Exported keyframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyframeExport {
    pub name: String,
    pub time: Vec<f64>,
    pub value: KeyframeValues,
    pub data_type: ValueType,
    pub target: String,
    pub cached: bool,
}
