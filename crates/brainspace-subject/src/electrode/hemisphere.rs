//! Hemisphere classification for electrode contacts.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Brain hemisphere a contact belongs to; `Auto` lets the viewer decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    Left,
    Right,
    #[default]
    Auto,
}

impl Hemisphere {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hemisphere::Left => "left",
            Hemisphere::Right => "right",
            Hemisphere::Auto => "auto",
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies hemispheres from an explicit hint or a FreeSurfer label.
#[derive(Debug, Clone)]
pub struct HemisphereClassifier {
    left: Regex,
    right: Regex,
}

impl HemisphereClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            left: Regex::new(r"(?i)^(left|(ctx|wm)[_-]lh)")?,
            right: Regex::new(r"(?i)^(right|(ctx|wm)[_-]rh)")?,
        })
    }

    /// An explicit value starting with `l`/`r` wins; otherwise the FreeSurfer
    /// label prefix (`Left-`, `ctx-lh-`, `wm_rh_`, ...) decides.
    pub fn classify(&self, explicit: Option<&str>, fs_label: Option<&str>) -> Hemisphere {
        if let Some(first) = explicit.and_then(|h| h.trim().chars().next()) {
            match first.to_ascii_lowercase() {
                'l' => return Hemisphere::Left,
                'r' => return Hemisphere::Right,
                _ => {}
            }
        }
        match fs_label.map(str::trim) {
            Some(label) if self.left.is_match(label) => Hemisphere::Left,
            Some(label) if self.right.is_match(label) => Hemisphere::Right,
            _ => Hemisphere::Auto,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_hint() {
        let c = HemisphereClassifier::new().unwrap();
        assert_eq!(c.classify(Some("Left"), None), Hemisphere::Left);
        assert_eq!(c.classify(Some(" r"), Some("ctx-lh-insula")), Hemisphere::Right);
        assert_eq!(c.classify(Some("auto"), None), Hemisphere::Auto);
    }

    #[test]
    fn test_freesurfer_labels() {
        let c = HemisphereClassifier::new().unwrap();
        assert_eq!(c.classify(None, Some("ctx-lh-precentral")), Hemisphere::Left);
        assert_eq!(c.classify(Some(""), Some("Right-Hippocampus")), Hemisphere::Right);
        assert_eq!(c.classify(Some("auto"), Some("wm_rh_insula")), Hemisphere::Right);
        assert_eq!(c.classify(None, Some("Unknown")), Hemisphere::Auto);
        assert_eq!(c.classify(None, Some("ctx_xh_foo")), Hemisphere::Auto);
    }

    #[test]
    fn test_serde_form() {
        assert_eq!(serde_json::to_string(&Hemisphere::Left).unwrap(), "\"left\"");
        assert_eq!(Hemisphere::default(), Hemisphere::Auto);
    }
}
