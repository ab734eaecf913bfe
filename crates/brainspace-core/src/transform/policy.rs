//! Update policy for the voxel-space base transforms.

use super::provenance::SourceFormat;

/// How eagerly a newly discovered volume replaces cached transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum UpdateLevel {
    /// Only fill transforms that are unset.
    InitializeOnly = 0,
    /// Fill unset transforms; replace a non-MGZ tkr transform with one from a `.mgz` file.
    #[default]
    PreferBetter = 1,
    /// Overwrite unconditionally.
    Force = 2,
}

impl UpdateLevel {
    /// Levels above 2 saturate to `Force`.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => UpdateLevel::InitializeOnly,
            1 => UpdateLevel::PreferBetter,
            _ => UpdateLevel::Force,
        }
    }

    pub fn is_forced(&self) -> bool {
        *self == UpdateLevel::Force
    }
}

impl From<u8> for UpdateLevel {
    fn from(level: u8) -> Self {
        Self::from_level(level)
    }
}

/// Which base transforms a candidate volume should replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateDecision {
    pub vox2ras: bool,
    pub vox2ras_tkr: bool,
}

impl UpdateDecision {
    /// Whether the candidate header has to be read at all.
    pub fn needs_any(&self) -> bool {
        self.vox2ras || self.vox2ras_tkr
    }

    /// Whether the caller should stop considering further candidates.
    pub fn stops_scan(&self, level: UpdateLevel) -> bool {
        !self.needs_any() && !level.is_forced()
    }
}

/// Current state of the base transforms, as seen by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BaseState {
    pub has_vox2ras: bool,
    /// `None` when the tkr transform is unset.
    pub vox2ras_tkr_format: Option<Option<SourceFormat>>,
}

/// Decide which transforms a candidate volume should replace.
///
/// `candidate_mgz` is true only for files named `*.mgz`. An uncompressed
/// `.mgh` candidate fills unset transforms but never upgrades a tkr transform.
pub fn plan(state: BaseState, candidate_mgz: bool, level: UpdateLevel) -> UpdateDecision {
    let forced = level.is_forced();
    let vox2ras = forced || !state.has_vox2ras;
    let vox2ras_tkr = forced
        || match state.vox2ras_tkr_format {
            None => true,
            Some(current) => {
                level == UpdateLevel::PreferBetter
                    && current != Some(SourceFormat::Mgz)
                    && candidate_mgz
            }
        };
    UpdateDecision {
        vox2ras,
        vox2ras_tkr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(format: SourceFormat) -> BaseState {
        BaseState {
            has_vox2ras: true,
            vox2ras_tkr_format: Some(Some(format)),
        }
    }

    #[test]
    fn test_level_conversion() {
        assert_eq!(UpdateLevel::from(0), UpdateLevel::InitializeOnly);
        assert_eq!(UpdateLevel::from(1), UpdateLevel::PreferBetter);
        assert_eq!(UpdateLevel::from(2), UpdateLevel::Force);
        assert_eq!(UpdateLevel::from(7), UpdateLevel::Force);
        assert_eq!(UpdateLevel::default(), UpdateLevel::PreferBetter);
    }

    #[test]
    fn test_empty_state_always_fills() {
        for level in [UpdateLevel::InitializeOnly, UpdateLevel::PreferBetter, UpdateLevel::Force] {
            let decision = plan(BaseState::default(), false, level);
            assert!(decision.vox2ras && decision.vox2ras_tkr);
        }
    }

    #[test]
    fn test_prefer_better_replaces_nifti_tkr_with_mgz() {
        let decision = plan(filled(SourceFormat::Nii), true, UpdateLevel::PreferBetter);
        assert!(!decision.vox2ras);
        assert!(decision.vox2ras_tkr);

        let same = plan(filled(SourceFormat::Mgz), true, UpdateLevel::PreferBetter);
        assert!(!same.needs_any());
        assert!(same.stops_scan(UpdateLevel::PreferBetter));

        let worse = plan(filled(SourceFormat::Mgz), false, UpdateLevel::PreferBetter);
        assert!(!worse.needs_any());
    }

    #[test]
    fn test_initialize_only_never_replaces() {
        let decision = plan(filled(SourceFormat::Nii), true, UpdateLevel::InitializeOnly);
        assert!(!decision.needs_any());
    }

    #[test]
    fn test_unknown_format_counts_as_not_mgz() {
        let state = BaseState {
            has_vox2ras: true,
            vox2ras_tkr_format: Some(None),
        };
        assert!(plan(state, true, UpdateLevel::PreferBetter).vox2ras_tkr);
    }

    #[test]
    fn test_mgh_tkr_counts_as_mgz_but_does_not_upgrade() {
        let state = filled(SourceFormat::Nii);
        assert!(!plan(state, false, UpdateLevel::PreferBetter).needs_any());

        let from_mgh = filled(SourceFormat::Mgz);
        assert!(!plan(from_mgh, true, UpdateLevel::PreferBetter).needs_any());
    }

    #[test]
    fn test_force_overwrites_and_never_stops() {
        let decision = plan(filled(SourceFormat::Mgz), false, UpdateLevel::Force);
        assert!(decision.vox2ras && decision.vox2ras_tkr);
        assert!(!UpdateDecision::default().stops_scan(UpdateLevel::Force));
    }
}
