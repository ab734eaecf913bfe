//! Subject session.
//!
//! A `Subject` owns the transform graph of one FreeSurfer-style subject
//! folder, the electrode contacts keyed by number and one colormap per
//! keyframe name. Volumes are discovered through a [`VolumeReader`] so the
//! file system can be swapped out in tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use brainspace_core::config::ColormapConfig;
use brainspace_core::{BrainspaceConfig, Space, TaggedMatrix, TaggedVector, TransformGraph, UpdateLevel};
use brainspace_io::{infer_format, is_mgz_file, read_xfm, DataTable, FileVolumeReader, VolumeReader};

use crate::colormap::ElectrodeColormap;
use crate::electrode::record::resolve_mni;
use crate::electrode::resolver::parse_electrode_number;
use crate::electrode::{ElectrodeContact, ElectrodeCoordinateResolver, ElectrodeRecord, ELECTRODE_COLUMN};
use crate::error::{Result, SubjectError};
use crate::export::{SubjectExport, SubjectInfo};
use crate::keyframe::Keyframe;

const SUBJECT_CODE_PATTERN: &str = r"^[a-zA-Z][a-zA-Z0-9_-]*$";

/// How an added volume is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorFormat {
    /// Single channel, coloured by value.
    RedFormat,
    /// Four channels, values index a colour table.
    #[serde(rename = "RGBAFormat")]
    RgbaFormat,
}

/// A volume registered with the subject.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeEntry {
    /// Display name, including the subject code.
    pub name: String,
    pub path: PathBuf,
    /// Set for atlas volumes.
    pub color_format: Option<ColorFormat>,
}

/// One subject's coordinate frames, volumes, electrodes and values.
pub struct Subject<R: VolumeReader = FileVolumeReader> {
    code: String,
    path: PathBuf,
    config: BrainspaceConfig,
    reader: R,
    graph: TransformGraph,
    slices: BTreeMap<String, VolumeEntry>,
    atlases: BTreeMap<String, VolumeEntry>,
    electrodes: BTreeMap<u32, ElectrodeRecord>,
    colormaps: BTreeMap<String, ElectrodeColormap>,
    group_transform: TaggedMatrix,
}

impl Subject<FileVolumeReader> {
    /// Open a subject folder with the default configuration.
    pub fn open(code: &str, path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(code, path, BrainspaceConfig::default(), FileVolumeReader::new())
    }
}

impl<R: VolumeReader> Subject<R> {
    /// Open a subject folder, discover its base transforms and load the
    /// linear registration.
    pub fn open_with(code: &str, path: impl AsRef<Path>, config: BrainspaceConfig, reader: R) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(SubjectError::PathNotFound(path));
        }
        let pattern = Regex::new(SUBJECT_CODE_PATTERN).map_err(anyhow::Error::from)?;
        if !pattern.is_match(code) {
            return Err(SubjectError::InvalidSubjectCode(code.to_string()));
        }
        config.validate()?;

        let graph = TransformGraph::new(config.transforms.mni305_to_mni152())?;
        let mut subject = Self {
            code: code.to_string(),
            path,
            config,
            reader,
            graph,
            slices: BTreeMap::new(),
            atlases: BTreeMap::new(),
            electrodes: BTreeMap::new(),
            colormaps: BTreeMap::new(),
            group_transform: TaggedMatrix::from_rows(IDENTITY_ROWS, Space::Ras, Space::Ras),
        };

        let files = subject.config.volumes.default_volume_files(&subject.path);
        let reads = subject.update_matrices(&files, UpdateLevel::PreferBetter)?;

        let xfm_path = subject.path.join(&subject.config.volumes.xfm_path);
        match read_xfm(&xfm_path) {
            Ok(xfm) => subject.graph.set_ras2mni305(xfm)?,
            Err(e) => tracing::warn!("No usable registration for {}: {:#}", subject.code, e),
        }

        tracing::info!(
            "Opened subject {} at {} ({} headers read, missing: {:?})",
            subject.code,
            subject.path.display(),
            reads,
            subject.graph.missing_transforms()
        );
        Ok(subject)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mri_dir(&self) -> PathBuf {
        self.path.join(&self.config.volumes.mri_dir)
    }

    pub fn config(&self) -> &BrainspaceConfig {
        &self.config
    }

    pub fn graph(&self) -> &TransformGraph {
        &self.graph
    }

    /// Transform between two spaces of this subject.
    pub fn get_transform(&self, space_from: Space, space_to: Space) -> Result<TaggedMatrix> {
        Ok(self.graph.get_transform(space_from, space_to)?)
    }

    /// Consider `files` in order and update the voxel base transforms.
    ///
    /// Missing files are skipped and unreadable headers are logged and
    /// skipped. Below [`UpdateLevel::Force`] the scan stops at the first
    /// existing file that would not change anything. Returns the number of
    /// headers read.
    pub fn update_matrices(&mut self, files: &[PathBuf], level: UpdateLevel) -> Result<usize> {
        let mut reads = 0;
        for file in files {
            if !self.reader.exists(file) {
                continue;
            }
            if infer_format(file).is_none() {
                tracing::debug!("Skipping {}: unknown volume format", file.display());
                continue;
            }
            let decision = self.graph.plan_update(is_mgz_file(file), level);
            if decision.stops_scan(level) {
                tracing::debug!("Transforms up to date, not reading {}", file.display());
                break;
            }
            tracing::debug!("Reading header of {} ({:?})", file.display(), decision);
            match self.reader.read_header(file) {
                Ok(header) => {
                    reads += 1;
                    self.graph.apply_update(header.affine, header.tkr_affine, decision)?;
                }
                Err(e) => tracing::warn!("Cannot read volume header {}: {:#}", file.display(), e),
            }
        }
        Ok(reads)
    }

    /// Find `{prefix}.{ext}` in the MRI folder, ignoring case, trying the
    /// configured extensions in order.
    fn find_volume(&self, prefix: &str) -> Option<PathBuf> {
        let mri = self.mri_dir();
        let entries: Vec<(String, PathBuf)> = std::fs::read_dir(&mri)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| (entry.file_name().to_string_lossy().to_lowercase(), entry.path()))
            .collect();
        let prefix = prefix.to_lowercase();
        self.config.volumes.extensions.iter().find_map(|ext| {
            let wanted = format!("{prefix}.{}", ext.to_lowercase());
            entries
                .iter()
                .find(|(name, path)| *name == wanted && self.reader.exists(path))
                .map(|(_, path)| path.clone())
        })
    }

    /// Register an MRI slice volume under `name` (e.g. `T1`). Returns `None`
    /// when no matching file exists.
    pub fn add_slice(&mut self, prefix: &str, name: &str) -> Result<Option<&VolumeEntry>> {
        let Some(path) = self.find_volume(prefix) else {
            tracing::debug!("No slice volume for prefix {}", prefix);
            return Ok(None);
        };
        self.update_matrices(std::slice::from_ref(&path), UpdateLevel::PreferBetter)?;
        let entry = VolumeEntry {
            name: format!("{} ({})", name, self.code),
            path,
            color_format: None,
        };
        self.slices.insert(name.to_string(), entry);
        Ok(self.slices.get(name))
    }

    /// Register an atlas or other voxel volume. Without `name`, the prefix
    /// with every character outside `[A-Za-z0-9_]` replaced by `_` is used.
    pub fn add_volume(&mut self, prefix: &str, is_continuous: bool, name: Option<&str>) -> Result<Option<&VolumeEntry>> {
        let name = match name {
            Some(name) => name.to_string(),
            None => prefix
                .to_lowercase()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
                .collect(),
        };
        let Some(path) = self.find_volume(prefix) else {
            tracing::debug!("No volume for prefix {}", prefix);
            return Ok(None);
        };
        self.update_matrices(std::slice::from_ref(&path), UpdateLevel::PreferBetter)?;
        let entry = VolumeEntry {
            name: format!("Atlas - {} ({})", name, self.code),
            path,
            color_format: Some(if is_continuous {
                ColorFormat::RedFormat
            } else {
                ColorFormat::RgbaFormat
            }),
        };
        self.atlases.insert(name.clone(), entry);
        Ok(self.atlases.get(&name))
    }

    pub fn get_slice(&self, name: &str) -> Option<&VolumeEntry> {
        self.slices.get(name)
    }

    pub fn get_volume(&self, name: &str) -> Option<&VolumeEntry> {
        self.atlases.get(name)
    }

    /// Add or replace the contact with the same number.
    pub fn add_electrode_contact(&mut self, contact: ElectrodeContact) -> Result<&ElectrodeRecord> {
        if contact.number == 0 {
            return Err(SubjectError::InvalidElectrodeNumber {
                row: 0,
                value: contact.number.to_string(),
            });
        }
        let mni_position = match contact.mni_position {
            Some(p) => resolve_mni(&self.graph, p)?,
            None => None,
        };
        let electrodes = &self.config.electrodes;
        let radius = match contact.radius {
            Some(r) if r.is_finite() && r > 0.0 => r,
            _ if contact.is_surface => electrodes.surface_radius,
            _ => electrodes.depth_radius,
        };
        let label = match contact.label.trim() {
            "" => format!("NoLabel{}", contact.number),
            label => label.to_string(),
        };
        let record = ElectrodeRecord {
            number: contact.number,
            name: format!("{}, {} - {}", self.code, contact.number, label),
            group_name: format!("Electrodes ({})", self.code),
            label,
            position: contact.position.filter(|p| p.is_finite()),
            mni_position,
            sphere_position: contact.sphere_position,
            radius,
            is_surface: contact.is_surface,
            hemisphere: contact.hemisphere,
            layer: self.config.layers.user_all_cameras,
            keyframes: BTreeMap::new(),
        };
        self.electrodes.insert(contact.number, record);
        Ok(&self.electrodes[&contact.number])
    }

    /// Add every row of an electrode table whose `x, y, z` columns are in
    /// `space`. Returns the number of stored contacts.
    pub fn add_electrodes(&mut self, table: &DataTable, space: Space) -> Result<usize> {
        let resolver = ElectrodeCoordinateResolver::new(space, &self.config.electrodes)?;
        let rows = resolver.resolve_table(table)?;
        let added = rows.len();
        for row in rows {
            self.add_electrode_contact(row.contact)?;
        }
        tracing::info!(
            "Added {} electrode rows to {} ({} contacts)",
            added,
            self.code,
            self.electrodes.len()
        );
        Ok(self.electrodes.len())
    }

    /// Read a delimited electrode table and add its rows.
    pub fn add_electrodes_from_path(&mut self, path: impl AsRef<Path>, space: Space) -> Result<usize> {
        let table = DataTable::from_path(path)?;
        self.add_electrodes(&table, space)
    }

    pub fn get_electrode_contact(&self, number: u32) -> Option<&ElectrodeRecord> {
        self.electrodes.get(&number)
    }

    pub fn get_electrode_contact_mut(&mut self, number: u32) -> Option<&mut ElectrodeRecord> {
        self.electrodes.get_mut(&number)
    }

    /// Contacts ordered by number.
    pub fn electrode_contacts(&self) -> impl Iterator<Item = &ElectrodeRecord> {
        self.electrodes.values()
    }

    /// Remove every contact.
    pub fn clean_electrodes(&mut self) {
        self.electrodes.clear();
    }

    /// Store a keyframe on a contact; `None` when the contact does not exist.
    pub fn set_electrode_keyframe(&mut self, number: u32, keyframe: Keyframe) -> Option<&Keyframe> {
        let contact = self.electrodes.get_mut(&number)?;
        let name = keyframe.name().to_string();
        contact.set_keyframe(keyframe);
        contact.keyframe(&name)
    }

    /// Set a numeric value series on a contact and fold it into its
    /// colormap. `Ok(None)` when the contact does not exist.
    pub fn set_electrode_value(
        &mut self,
        number: u32,
        name: &str,
        values: Vec<f64>,
        time: Option<Vec<f64>>,
    ) -> Result<Option<&Keyframe>> {
        if !self.electrodes.contains_key(&number) {
            return Ok(None);
        }
        let keyframe = Keyframe::continuous(name, values, time)?;
        self.update_colormap(&keyframe)?;
        Ok(self.set_electrode_keyframe(number, keyframe))
    }

    fn update_colormap(&mut self, keyframe: &Keyframe) -> Result<()> {
        fold_colormap(&mut self.colormaps, keyframe, &self.config.colormap)
    }

    /// Attach value columns of `table` to contacts as keyframes.
    ///
    /// `Electrode` is required. `Time` gives the time stamps and `Subject`,
    /// when present, restricts rows to this subject. Every other column is
    /// a value series. Rows for unknown contacts are ignored. Returns the
    /// number of keyframes stored. Nothing is stored when any keyframe or
    /// colormap update fails.
    pub fn set_electrode_values(&mut self, table: &DataTable) -> Result<usize> {
        if !table.has_column(ELECTRODE_COLUMN) {
            return Err(SubjectError::missing_column(ELECTRODE_COLUMN));
        }
        let has_time = table.has_column("Time");
        let value_columns: Vec<&String> = table
            .columns()
            .iter()
            .filter(|c| !matches!(c.as_str(), ELECTRODE_COLUMN | "Time" | "Subject"))
            .collect();

        let mut rows_by_electrode: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for row in 0..table.n_rows() {
            if let Some(subject) = table.get_str(row, "Subject") {
                if subject != self.code {
                    continue;
                }
            }
            let number = parse_electrode_number(table, row)?;
            rows_by_electrode.entry(number).or_default().push(row);
        }

        let mut pending = Vec::new();
        let mut colormaps = self.colormaps.clone();
        for (number, rows) in &rows_by_electrode {
            if !self.electrodes.contains_key(number) {
                tracing::debug!("No electrode {} in {}, skipping values", number, self.code);
                continue;
            }
            let time = has_time.then(|| rows.iter().map(|&r| table.get_f64(r, "Time")).collect::<Vec<_>>());
            for column in &value_columns {
                let keyframe = if table.is_numeric_column(column) {
                    let values = rows.iter().map(|&r| table.get_f64(r, column)).collect();
                    Keyframe::continuous(column, values, time.clone())?
                } else {
                    let values = rows
                        .iter()
                        .map(|&r| table.get_str(r, column).unwrap_or_default().to_string())
                        .collect();
                    Keyframe::discrete(column, values, time.clone())?
                };
                fold_colormap(&mut colormaps, &keyframe, &self.config.colormap)?;
                pending.push((*number, keyframe));
            }
        }

        self.colormaps = colormaps;
        let stored = pending.len();
        for (number, keyframe) in pending {
            self.set_electrode_keyframe(number, keyframe);
        }
        tracing::info!("Stored {} electrode keyframes for {}", stored, self.code);
        Ok(stored)
    }

    /// Read a delimited value table and attach its columns.
    pub fn set_electrode_values_from_path(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let table = DataTable::from_path(path)?;
        self.set_electrode_values(&table)
    }

    pub fn get_electrode_colormap(&self, name: &str) -> Option<&ElectrodeColormap> {
        self.colormaps.get(name)
    }

    pub fn get_electrode_colormap_mut(&mut self, name: &str) -> Option<&mut ElectrodeColormap> {
        self.colormaps.get_mut(name)
    }

    pub fn electrode_colormaps(&self) -> impl Iterator<Item = &ElectrodeColormap> {
        self.colormaps.values()
    }

    /// Transform applied to every electrode in world coordinates.
    pub fn electrode_group_transform(&self) -> &TaggedMatrix {
        &self.group_transform
    }

    pub fn set_electrode_group_transform(&mut self, transform: TaggedMatrix) {
        self.group_transform = transform;
    }

    /// Position of contact `number` in `space` after the group transform.
    pub fn electrode_world_position(&self, number: u32, space: Space) -> Result<Option<TaggedVector>> {
        match self.electrodes.get(&number) {
            Some(record) => Ok(Some(record.get_world_position(&self.graph, space, &self.group_transform)?)),
            None => Ok(None),
        }
    }

    /// Transforms and volume names.
    pub fn subject_info(&self) -> Result<SubjectInfo> {
        Ok(SubjectInfo {
            subject_code: self.code.clone(),
            norig: self.graph.vox2ras().rows(),
            torig: self.graph.vox2ras_tkr().rows(),
            xfm: self.graph.ras2mni305().rows(),
            vox2vox_mni305: self.graph.ras_tkr2mni305()?.rows(),
            volume_types: self.slices.keys().cloned().collect(),
            atlas_types: self.atlases.keys().cloned().collect(),
            missing_transforms: self
                .graph
                .missing_transforms()
                .into_iter()
                .map(String::from)
                .collect(),
        })
    }

    /// Everything the viewer needs for this subject.
    pub fn export(&self) -> Result<SubjectExport> {
        let electrodes = self
            .electrodes
            .values()
            .map(|record| record.to_export(&self.graph, &self.group_transform))
            .collect::<Result<Vec<_>>>()?;
        let mut colormaps = BTreeMap::new();
        for (name, colormap) in &self.colormaps {
            if let Some(export) = colormap.to_export()? {
                colormaps.insert(name.clone(), export);
            }
        }
        Ok(SubjectExport {
            subject_data: self.subject_info()?,
            electrodes,
            default_colormap: colormaps.keys().next().cloned(),
            colormaps,
        })
    }
}

/// Fold `keyframe` into the colormap of the same name, creating it if needed.
fn fold_colormap(
    colormaps: &mut BTreeMap<String, ElectrodeColormap>,
    keyframe: &Keyframe,
    config: &ColormapConfig,
) -> Result<()> {
    match colormaps.get_mut(keyframe.name()) {
        Some(colormap) => colormap.update_from_keyframe(keyframe, false)?,
        None => {
            let colormap = ElectrodeColormap::from_keyframe(keyframe, config)?;
            colormaps.insert(keyframe.name().to_string(), colormap);
        }
    }
    Ok(())
}

const IDENTITY_ROWS: [[f64; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

impl<R: VolumeReader> std::fmt::Debug for Subject<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("code", &self.code)
            .field("path", &self.path)
            .field("electrodes", &self.electrodes.len())
            .field("colormaps", &self.colormaps.len())
            .finish()
    }
}
