//! Frame table: per-file metadata, frame types and setup assignment.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::framematch::{FrameType, FrameTypeSet};
use crate::meta::{FrameMeta, MetaKey, MetaValue};
use crate::par::pypeitpar::frame_group_path;
use crate::par::ParSet;
use crate::spectrographs::{configuration_of, Spectrograph};

/// One frame of the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRow {
    pub meta: FrameMeta,
    pub frametype: FrameTypeSet,
    /// Setups this frame belongs to; calibrations shared across setups
    /// list several.
    pub setups: Vec<String>,
}

impl FrameRow {
    pub fn new(meta: FrameMeta) -> Self {
        Self {
            meta,
            frametype: FrameTypeSet::empty(),
            setups: Vec::new(),
        }
    }

    pub fn in_setup(&self, setup: &str) -> bool {
        self.setups.iter().any(|s| s == setup)
    }
}

/// A unique instrument configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupConfig {
    pub name: String,
    pub values: Vec<(MetaKey, Option<MetaValue>)>,
}

impl SetupConfig {
    pub fn get(&self, key: MetaKey) -> Option<&MetaValue> {
        self.values
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.as_ref())
    }
}

/// Setup names: A..Z, then AA, AB, ...
pub fn setup_name(index: usize) -> String {
    let mut n = index;
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

pub struct FrameTable<'a> {
    spectrograph: &'a dyn Spectrograph,
    rows: Vec<FrameRow>,
    setups: Vec<SetupConfig>,
}

impl<'a> FrameTable<'a> {
    /// Table over already-built metadata, sorted by filename.
    pub fn from_metas(spectrograph: &'a dyn Spectrograph, metas: Vec<FrameMeta>) -> Self {
        let mut rows: Vec<FrameRow> = metas.into_iter().map(FrameRow::new).collect();
        rows.sort_by(|a, b| a.meta.filename.cmp(&b.meta.filename));
        Self {
            spectrograph,
            rows,
            setups: Vec::new(),
        }
    }

    /// Read the headers of every file. With `strict` an unreadable file is
    /// an error, otherwise it is skipped with a warning.
    pub fn from_files(
        spectrograph: &'a dyn Spectrograph,
        files: &[PathBuf],
        strict: bool,
    ) -> Result<Self> {
        let mut metas = Vec::with_capacity(files.len());
        for path in files {
            match spectrograph.meta_from_file(path) {
                Ok(meta) => metas.push(meta),
                Err(e) if strict => {
                    return Err(e).with_context(|| {
                        format!("Failed to read metadata from {}", path.display())
                    })
                }
                Err(e) => {
                    tracing::warn!("⚠️  Skipping {}: {:#}", path.display(), e);
                }
            }
        }
        tracing::info!("📋 Read metadata for {} of {} files", metas.len(), files.len());
        Ok(Self::from_metas(spectrograph, metas))
    }

    pub fn spectrograph(&self) -> &dyn Spectrograph {
        self.spectrograph
    }

    pub fn rows(&self) -> &[FrameRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, filename: &str) -> Option<&FrameRow> {
        self.rows.iter().find(|r| r.meta.filename == filename)
    }

    /// Drop frames whose configuration values cannot be reduced.
    /// Returns the number of frames removed.
    pub fn remove_invalid(&mut self) -> usize {
        let valid = self.spectrograph.valid_configuration_values();
        let before = self.rows.len();
        self.rows.retain(|row| {
            for (key, allowed) in &valid {
                let value = row.meta.get_str(*key).unwrap_or("");
                if !allowed.iter().any(|a| *a == value) {
                    tracing::warn!(
                        "⚠️  Removing {}: {}={} is not one of {}",
                        row.meta.filename,
                        key,
                        row.meta.display(*key),
                        allowed.join(", ")
                    );
                    return false;
                }
            }
            true
        });
        before - self.rows.len()
    }

    /// Assign frame types from the instrument rules and each frame group's
    /// exposure-time range.
    pub fn get_frame_types(&mut self, par: &ParSet) {
        let ranges: Vec<(FrameType, [Option<f64>; 2])> = FrameType::ALL
            .iter()
            .map(|t| (*t, par.get_range(&format!("{}.exprng", frame_group_path(*t)))))
            .collect();

        for row in self.rows.iter_mut() {
            let mut types = FrameTypeSet::empty();
            for (ftype, exprng) in &ranges {
                if self.spectrograph.check_frame_type(*ftype, &row.meta, *exprng) {
                    types.insert(*ftype);
                }
            }
            if types.is_empty() {
                tracing::warn!("⚠️  Could not determine the frame type of {}", row.meta.filename);
            }
            row.frametype = types;
        }
        let typed = self.rows.iter().filter(|r| !r.frametype.is_empty()).count();
        tracing::info!("🏷️  Typing completed: {} of {} frames typed", typed, self.rows.len());
    }

    /// Replace the frame type of one file, e.g. from a reduction file.
    pub fn set_frame_type(&mut self, filename: &str, frametype: FrameTypeSet) -> bool {
        match self.rows.iter_mut().find(|r| r.meta.filename == filename) {
            Some(row) => {
                row.frametype = frametype;
                true
            }
            None => false,
        }
    }

    /// Key used to attach a configuration-independent frame to setups, or
    /// `None` when the frame depends on the configuration.
    fn independent_key(&self, frametype: FrameTypeSet) -> Option<MetaKey> {
        let independent = self.spectrograph.config_independent_frames();
        let mut key = None;
        for ftype in frametype.iter() {
            let found = independent.iter().find(|(t, _)| *t == ftype)?;
            key = Some(found.1);
        }
        key
    }

    fn same_configuration(
        &self,
        a: &[(MetaKey, Option<MetaValue>)],
        b: &[(MetaKey, Option<MetaValue>)],
    ) -> bool {
        a.len() == b.len()
            && a.iter().zip(b).all(|((ka, va), (kb, vb))| {
                ka == kb
                    && match (va, vb) {
                        (Some(x), Some(y)) => x.matches(y, self.spectrograph.meta_rtol(*ka)),
                        (None, None) => true,
                        _ => false,
                    }
            })
    }

    /// Group typed frames into unique configurations and attach the
    /// configuration-independent calibrations.
    pub fn set_configurations(&mut self) {
        let mut setups: Vec<SetupConfig> = Vec::new();
        let mut assigned: Vec<Vec<String>> = vec![Vec::new(); self.rows.len()];

        for (i, row) in self.rows.iter().enumerate() {
            if row.frametype.is_empty() || self.independent_key(row.frametype).is_some() {
                continue;
            }
            let values = configuration_of(self.spectrograph, &row.meta);
            let name = match setups
                .iter()
                .find(|s| self.same_configuration(&s.values, &values))
            {
                Some(setup) => setup.name.clone(),
                None => {
                    let name = setup_name(setups.len());
                    tracing::debug!("New setup {} from {}", name, row.meta.filename);
                    setups.push(SetupConfig {
                        name: name.clone(),
                        values,
                    });
                    name
                }
            };
            assigned[i].push(name);
        }

        let all_names: Vec<String> = setups.iter().map(|s| s.name.clone()).collect();
        for (i, row) in self.rows.iter().enumerate() {
            let Some(key) = self.independent_key(row.frametype) else {
                continue;
            };
            let value = row.meta.get(key);
            let mut names: Vec<String> = self
                .rows
                .iter()
                .zip(&assigned)
                .filter(|(other, _)| value.is_some() && other.meta.get(key) == value)
                .flat_map(|(_, names)| names.iter().cloned())
                .collect();
            names.sort();
            names.dedup();
            assigned[i] = if names.is_empty() { all_names.clone() } else { names };
        }

        for (row, names) in self.rows.iter_mut().zip(assigned) {
            row.setups = names;
        }
        tracing::info!("⚙️  Found {} unique configuration(s)", setups.len());
        self.setups = setups;
    }

    pub fn unique_configurations(&self) -> &[SetupConfig] {
        &self.setups
    }

    pub fn setup(&self, name: &str) -> Option<&SetupConfig> {
        self.setups.iter().find(|s| s.name == name)
    }

    /// Frames of a type, optionally restricted to one setup.
    pub fn find_frames(&self, ftype: FrameType, setup: Option<&str>) -> Vec<&FrameRow> {
        self.rows
            .iter()
            .filter(|r| r.frametype.contains(ftype))
            .filter(|r| setup.is_none_or(|s| r.in_setup(s)))
            .collect()
    }

    pub fn frames_in_setup(&self, setup: &str) -> Vec<&FrameRow> {
        self.rows.iter().filter(|r| r.in_setup(setup)).collect()
    }

    /// Arc lamps used by the arc frames of a setup.
    pub fn lamps_for_setup(&self, setup: &str) -> Vec<String> {
        let arcs: Vec<&FrameMeta> = self
            .find_frames(FrameType::Arc, Some(setup))
            .into_iter()
            .map(|r| &r.meta)
            .collect();
        self.spectrograph.lamps_from_frames(&arcs)
    }

    /// Column-aligned `|` table of the given keys.
    pub fn format_table(&self, keys: &[MetaKey], rows: &[&FrameRow]) -> Vec<String> {
        let mut header: Vec<String> = vec!["filename".to_string(), "frametype".to_string()];
        header.extend(keys.iter().map(|k| k.to_string()));
        header.push("setup".to_string());

        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|row| {
                let mut line = vec![row.meta.filename.clone(), row.frametype.to_string()];
                line.extend(keys.iter().map(|k| row.meta.display(*k)));
                line.push(if row.setups.is_empty() {
                    "None".to_string()
                } else {
                    row.setups.join(",")
                });
                line
            })
            .collect();

        let widths: Vec<usize> = (0..header.len())
            .map(|i| {
                cells
                    .iter()
                    .map(|c| c[i].len())
                    .chain(std::iter::once(header[i].len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();
        let render = |line: &[String]| {
            let padded: Vec<String> = line
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:>w$}", c, w = *w))
                .collect();
            format!("| {} |", padded.join(" | "))
        };

        std::iter::once(render(&header))
            .chain(cells.iter().map(|c| render(c)))
            .collect()
    }
}
