//! Hierarchical reduction parameters and the nested-bracket config syntax.
//!
//! A parameter file looks like:
//!
//! ```text
//! [rdx]
//!     spectrograph = keck_deimos
//! [calibrations]
//!     [[slitedges]]
//!         edge_thresh = 10
//!     [[wavelengths]]
//!         lamps = ArI, NeI, KrI, XeI, CdI, ZnI, HgI
//! ```
//!
//! Section depth is given by the number of brackets. Several headers may
//! share a line (`[calibrations][[slitedges]] edge_thresh = 10`).

pub mod pypeitpar;
pub mod value;

use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use std::sync::OnceLock;
use thiserror::Error;

pub use pypeitpar::{default_pypeit_par, from_cfg_lines, process_images_par};
pub use value::{ParType, ParValue};

/// Errors raised while building, reading or modifying parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ParError {
    #[error("'{key}' is not a valid parameter of [{section}]")]
    UnknownParameter { key: String, section: String },
    #[error("'{name}' is not a valid parameter group of [{section}]")]
    UnknownGroup { name: String, section: String },
    #[error("section '{name}' at depth {depth} cannot follow a section at depth {current}")]
    WrongLevel {
        name: String,
        depth: usize,
        current: usize,
    },
    #[error("invalid value '{value}' for '{key}': expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: ParType,
    },
    #[error("invalid value '{value}' for '{key}': options are {}", options.join(", "))]
    InvalidOption {
        key: String,
        value: String,
        options: Vec<String>,
    },
    #[error("line {line_no}: cannot parse '{line}'")]
    Malformed { line_no: usize, line: String },
    #[error("'{0}' is a parameter group, not a value")]
    NotAValue(String),
}

/// One typed parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Par {
    pub value: ParValue,
    pub default: ParValue,
    pub dtype: ParType,
    pub options: Option<Vec<String>>,
    pub descr: String,
}

impl Par {
    fn check_options(&self, key: &str, value: &ParValue) -> Result<(), ParError> {
        let Some(options) = &self.options else {
            return Ok(());
        };
        let values: Vec<&ParValue> = match value {
            ParValue::List(items) => items.iter().collect(),
            other => vec![other],
        };
        for v in values {
            if let ParValue::Str(s) = v {
                if !options.iter().any(|o| o == s) {
                    return Err(ParError::InvalidOption {
                        key: key.to_string(),
                        value: s.clone(),
                        options: options.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParEntry {
    Value(Par),
    Group(ParSet),
}

/// Ordered, named collection of parameters and sub-groups.
#[derive(Debug, Clone, PartialEq)]
pub struct ParSet {
    name: String,
    entries: Vec<(String, ParEntry)>,
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\[+)\s*([A-Za-z0-9_]+)\s*(\]+)").expect("header regex is valid")
    })
}

impl ParSet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a parameter with its default value.
    pub fn with(
        self,
        key: &str,
        dtype: ParType,
        default: impl Into<ParValue>,
        descr: &str,
    ) -> Self {
        self.with_options(key, dtype, default, &[], descr)
    }

    /// Add a parameter restricted to a fixed set of string options.
    pub fn with_options(
        mut self,
        key: &str,
        dtype: ParType,
        default: impl Into<ParValue>,
        options: &[&str],
        descr: &str,
    ) -> Self {
        // Built-in defaults are checked against their types by the tests
        let default = default.into();
        let default = match default.clone().coerce(key, dtype) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("⚠️  Keeping uncoerced default: {}", e);
                default
            }
        };
        self.entries.push((
            key.to_string(),
            ParEntry::Value(Par {
                value: default.clone(),
                default,
                dtype,
                options: if options.is_empty() {
                    None
                } else {
                    Some(options.iter().map(|o| o.to_string()).collect())
                },
                descr: descr.to_string(),
            }),
        ));
        self
    }

    pub fn with_group(mut self, group: ParSet) -> Self {
        self.entries.push((group.name.clone(), ParEntry::Group(group)));
        self
    }

    fn entry(&self, key: &str) -> Option<&ParEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    fn entry_mut(&mut self, key: &str) -> Option<&mut ParEntry> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, e)| e)
    }

    /// Sub-group at a dotted path, e.g. `calibrations.slitedges`.
    pub fn group(&self, path: &str) -> Option<&ParSet> {
        path.split('.')
            .filter(|p| !p.is_empty())
            .try_fold(self, |set, key| match set.entry(key) {
                Some(ParEntry::Group(g)) => Some(g),
                _ => None,
            })
    }

    pub fn group_mut(&mut self, path: &str) -> Option<&mut ParSet> {
        let mut set = self;
        for key in path.split('.').filter(|p| !p.is_empty()) {
            set = match set.entry_mut(key) {
                Some(ParEntry::Group(g)) => g,
                _ => return None,
            };
        }
        Some(set)
    }

    fn split_path(path: &str) -> (&str, &str) {
        match path.rsplit_once('.') {
            Some((group, key)) => (group, key),
            None => ("", path),
        }
    }

    pub fn par(&self, path: &str) -> Option<&Par> {
        let (group, key) = Self::split_path(path);
        match self.group(group)?.entry(key)? {
            ParEntry::Value(p) => Some(p),
            ParEntry::Group(_) => None,
        }
    }

    /// Current value at a dotted path.
    pub fn get(&self, path: &str) -> Option<&ParValue> {
        self.par(path).map(|p| &p.value)
    }

    pub fn get_bool(&self, path: &str) -> bool {
        self.get(path).and_then(ParValue::as_bool).unwrap_or(false)
    }

    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(ParValue::as_f64)
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(ParValue::as_i64)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(ParValue::as_str)
    }

    pub fn get_str_list(&self, path: &str) -> Vec<String> {
        self.get(path)
            .and_then(ParValue::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_i64_list(&self, path: &str) -> Option<Vec<i64>> {
        self.get(path)
            .and_then(ParValue::as_list)
            .map(|items| items.iter().filter_map(ParValue::as_i64).collect())
    }

    /// Two-element float range such as `exprng`; missing bounds are `None`.
    pub fn get_range(&self, path: &str) -> [Option<f64>; 2] {
        let items = self.get(path).and_then(ParValue::as_list).unwrap_or(&[]);
        [
            items.first().and_then(ParValue::as_f64),
            items.get(1).and_then(ParValue::as_f64),
        ]
    }

    /// Set a value at a dotted path, checking its type and options.
    pub fn set(&mut self, path: &str, value: impl Into<ParValue>) -> Result<(), ParError> {
        let (group_path, key) = Self::split_path(path);
        let section = self.section_label(group_path);
        let group = self
            .group_mut(group_path)
            .ok_or_else(|| ParError::UnknownGroup {
                name: group_path.to_string(),
                section: section.clone(),
            })?;
        group.set_local(key, value.into(), &section)
    }

    fn section_label(&self, group_path: &str) -> String {
        if group_path.is_empty() {
            self.name.clone()
        } else {
            group_path.replace('.', "][")
        }
    }

    fn set_local(&mut self, key: &str, value: ParValue, section: &str) -> Result<(), ParError> {
        match self.entry_mut(key) {
            Some(ParEntry::Value(par)) => {
                let value = value.coerce(key, par.dtype)?;
                par.check_options(key, &value)?;
                par.value = value;
                Ok(())
            }
            Some(ParEntry::Group(_)) => Err(ParError::NotAValue(key.to_string())),
            None => Err(ParError::UnknownParameter {
                key: key.to_string(),
                section: section.to_string(),
            }),
        }
    }

    fn set_local_from_str(&mut self, key: &str, text: &str, section: &str) -> Result<(), ParError> {
        let dtype = match self.entry(key) {
            Some(ParEntry::Value(par)) => par.dtype,
            Some(ParEntry::Group(_)) => return Err(ParError::NotAValue(key.to_string())),
            None => {
                return Err(ParError::UnknownParameter {
                    key: key.to_string(),
                    section: section.to_string(),
                })
            }
        };
        let value = ParValue::parse(key, text, dtype)?;
        self.set_local(key, value, section)
    }

    /// Apply config lines on top of the current values.
    pub fn merge_cfg_lines<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<(), ParError> {
        let mut stack: Vec<String> = Vec::new();

        for (idx, raw) in lines.iter().enumerate() {
            let line_no = idx + 1;
            let line = raw.as_ref();
            let line = line.split_once('#').map_or(line, |(l, _)| l).trim();
            if line.is_empty() {
                continue;
            }

            let mut rest = line;
            while rest.starts_with('[') {
                let caps = header_regex()
                    .captures(rest)
                    .ok_or_else(|| ParError::Malformed {
                        line_no,
                        line: line.to_string(),
                    })?;
                let (open, name, close) = (&caps[1], caps[2].to_string(), &caps[3]);
                if open.len() != close.len() {
                    return Err(ParError::Malformed {
                        line_no,
                        line: line.to_string(),
                    });
                }
                let depth = open.len();
                if depth > stack.len() + 1 {
                    return Err(ParError::WrongLevel {
                        name,
                        depth,
                        current: stack.len(),
                    });
                }
                stack.truncate(depth - 1);
                let parent = stack.join(".");
                let exists = matches!(
                    self.group(&parent).and_then(|g| g.entry(&name)),
                    Some(ParEntry::Group(_))
                );
                if !exists {
                    return Err(ParError::UnknownGroup {
                        name,
                        section: if parent.is_empty() {
                            self.name.clone()
                        } else {
                            self.section_label(&parent)
                        },
                    });
                }
                stack.push(name);
                rest = rest[caps[0].len()..].trim_start();
            }

            if rest.is_empty() {
                continue;
            }

            let (key, text) = rest.split_once('=').ok_or_else(|| ParError::Malformed {
                line_no,
                line: line.to_string(),
            })?;
            let path = stack.join(".");
            let section = self.section_label(&path);
            let unknown = || ParError::UnknownParameter {
                key: key.trim().to_string(),
                section: section.clone(),
            };
            // Values never live at the top level
            if path.is_empty() {
                return Err(unknown());
            }
            let group = self.group_mut(&path).ok_or_else(unknown)?;
            group.set_local_from_str(key.trim(), text, &section)?;
        }
        Ok(())
    }

    /// Serialize every value back into config lines.
    pub fn to_config(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (key, entry) in &self.entries {
            if let ParEntry::Group(group) = entry {
                group.write_config(key, 1, &mut lines);
            }
        }
        lines
    }

    fn write_config(&self, name: &str, depth: usize, lines: &mut Vec<String>) {
        let indent = "    ".repeat(depth - 1);
        lines.push(format!(
            "{}{}{}{}",
            indent,
            "[".repeat(depth),
            name,
            "]".repeat(depth)
        ));
        for (key, entry) in &self.entries {
            if let ParEntry::Value(par) = entry {
                lines.push(format!("{}    {} = {}", indent, key, par.value));
            }
        }
        for (key, entry) in &self.entries {
            if let ParEntry::Group(group) = entry {
                group.write_config(key, depth + 1, lines);
            }
        }
    }

    /// Only the values that differ from their defaults, as config lines.
    pub fn changed_config(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (key, entry) in &self.entries {
            if let ParEntry::Group(group) = entry {
                group.write_changed(key, 1, &mut lines);
            }
        }
        lines
    }

    fn write_changed(&self, name: &str, depth: usize, lines: &mut Vec<String>) -> bool {
        let mut own = Vec::new();
        for (key, entry) in &self.entries {
            if let ParEntry::Value(par) = entry {
                if par.value != par.default {
                    own.push(format!("{}    {} = {}", "    ".repeat(depth - 1), key, par.value));
                }
            }
        }
        let mut nested = Vec::new();
        for (key, entry) in &self.entries {
            if let ParEntry::Group(group) = entry {
                group.write_changed(key, depth + 1, &mut nested);
            }
        }
        if own.is_empty() && nested.is_empty() {
            return false;
        }
        lines.push(format!(
            "{}{}{}{}",
            "    ".repeat(depth - 1),
            "[".repeat(depth),
            name,
            "]".repeat(depth)
        ));
        lines.extend(own);
        lines.extend(nested);
        true
    }

    /// Set `key` in every `process` group (science and every calibration frame).
    pub fn reset_all_processimages_par(
        &mut self,
        key: &str,
        value: impl Into<ParValue>,
    ) -> Result<(), ParError> {
        let value = value.into();
        let mut found = false;
        self.visit_groups_mut(&mut |name: &str, group: &mut ParSet| {
            if name == "process" {
                found = true;
                group.set_local(key, value.clone(), "process")
            } else {
                Ok(())
            }
        })?;
        if !found {
            return Err(ParError::UnknownGroup {
                name: "process".to_string(),
                section: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Copy the values of `proc` into every `process` group.
    pub fn sync_processing(&mut self, proc: &ParSet) -> Result<(), ParError> {
        self.visit_groups_mut(&mut |name: &str, group: &mut ParSet| {
            if name != "process" {
                return Ok(());
            }
            for (key, entry) in &proc.entries {
                if let ParEntry::Value(par) = entry {
                    group.set_local(key, par.value.clone(), "process")?;
                }
            }
            Ok(())
        })
    }

    fn visit_groups_mut(
        &mut self,
        f: &mut dyn FnMut(&str, &mut ParSet) -> Result<(), ParError>,
    ) -> Result<(), ParError> {
        for (key, entry) in self.entries.iter_mut() {
            if let ParEntry::Group(group) = entry {
                f(key.as_str(), group)?;
                group.visit_groups_mut(f)?;
            }
        }
        Ok(())
    }

    /// Nested JSON object of current values.
    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        for (key, entry) in &self.entries {
            let value = match entry {
                ParEntry::Value(par) => {
                    serde_json::to_value(&par.value).unwrap_or(JsonValue::Null)
                }
                ParEntry::Group(group) => group.to_json(),
            };
            map.insert(key.clone(), value);
        }
        JsonValue::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParSet {
        ParSet::new("root")
            .with_group(
                ParSet::new("calibrations")
                    .with_group(
                        ParSet::new("slitedges")
                            .with("edge_thresh", ParType::Float, 20.0, "threshold")
                            .with_options(
                                "sync_predict",
                                ParType::Str,
                                "pca",
                                &["pca", "nearest", "auto"],
                                "mode",
                            ),
                    )
                    .with_group(
                        ParSet::new("biasframe")
                            .with_group(ParSet::new("process").with(
                                "combine",
                                ParType::Str,
                                "mean",
                                "",
                            )),
                    ),
            )
            .with_group(ParSet::new("rdx").with("detnum", ParType::IntList, ParValue::None, ""))
    }

    #[test]
    fn test_get_and_set_paths() {
        let mut p = sample();
        assert_eq!(p.get_f64("calibrations.slitedges.edge_thresh"), Some(20.0));
        p.set("calibrations.slitedges.edge_thresh", 10).unwrap();
        assert_eq!(p.get("calibrations.slitedges.edge_thresh"), Some(&ParValue::Float(10.0)));
        p.set("rdx.detnum", vec![3i64, 7]).unwrap();
        assert_eq!(p.get_i64_list("rdx.detnum"), Some(vec![3, 7]));
        assert!(matches!(
            p.set("calibrations.slitedges.junk", 1),
            Err(ParError::UnknownParameter { .. })
        ));
        assert!(matches!(
            p.set("calibrations.slitedges.sync_predict", "spline"),
            Err(ParError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_merge_cfg_lines_nested_headers() {
        let mut p = sample();
        p.merge_cfg_lines(&[
            "# user tweaks",
            "[calibrations]",
            "  [[slitedges]]",
            "    edge_thresh = 10",
            "    sync_predict = nearest",
        ])
        .unwrap();
        assert_eq!(p.get_f64("calibrations.slitedges.edge_thresh"), Some(10.0));
        assert_eq!(p.get_str("calibrations.slitedges.sync_predict"), Some("nearest"));
    }

    #[test]
    fn test_merge_inline_headers() {
        let mut p = sample();
        p.merge_cfg_lines(&["[calibrations][[slitedges]] edge_thresh = 5"]).unwrap();
        assert_eq!(p.get_f64("calibrations.slitedges.edge_thresh"), Some(5.0));
    }

    #[test]
    fn test_bad_parameter_fails() {
        let mut p = sample();
        let err = p
            .merge_cfg_lines(&["[calibrations]", "[[biasframe]]", "[[[process]]]", "junk = True"])
            .unwrap_err();
        assert!(matches!(err, ParError::UnknownParameter { .. }));
    }

    #[test]
    fn test_bad_level_fails() {
        let mut p = sample();
        let err = p
            .merge_cfg_lines(&["[calibrations]", "[[biasframe]]", "[[process]]", "combine = median"])
            .unwrap_err();
        assert!(matches!(err, ParError::UnknownGroup { .. }));

        let err = p.merge_cfg_lines(&["[calibrations]", "[[[slitedges]]]"]).unwrap_err();
        assert!(matches!(err, ParError::WrongLevel { .. }));
    }

    #[test]
    fn test_malformed_lines() {
        let mut p = sample();
        assert!(matches!(
            p.merge_cfg_lines(&["[calibrations]]"]),
            Err(ParError::Malformed { .. })
        ));
        assert!(matches!(
            p.merge_cfg_lines(&["[rdx]", "detnum 3"]),
            Err(ParError::Malformed { .. })
        ));
        assert!(matches!(
            p.merge_cfg_lines(&["detnum = 3"]),
            Err(ParError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_to_config_round_trip() {
        let mut p = sample();
        p.set("calibrations.slitedges.edge_thresh", 12.5).unwrap();
        p.set("rdx.detnum", vec![3i64, 7]).unwrap();
        let lines = p.to_config();
        assert!(lines.contains(&"[calibrations]".to_string()));
        assert!(lines.contains(&"    [[slitedges]]".to_string()));
        assert!(lines.contains(&"        [[[process]]]".to_string()));

        let mut fresh = sample();
        fresh.merge_cfg_lines(&lines).unwrap();
        assert_eq!(fresh, p);
    }

    #[test]
    fn test_changed_config_only_lists_differences() {
        let mut p = sample();
        assert!(p.changed_config().is_empty());
        p.set("calibrations.biasframe.process.combine", "median").unwrap();
        let lines = p.changed_config();
        assert_eq!(
            lines,
            vec![
                "[calibrations]".to_string(),
                "    [[biasframe]]".to_string(),
                "        [[[process]]]".to_string(),
                "            combine = median".to_string(),
            ]
        );
    }

    #[test]
    fn test_to_json() {
        let p = sample();
        let json = p.to_json();
        assert_eq!(json["calibrations"]["slitedges"]["edge_thresh"], 20.0);
        assert!(json["rdx"]["detnum"].is_null());
    }
}
