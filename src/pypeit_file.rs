//! Reduction files: user parameters, setup block and data table.
//!
//! ```text
//! [rdx]
//!     spectrograph = keck_deimos
//!
//! setup read
//! Setup A:
//!   dispname: 830G
//! setup end
//!
//! data read
//!  path /data/deimos/raw
//! |        filename | frametype | ... | setup |
//! | d0101_0057.fits |   science | ... |     A |
//! data end
//! ```

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::framematch::FrameTypeSet;
use crate::metadata::{FrameRow, FrameTable};

/// One row of the data block.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub filename: String,
    pub frametype: FrameTypeSet,
    pub setups: Vec<String>,
    /// Remaining columns as written.
    pub values: BTreeMap<String, String>,
}

/// Contents of a parsed reduction file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PypeItFile {
    pub cfg_lines: Vec<String>,
    /// Setup name and its `key: value` pairs.
    pub setups: Vec<(String, Vec<(String, String)>)>,
    pub paths: Vec<PathBuf>,
    pub rows: Vec<DataRow>,
}

impl PypeItFile {
    /// Full path of a data row, taken from the first `path` entry that
    /// holds the file.
    pub fn resolve(&self, row: &DataRow) -> Option<PathBuf> {
        self.paths
            .iter()
            .map(|p| p.join(&row.filename))
            .find(|p| p.exists())
    }
}

/// Render the reduction file for the given setups (all when `setups` is
/// empty).
pub fn render(table: &FrameTable<'_>, cfg_lines: &[String], setups: &[String]) -> String {
    let spectrograph = table.spectrograph();
    let selected: Vec<&str> = if setups.is_empty() {
        table
            .unique_configurations()
            .iter()
            .map(|s| s.name.as_str())
            .collect()
    } else {
        setups.iter().map(String::as_str).collect()
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "# Auto-generated reduction file for {} using {} {}",
        spectrograph.name(),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    let _ = writeln!(out, "# UTC {}", chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S"));
    out.push('\n');

    out.push_str("# User-defined execution parameters\n");
    for line in cfg_lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');

    out.push_str("# Setup\nsetup read\n");
    for name in &selected {
        if let Some(setup) = table.setup(name) {
            let _ = writeln!(out, "Setup {}:", setup.name);
            for (key, value) in &setup.values {
                let value = value.as_ref().map_or("None".to_string(), |v| v.to_string());
                let _ = writeln!(out, "  {}: {}", key, value);
            }
        }
    }
    out.push_str("setup end\n\n");

    let rows: Vec<&FrameRow> = table
        .rows()
        .iter()
        .filter(|r| r.setups.iter().any(|s| selected.contains(&s.as_str())))
        .collect();
    let mut dirs: Vec<&Path> = rows.iter().map(|r| r.meta.directory.as_path()).collect();
    dirs.sort();
    dirs.dedup();

    out.push_str("# Data block\ndata read\n");
    for dir in dirs {
        let _ = writeln!(out, " path {}", dir.display());
    }
    for line in table.format_table(&spectrograph.pypeit_file_keys(), &rows) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str("data end\n");
    out
}

/// Write the reduction file to `path`.
pub fn write(
    path: &Path,
    table: &FrameTable<'_>,
    cfg_lines: &[String],
    setups: &[String],
) -> Result<()> {
    std::fs::write(path, render(table, cfg_lines, setups))
        .with_context(|| format!("Failed to write reduction file: {}", path.display()))?;
    tracing::info!("📝 Wrote reduction file: {}", path.display());
    Ok(())
}

fn split_cells(line: &str) -> Vec<String> {
    line.trim()
        .trim_matches('|')
        .split('|')
        .map(|c| c.trim().to_string())
        .collect()
}

/// Parse reduction file text.
pub fn parse(text: &str) -> Result<PypeItFile> {
    #[derive(PartialEq)]
    enum Block {
        Cfg,
        Setup,
        Data,
    }

    let mut file = PypeItFile::default();
    let mut block = Block::Cfg;
    let mut columns: Option<Vec<String>> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match trimmed {
            "setup read" => {
                block = Block::Setup;
                continue;
            }
            "data read" => {
                block = Block::Data;
                continue;
            }
            "setup end" | "data end" => {
                block = Block::Cfg;
                continue;
            }
            _ => {}
        }

        match block {
            Block::Cfg => file.cfg_lines.push(raw.trim_end().to_string()),
            Block::Setup => {
                if let Some(name) = trimmed
                    .strip_prefix("Setup ")
                    .and_then(|s| s.strip_suffix(':'))
                {
                    file.setups.push((name.trim().to_string(), Vec::new()));
                } else if let Some((key, value)) = trimmed.split_once(':') {
                    let Some((_, values)) = file.setups.last_mut() else {
                        bail!("line {}: setup value outside a setup: {}", line_no, trimmed);
                    };
                    values.push((key.trim().to_string(), value.trim().to_string()));
                } else {
                    bail!("line {}: cannot parse setup line: {}", line_no, trimmed);
                }
            }
            Block::Data => {
                if let Some(path) = trimmed.strip_prefix("path ") {
                    file.paths.push(PathBuf::from(path.trim()));
                    continue;
                }
                if !trimmed.starts_with('|') {
                    bail!("line {}: cannot parse data line: {}", line_no, trimmed);
                }
                let cells = split_cells(trimmed);
                if columns.is_none() {
                    if !cells.iter().any(|c| c == "filename") {
                        bail!("line {}: data table has no filename column", line_no);
                    }
                    columns = Some(cells);
                    continue;
                }
                let Some(cols) = &columns else {
                    continue;
                };
                if cells.len() != cols.len() {
                    bail!(
                        "line {}: expected {} columns, found {}",
                        line_no,
                        cols.len(),
                        cells.len()
                    );
                }
                let mut values: BTreeMap<String, String> =
                    cols.iter().cloned().zip(cells).collect();
                let filename = values.remove("filename").unwrap_or_default();
                let frametype = match values.remove("frametype") {
                    Some(f) => f
                        .parse::<FrameTypeSet>()
                        .with_context(|| format!("line {}: bad frametype", line_no))?,
                    None => FrameTypeSet::empty(),
                };
                let setups = match values.remove("setup").as_deref() {
                    None | Some("None") | Some("") => Vec::new(),
                    Some(s) => s.split(',').map(|x| x.trim().to_string()).collect(),
                };
                file.rows.push(DataRow {
                    filename,
                    frametype,
                    setups,
                    values,
                });
            }
        }
    }

    if block != Block::Cfg {
        bail!("Reduction file ended inside a setup or data block");
    }
    Ok(file)
}

pub fn read(path: &Path) -> Result<PypeItFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read reduction file: {}", path.display()))?;
    parse(&text).with_context(|| format!("Failed to parse reduction file: {}", path.display()))
}
