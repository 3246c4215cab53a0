pub mod bpm;
pub mod chk_for_calibs;
pub mod detector;
pub mod grating;
pub mod lamps;
pub mod read_raw;
pub mod setup;
pub mod show_header;
pub mod show_par;
pub mod tel_offset;

pub use bpm::show_bpm;
pub use chk_for_calibs::chk_for_calibs;
pub use detector::show_detectors;
pub use grating::show_grating;
pub use lamps::show_lamps;
pub use read_raw::read_raw;
pub use setup::run_setup;
pub use show_header::show_header;
pub use show_par::show_par;
pub use tel_offset::show_tel_offsets;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

use crate::config::Config;
use crate::directory_tree::find_raw_files;
use crate::metadata::FrameTable;
use crate::par::ParSet;
use crate::spectrographs::Spectrograph;

/// Merge the user parameter file named in the config, if any.
pub fn apply_user_par(mut par: ParSet, config: &Config) -> Result<ParSet> {
    if let Some(path) = config.get_user_par() {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read parameter file: {}", path.display()))?;
        let lines: Vec<&str> = text.lines().collect();
        par.merge_cfg_lines(&lines)
            .with_context(|| format!("Invalid parameter file: {}", path.display()))?;
        tracing::debug!("Merged user parameters from {}", path.display());
    }
    Ok(par)
}

/// Instrument defaults with the user's parameters on top.
pub fn load_par(spectrograph: &dyn Spectrograph, config: &Config) -> Result<ParSet> {
    apply_user_par(spectrograph.default_par()?, config)
}

/// Drop unusable frames, assign frame types and group into setups.
pub fn type_and_group(table: &mut FrameTable<'_>, par: &ParSet) {
    let removed = table.remove_invalid();
    if removed > 0 {
        tracing::warn!("⚠️  Removed {} frames with unsupported settings", removed);
    }
    table.get_frame_types(par);
    table.set_configurations();
    tracing::info!(
        "🔭 {} frames in {} setups",
        table.len(),
        table.unique_configurations().len()
    );
}

/// Read every raw frame under `root` into a typed, grouped table.
pub fn scan_frames<'a>(
    spectrograph: &'a dyn Spectrograph,
    root: &Path,
    extension: &str,
    strict: bool,
    par: &ParSet,
) -> Result<FrameTable<'a>> {
    let files = find_raw_files(root, extension)?;
    let mut table = FrameTable::from_files(spectrograph, &files, strict)?;
    type_and_group(&mut table, par);
    Ok(table)
}

pub fn open_catalog(config: &Config) -> Result<Connection> {
    let conn = Connection::open(&config.database.path)
        .with_context(|| format!("Failed to open database: {}", config.database.path))?;
    crate::db::Database::new(&conn).create_schema()?;
    Ok(conn)
}
