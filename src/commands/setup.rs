use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::db::Database;
use crate::pypeit_file;
use crate::spectrographs::load_spectrograph;

use super::{load_par, open_catalog, scan_frames};

/// Write one reduction file per selected setup and return their paths.
pub fn run_setup(
    config: &Config,
    root: &Path,
    setups: &[String],
    strict: bool,
    save_catalog: bool,
) -> Result<Vec<PathBuf>> {
    let spectrograph = load_spectrograph(&config.get_spectrograph())?;
    let par = load_par(spectrograph.as_ref(), config)?;
    let table = scan_frames(
        spectrograph.as_ref(),
        root,
        &config.get_extension(),
        strict,
        &par,
    )?;

    let available: Vec<String> = table
        .unique_configurations()
        .iter()
        .map(|s| s.name.clone())
        .collect();
    let selected: Vec<String> = if setups.iter().any(|s| s.eq_ignore_ascii_case("all")) {
        available.clone()
    } else {
        for setup in setups {
            if !available.contains(setup) {
                bail!(
                    "Setup {} not found; available setups: {}",
                    setup,
                    available.join(", ")
                );
            }
        }
        setups.to_vec()
    };

    let name = spectrograph.name();
    let cfg_lines = vec![
        "[rdx]".to_string(),
        format!("    spectrograph = {}", name),
    ];

    let output = config.get_output_directory();
    let mut written = Vec::with_capacity(selected.len());
    for setup in &selected {
        let dir = output.join(format!("{}_{}", name, setup));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        let path = dir.join(format!("{}_{}.pypeit", name, setup));
        pypeit_file::write(&path, &table, &cfg_lines, std::slice::from_ref(setup))?;
        written.push(path);
    }

    println!("Setups found: {}", available.join(", "));
    for setup in table.unique_configurations() {
        let values: Vec<String> = setup
            .values
            .iter()
            .map(|(k, v)| {
                let v = v.as_ref().map_or("None".to_string(), |v| v.to_string());
                format!("{}={}", k, v)
            })
            .collect();
        println!(
            "  {}: {} frames  [{}]",
            setup.name,
            table.frames_in_setup(&setup.name).len(),
            values.join(", ")
        );
    }
    for path in &written {
        println!("Wrote {}", path.display());
    }

    if save_catalog {
        let conn = open_catalog(config)?;
        let count = Database::new(&conn).save_table(&table)?;
        tracing::info!("💾 Stored {} frames in {}", count, config.database.path);
    }

    Ok(written)
}
