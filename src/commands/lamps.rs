use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::spectrographs::load_spectrograph;

use super::{load_par, scan_frames};

/// Arc lamps recorded in the arc frames of each setup.
pub fn show_lamps(config: &Config, root: &Path) -> Result<Vec<(String, Vec<String>)>> {
    let spectrograph = load_spectrograph(&config.get_spectrograph())?;
    let par = load_par(spectrograph.as_ref(), config)?;
    let table = scan_frames(
        spectrograph.as_ref(),
        root,
        &config.get_extension(),
        false,
        &par,
    )?;

    let mut result = Vec::new();
    for setup in table.unique_configurations() {
        let lamps = table.lamps_for_setup(&setup.name);
        if lamps.is_empty() {
            println!("Setup {}: no arc frames", setup.name);
        } else {
            println!("Setup {}: {}", setup.name, lamps.join(", "));
        }
        result.push((setup.name.clone(), lamps));
    }
    Ok(result)
}
