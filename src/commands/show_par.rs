use anyhow::{Context, Result};
use std::path::Path;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::spectrographs::load_spectrograph;

use super::apply_user_par;

/// Print the parameters a reduction would use: instrument defaults,
/// configuration-specific changes for `file`, then the user's file.
pub fn show_par(
    config: &Config,
    file: Option<&Path>,
    changed: bool,
    format: OutputFormat,
) -> Result<()> {
    let spectrograph = load_spectrograph(&config.get_spectrograph())?;
    let mut par = spectrograph.default_par()?;
    if let Some(file) = file {
        let meta = spectrograph.meta_from_file(file)?;
        par = spectrograph
            .config_specific_par(&meta, par)
            .with_context(|| format!("Failed to apply parameters for {}", file.display()))?;
    }
    let par = apply_user_par(par, config)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&par.to_json())?),
        OutputFormat::Text => {
            let lines = if changed {
                par.changed_config()
            } else {
                par.to_config()
            };
            for line in lines {
                println!("{}", line);
            }
        }
    }
    Ok(())
}
