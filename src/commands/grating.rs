use anyhow::Result;
use std::path::PathBuf;

use crate::cli::OutputFormat;
use crate::spectrographs::optics::GratingSetting;
use crate::spectrographs::KeckDeimos;

pub fn show_grating(paths: &[PathBuf], format: OutputFormat) -> Result<Vec<GratingSetting>> {
    let deimos = KeckDeimos::new();
    let settings = paths
        .iter()
        .map(|p| deimos.grating(p))
        .collect::<Result<Vec<_>>>()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&settings)?),
        OutputFormat::Text => {
            for (path, g) in paths.iter().zip(&settings) {
                println!(
                    "{}: slider {} {} ({} l/mm) central {:.1} A  tilt {:.4} roll {:.4} yaw {:.4}",
                    path.display(),
                    g.slider,
                    g.name,
                    g.ruling,
                    g.central_wave,
                    g.tilt,
                    g.roll,
                    g.yaw
                );
            }
        }
    }
    Ok(settings)
}
