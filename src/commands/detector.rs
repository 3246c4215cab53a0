use anyhow::Result;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::spectrographs::{load_spectrograph, DetectorPar};

pub fn show_detectors(
    config: &Config,
    det: Option<usize>,
    binning: &str,
    format: OutputFormat,
) -> Result<Vec<DetectorPar>> {
    let spectrograph = load_spectrograph(&config.get_spectrograph())?;
    let dets: Vec<usize> = match det {
        Some(d) => vec![d],
        None => (1..=spectrograph.ndet()).collect(),
    };
    let pars = dets
        .into_iter()
        .map(|d| spectrograph.detector_par(d, Some(binning)))
        .collect::<Result<Vec<_>>>()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&pars)?),
        OutputFormat::Text => {
            println!(
                "{:>3} {:>4} {:>6} {:>10} {:>8} {:>8} {:>7} {:>7}",
                "det", "ext", "scale", "saturation", "nonlin", "darkcurr", "gain", "ronoise"
            );
            for p in &pars {
                println!(
                    "{:>3} {:>4} {:>6.4} {:>10.1} {:>8.2} {:>8.2} {:>7.3} {:>7.2}",
                    p.det,
                    p.dataext,
                    p.platescale,
                    p.saturation,
                    p.nonlinear,
                    p.darkcurr,
                    p.gain.first().copied().unwrap_or(f64::NAN),
                    p.ronoise.first().copied().unwrap_or(f64::NAN),
                );
            }
        }
    }
    Ok(pars)
}
