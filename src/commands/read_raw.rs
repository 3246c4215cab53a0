use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::render::{percentile, render_png, RenderOptions};
use crate::spectrographs::load_spectrograph;

/// What `read-raw` reports about a frame.
#[derive(Debug, Clone, Serialize)]
pub struct RawSummary {
    pub filename: String,
    pub det: Option<usize>,
    pub shape: (usize, usize),
    pub exptime: f64,
    pub binning: String,
    pub data_pixels: usize,
    pub overscan_pixels: usize,
    pub data_median: Option<f64>,
    pub overscan_median: Option<f64>,
}

pub fn read_raw(
    config: &Config,
    path: &Path,
    det: Option<usize>,
    png: Option<&Path>,
    format: OutputFormat,
) -> Result<RawSummary> {
    let spectrograph = load_spectrograph(&config.get_spectrograph())?;
    let raw = spectrograph.read_raw(path, det)?;

    let (data_pixels, overscan_pixels) = raw.section_counts();
    let select = |sec: &nalgebra::DMatrix<u8>| -> Vec<f64> {
        raw.image
            .iter()
            .zip(sec.iter())
            .filter(|(_, s)| **s > 0)
            .map(|(v, _)| *v)
            .collect()
    };
    let summary = RawSummary {
        filename: raw.filename.display().to_string(),
        det,
        shape: raw.shape(),
        exptime: raw.exptime,
        binning: raw.detector.binning.clone(),
        data_pixels,
        overscan_pixels,
        data_median: percentile(&select(&raw.datasec_img), 50.0),
        overscan_median: percentile(&select(&raw.oscansec_img), 50.0),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            let median = |m: Option<f64>| m.map_or("None".to_string(), |v| format!("{:.2}", v));
            println!("File:      {}", summary.filename);
            println!(
                "Detector:  {}",
                det.map_or("mosaic".to_string(), |d| d.to_string())
            );
            println!("Shape:     {} x {}", summary.shape.0, summary.shape.1);
            println!("Exptime:   {} s", summary.exptime);
            println!("Binning:   {}", summary.binning);
            println!(
                "Data:      {} pixels, median {}",
                data_pixels,
                median(summary.data_median)
            );
            println!(
                "Overscan:  {} pixels, median {}",
                overscan_pixels,
                median(summary.overscan_median)
            );
        }
    }

    if let Some(png) = png {
        render_png(&raw.image, None, png, &RenderOptions::default())?;
    }
    Ok(summary)
}
