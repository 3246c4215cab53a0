use anyhow::Result;
use nalgebra::DMatrix;
use std::path::Path;

use crate::config::Config;
use crate::parse::parse_binning;
use crate::render::{render_png, RenderOptions};
use crate::spectrographs::load_spectrograph;

/// Unbinned DEIMOS chip size: spectral rows by spatial columns.
const CHIP_SHAPE: (usize, usize) = (4096, 2048);

/// Runs of fully masked columns as `(first, last)` pairs.
pub fn masked_column_ranges(bpm: &DMatrix<u8>) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for c in 0..bpm.ncols() {
        if bpm.column(c).iter().all(|v| *v != 0) {
            match ranges.last_mut() {
                Some((_, last)) if *last + 1 == c => *last = c,
                _ => ranges.push((c, c)),
            }
        }
    }
    ranges
}

pub fn show_bpm(
    config: &Config,
    det: usize,
    file: Option<&Path>,
    binning: &str,
    png: Option<&Path>,
) -> Result<DMatrix<u8>> {
    let spectrograph = load_spectrograph(&config.get_spectrograph())?;
    // Validates the detector number
    spectrograph.detector_par(det, Some(binning))?;

    let raw = match file {
        Some(path) => Some(spectrograph.read_raw(path, Some(det))?),
        None => None,
    };
    let shape = match &raw {
        // Data columns only; overscan sits to the right
        Some(raw) => (
            raw.image.nrows(),
            raw.datasec_img.row(0).iter().filter(|v| **v > 0).count(),
        ),
        None => {
            let (binspec, binspat) = parse_binning(binning)?;
            (
                CHIP_SHAPE.0 / binspec.max(1) as usize,
                CHIP_SHAPE.1 / binspat.max(1) as usize,
            )
        }
    };

    let bpm = spectrograph.bpm(shape, det);
    let ranges = masked_column_ranges(&bpm);
    println!(
        "Detector {}: {}x{} pixels, {} masked",
        det,
        shape.0,
        shape.1,
        bpm.iter().filter(|v| **v != 0).count()
    );
    for (first, last) in &ranges {
        println!("  columns {}-{}", first, last);
    }

    if let Some(png) = png {
        let mask = bpm.map(|v| v != 0);
        match &raw {
            Some(raw) => {
                let data = raw.image.columns(0, shape.1).into_owned();
                render_png(&data, Some(&mask), png, &RenderOptions::default())?;
            }
            None => {
                let blank = DMatrix::<f64>::zeros(shape.0, shape.1);
                render_png(&blank, Some(&mask), png, &RenderOptions::default())?;
            }
        }
    }
    Ok(bpm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_column_ranges() {
        let mut bpm = DMatrix::<u8>::zeros(3, 8);
        for c in [1, 2, 3, 6] {
            bpm.column_mut(c).fill(1);
        }
        // A partly masked column is not a bad column
        bpm[(0, 4)] = 1;
        assert_eq!(masked_column_ranges(&bpm), vec![(1, 3), (6, 6)]);
    }
}
