use anyhow::Result;
use std::path::PathBuf;

use crate::meta::MetaKey;
use crate::spectrographs::{KeckDeimos, Spectrograph};

/// Offsets along the slit of each frame, relative to the earliest.
pub fn show_tel_offsets(paths: &[PathBuf]) -> Result<Vec<(String, f64)>> {
    let deimos = KeckDeimos::new();
    let offsets = deimos.telescope_offsets(paths)?;

    let mut frames = Vec::with_capacity(paths.len());
    for path in paths {
        let meta = deimos.meta_from_file(path)?;
        frames.push((meta.filename.clone(), meta.get_f64(MetaKey::Mjd).unwrap_or(f64::NAN)));
    }
    frames.sort_by(|a, b| a.1.total_cmp(&b.1));

    let result: Vec<(String, f64)> = frames
        .into_iter()
        .zip(offsets)
        .map(|((name, _), offset)| (name, offset))
        .collect();
    for (name, offset) in &result {
        println!("{:<24} {:>8.3} arcsec", name, offset);
    }
    Ok(result)
}
