//! Raw detector images and the errors raised while unpacking them.

use nalgebra::DMatrix;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::directory_tree::COMPRESSION_SUFFIXES;
use crate::spectrographs::detector::DetectorPar;

#[derive(Debug, Error)]
pub enum RawImageError {
    #[error("found {count} files matching {pattern}")]
    FileMatch { pattern: String, count: usize },
    #[error("only images with AMPMODE == {expected} can be reduced, found '{found}'")]
    WrongAmpMode { expected: String, found: String },
    #[error("only images with MOSMODE == {expected} can be reduced, found '{found}'")]
    WrongMosMode { expected: String, found: String },
    #[error("binning {0} is not supported for raw image assembly")]
    UnsupportedBinning(String),
    #[error("header card {card} missing from HDU {hdu}")]
    MissingCard { card: String, hdu: usize },
    #[error("bad section for chip {chip}: {reason}")]
    BadSection { chip: usize, reason: String },
    #[error("detector {det} out of range 1..={ndet}")]
    BadDetector { det: usize, ndet: usize },
}

/// A raw image plus the bookkeeping needed to process it.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub filename: PathBuf,
    pub detector: DetectorPar,
    pub image: DMatrix<f64>,
    pub exptime: f64,
    /// Amplifier number (1-indexed) for data pixels, 0 elsewhere.
    pub datasec_img: DMatrix<u8>,
    /// Amplifier number (1-indexed) for overscan pixels, 0 elsewhere.
    pub oscansec_img: DMatrix<u8>,
}

impl RawImage {
    pub fn shape(&self) -> (usize, usize) {
        self.image.shape()
    }

    /// Count of data and overscan pixels.
    pub fn section_counts(&self) -> (usize, usize) {
        let data = self.datasec_img.iter().filter(|v| **v > 0).count();
        let oscan = self.oscansec_img.iter().filter(|v| **v > 0).count();
        (data, oscan)
    }
}

/// Find the single file named `raw_file`, either as given or with one of
/// the readable compression suffixes appended.
pub fn locate_raw_file(raw_file: &Path) -> Result<PathBuf, RawImageError> {
    let pattern = format!("{}{{{}}}", raw_file.display(), COMPRESSION_SUFFIXES.join(","));
    let dir = match raw_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let stem = raw_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let candidates: Vec<String> = COMPRESSION_SUFFIXES
        .iter()
        .map(|suffix| format!("{}{}", stem, suffix))
        .collect();

    let mut matches: Vec<PathBuf> = std::fs::read_dir(&dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .filter(|p| {
                    p.file_name()
                        .is_some_and(|n| candidates.iter().any(|c| n.to_string_lossy() == *c))
                })
                .collect()
        })
        .unwrap_or_default();

    if matches.len() != 1 {
        return Err(RawImageError::FileMatch {
            pattern,
            count: matches.len(),
        });
    }
    Ok(matches.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_locate_raw_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("d0101_0010.fits.gz"), b"x").unwrap();
        fs::write(dir.path().join("d0101_0011.fits"), b"x").unwrap();
        fs::write(dir.path().join("d0101_0011.fits.gz"), b"x").unwrap();
        fs::write(dir.path().join("d0101_0012.fits"), b"x").unwrap();
        fs::write(dir.path().join("d0101_0012.fits.bak"), b"x").unwrap();
        fs::write(dir.path().join("d0101_0013.fits.fz"), b"x").unwrap();

        let found = locate_raw_file(&dir.path().join("d0101_0010.fits")).unwrap();
        assert!(found.ends_with("d0101_0010.fits.gz"));

        let err = locate_raw_file(&dir.path().join("d0101_0011.fits")).unwrap_err();
        assert!(matches!(err, RawImageError::FileMatch { count: 2, .. }));

        // Unreadable suffixes are not candidates
        let found = locate_raw_file(&dir.path().join("d0101_0012.fits")).unwrap();
        assert!(found.ends_with("d0101_0012.fits"));
        let err = locate_raw_file(&dir.path().join("d0101_0013.fits")).unwrap_err();
        assert!(matches!(err, RawImageError::FileMatch { count: 0, .. }));

        let err = locate_raw_file(&dir.path().join("missing.fits")).unwrap_err();
        assert!(matches!(err, RawImageError::FileMatch { count: 0, .. }));
    }
}
