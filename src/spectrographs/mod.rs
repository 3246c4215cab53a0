//! Instrument abstraction and the instruments this crate knows about.

pub mod detector;
pub mod keck_deimos;
pub mod optics;

use anyhow::{bail, Result};
use nalgebra::DMatrix;
use serde::Serialize;
use std::path::Path;

use crate::framematch::FrameType;
use crate::header::{FitsFile, Header, HeaderValue};
use crate::meta::{FrameMeta, MetaKey, MetaValue, CORE_KEYS};
use crate::par::ParSet;
use crate::rawimage::RawImage;

pub use detector::DetectorPar;
pub use keck_deimos::KeckDeimos;

/// Names accepted by [`load_spectrograph`].
pub const AVAILABLE_SPECTROGRAPHS: [&str; 1] = ["keck_deimos"];

pub fn available_spectrographs() -> &'static [&'static str] {
    &AVAILABLE_SPECTROGRAPHS
}

pub fn load_spectrograph(name: &str) -> Result<Box<dyn Spectrograph>> {
    match name {
        "keck_deimos" => Ok(Box::new(KeckDeimos::new())),
        other => bail!(
            "Instrument '{}' unknown. Options are: {}",
            other,
            AVAILABLE_SPECTROGRAPHS.join(", ")
        ),
    }
}

/// Site and optics of the telescope feeding a spectrograph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelescopePar {
    pub name: &'static str,
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: f64,
    pub fratio: f64,
    pub diameter: f64,
}

impl TelescopePar {
    pub fn keck() -> Self {
        Self {
            name: "KECK",
            longitude: 155.47833,
            latitude: 19.82833,
            elevation: 4160.0,
            fratio: 15.0,
            diameter: 10.0,
        }
    }
}

/// Where a metadata value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaSource {
    /// A card in the given HDU.
    Card { ext: usize, card: &'static str },
    /// Derived from several cards by [`Spectrograph::compound_meta`].
    Compound,
}

pub trait Spectrograph: Send + Sync {
    fn name(&self) -> &'static str;
    fn camera(&self) -> &'static str;
    fn telescope(&self) -> TelescopePar;
    fn ndet(&self) -> usize;

    /// Parameters of detector `det` (1-indexed) for the given binning.
    fn detector_par(&self, det: usize, binning: Option<&str>) -> Result<DetectorPar>;

    /// Detector numbers, grouped blue then red when the instrument is split.
    fn list_detectors(&self) -> (Vec<Vec<usize>>, bool) {
        (vec![(1..=self.ndet()).collect()], false)
    }

    fn default_par(&self) -> Result<ParSet>;

    /// Adjust parameters for the configuration of one science frame.
    fn config_specific_par(&self, _meta: &FrameMeta, par: ParSet) -> Result<ParSet> {
        Ok(par)
    }

    /// Metadata keys and the cards they come from.
    fn meta_sources(&self) -> Vec<(MetaKey, MetaSource)>;

    fn compound_meta(&self, headers: &[Header], key: MetaKey) -> Result<Option<MetaValue>>;

    /// Relative tolerance for comparing a float configuration key.
    fn meta_rtol(&self, _key: MetaKey) -> Option<f64> {
        None
    }

    fn configuration_keys(&self) -> Vec<MetaKey>;

    /// Allowed values for configuration keys; frames with other values
    /// cannot be reduced.
    fn valid_configuration_values(&self) -> Vec<(MetaKey, Vec<&'static str>)> {
        Vec::new()
    }

    /// Frame types that do not depend on the configuration, with the key
    /// used to attach them to setups.
    fn config_independent_frames(&self) -> Vec<(FrameType, MetaKey)> {
        Vec::new()
    }

    /// Columns written to the data block of a reduction file.
    fn pypeit_file_keys(&self) -> Vec<MetaKey> {
        let mut keys: Vec<MetaKey> = CORE_KEYS.to_vec();
        for key in self.configuration_keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    fn check_frame_type(
        &self,
        ftype: FrameType,
        meta: &FrameMeta,
        exprng: [Option<f64>; 2],
    ) -> bool;

    fn idname(&self, _ftype: FrameType) -> Option<&'static str> {
        None
    }

    /// Default bad-pixel mask: 1 marks a bad pixel.
    fn bpm(&self, shape: (usize, usize), _det: usize) -> DMatrix<u8> {
        DMatrix::zeros(shape.0, shape.1)
    }

    /// Arc lamps used by a set of arc frames, from their headers.
    fn lamps_from_frames(&self, _frames: &[&FrameMeta]) -> Vec<String> {
        Vec::new()
    }

    /// Read one detector (or the full mosaic when `det` is `None`).
    fn read_raw(&self, raw_file: &Path, det: Option<usize>) -> Result<RawImage>;

    /// Header cards that describe extractions taken from the given frame.
    fn subheader_for_spec(
        &self,
        meta: &FrameMeta,
        raw_header: &Header,
        extra_cards: &[&str],
        allow_missing: bool,
    ) -> Result<Header> {
        base_subheader(self.name(), meta, raw_header, extra_cards, allow_missing)
    }

    /// Build the metadata of one file from its headers.
    fn meta_from_headers(
        &self,
        headers: &[Header],
        filename: &str,
        directory: &Path,
    ) -> Result<FrameMeta> {
        let mut meta = FrameMeta::new(filename, directory.to_path_buf());
        for (key, source) in self.meta_sources() {
            let value = match source {
                MetaSource::Card { ext, card } => headers
                    .get(ext)
                    .and_then(|h| h.get(card))
                    .and_then(|v| MetaValue::from_header(key, v)),
                MetaSource::Compound => self.compound_meta(headers, key)?,
            };
            match value {
                Some(v) => meta.set(key, v),
                None => tracing::debug!("{}: no value for {}", filename, key),
            }
        }
        Ok(meta)
    }

    /// Open a file and build its metadata.
    fn meta_from_file(&self, path: &Path) -> Result<FrameMeta> {
        let fits = FitsFile::open(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        self.meta_from_headers(fits.headers(), &filename, directory)
    }
}

/// Core subheader shared by all instruments.
pub fn base_subheader(
    name: &str,
    meta: &FrameMeta,
    raw_header: &Header,
    extra_cards: &[&str],
    allow_missing: bool,
) -> Result<Header> {
    let mut header = Header::new();
    header.insert("PYP_SPEC", HeaderValue::Str(name.to_string()));

    for key in CORE_KEYS {
        let card = key.as_str().to_ascii_uppercase();
        match meta.get(key) {
            Some(MetaValue::Float(v)) => header.insert(&card, HeaderValue::Float(*v)),
            Some(MetaValue::Int(v)) => header.insert(&card, HeaderValue::Int(*v)),
            Some(MetaValue::Str(v)) => header.insert(&card, HeaderValue::Str(v.clone())),
            None if allow_missing => continue,
            None => bail!("Metadata key '{}' missing for {}", key, meta.filename),
        }
    }

    if let Some(detector) = raw_header.get("DETECTOR") {
        header.insert("DETECTOR", detector.clone());
    }
    for card in std::iter::once(&"INSTRUME").chain(extra_cards.iter()) {
        match raw_header.get(card) {
            Some(value) => header.insert(card, value.clone()),
            None if allow_missing => {}
            None => bail!("Header card {} missing from {}", card, meta.filename),
        }
    }
    Ok(header)
}

/// Configuration values of a frame in `configuration_keys` order.
pub fn configuration_of(
    spectrograph: &dyn Spectrograph,
    meta: &FrameMeta,
) -> Vec<(MetaKey, Option<MetaValue>)> {
    spectrograph
        .configuration_keys()
        .into_iter()
        .map(|k| (k, meta.get(k).cloned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_spectrograph() {
        let spec = load_spectrograph("keck_deimos").unwrap();
        assert_eq!(spec.name(), "keck_deimos");
        assert_eq!(spec.camera(), "DEIMOS");
        let err = load_spectrograph("keck_lris").err().unwrap();
        assert!(err.to_string().contains("keck_deimos"));
    }

    #[test]
    fn test_base_subheader_missing_cards() {
        let meta = FrameMeta::new("d.fits", ".".into()).with(MetaKey::Exptime, 10.0);
        let raw = Header::new();
        assert!(base_subheader("x", &meta, &raw, &[], false).is_err());
        let header = base_subheader("x", &meta, &raw, &["KOAID"], true).unwrap();
        assert_eq!(header.get_str("PYP_SPEC").as_deref(), Some("x"));
        assert_eq!(header.get_f64("EXPTIME"), Some(10.0));
        assert!(!header.contains("KOAID"));
    }
}
