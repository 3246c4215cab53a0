//! Container for a single extracted or coadded spectrum.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::header::{Header, HeaderValue};
use crate::meta::{FrameMeta, MetaValue, CORE_KEYS};
use crate::spectrographs::load_spectrograph;

/// Extraction used to produce the spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExtMode {
    /// Boxcar
    Box,
    /// Optimal
    Opt,
}

impl fmt::Display for ExtMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExtMode::Box => "BOX",
            ExtMode::Opt => "OPT",
        })
    }
}

impl FromStr for ExtMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BOX" => Ok(ExtMode::Box),
            "OPT" => Ok(ExtMode::Opt),
            other => bail!("Unknown extraction mode '{}' (options: BOX, OPT)", other),
        }
    }
}

/// A single 1D spectrum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneSpec {
    /// Wavelength (Angstrom)
    pub wave: Vec<f64>,
    /// Counts/s, or 1e-17 erg/s/cm^2/Ang when fluxed
    pub flux: Vec<f64>,
    pub ivar: Option<Vec<f64>>,
    /// 1 good, 0 bad
    pub mask: Option<Vec<u8>>,
    pub telluric: Option<Vec<f64>>,
    pub obj_model: Option<Vec<f64>>,
    #[serde(rename = "PYP_SPEC")]
    pub pyp_spec: Option<String>,
    pub ext_mode: Option<ExtMode>,
    pub fluxed: Option<bool>,

    /// Metadata parsed from `head0`.
    #[serde(skip)]
    pub spect_meta: Option<FrameMeta>,
    /// Primary header the spectrum was read with, or the header of the
    /// frame it came from.
    #[serde(skip)]
    pub head0: Option<Header>,
}

#[derive(Serialize, Deserialize)]
struct OneSpecFile {
    header: Header,
    #[serde(flatten)]
    spectrum: OneSpec,
}

impl OneSpec {
    pub fn new(wave: Vec<f64>, flux: Vec<f64>) -> Result<Self> {
        let spec = Self {
            wave,
            flux,
            ..Self::default()
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Every array must match the wavelength grid.
    pub fn validate(&self) -> Result<()> {
        let n = self.wave.len();
        let arrays = [
            ("flux", Some(self.flux.len())),
            ("ivar", self.ivar.as_ref().map(Vec::len)),
            ("mask", self.mask.as_ref().map(Vec::len)),
            ("telluric", self.telluric.as_ref().map(Vec::len)),
            ("obj_model", self.obj_model.as_ref().map(Vec::len)),
        ];
        for (name, len) in arrays {
            if let Some(len) = len {
                if len != n {
                    bail!("{} has {} values but wave has {}", name, len, n);
                }
            }
        }
        if let Some(mask) = &self.mask {
            if mask.iter().any(|m| *m > 1) {
                bail!("mask values must be 0 (bad) or 1 (good)");
            }
        }
        Ok(())
    }

    pub fn npix(&self) -> usize {
        self.wave.len()
    }

    /// Primary header written with the spectrum: version cards, then the
    /// spectrograph subheader when both `head0` and `pyp_spec` are known.
    pub fn header(&self, primary: Option<Header>) -> Result<Header> {
        let mut header = primary.unwrap_or_else(initialize_header);
        if let (Some(head0), Some(name)) = (&self.head0, &self.pyp_spec) {
            let spectrograph = load_spectrograph(name)?;
            let meta = parse_spec_header(head0);
            let sub = spectrograph.subheader_for_spec(&meta, head0, &["RA_OBJ", "DEC_OBJ"], true)?;
            for card in sub.cards {
                header.insert(&card.key, card.value);
            }
        }
        Ok(header)
    }

    pub fn to_file(&self, path: &Path, primary: Option<Header>) -> Result<()> {
        self.validate()?;
        let file = OneSpecFile {
            header: self.header(primary)?,
            spectrum: self.clone(),
        };
        let json = serde_json::to_string_pretty(&file).context("Failed to serialize spectrum")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write spectrum: {}", path.display()))?;
        tracing::info!("💾 Wrote spectrum to {}", path.display());
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read spectrum: {}", path.display()))?;
        let file: OneSpecFile = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse spectrum: {}", path.display()))?;
        let mut spec = file.spectrum;
        spec.validate()
            .with_context(|| format!("Invalid spectrum in {}", path.display()))?;
        if let Some(name) = &spec.pyp_spec {
            // Fails on unknown spectrographs
            load_spectrograph(name)?;
            spec.spect_meta = Some(parse_spec_header(&file.header));
        }
        spec.head0 = Some(file.header);
        Ok(spec)
    }
}

fn initialize_header() -> Header {
    let mut header = Header::new();
    header.insert(
        "VERSPYP",
        HeaderValue::Str(env!("CARGO_PKG_VERSION").to_string()),
    );
    header.insert(
        "DATE",
        HeaderValue::Str(chrono::Utc::now().format("%Y-%m-%d").to_string()),
    );
    header
}

/// Core metadata from a header written by `subheader_for_spec`.
pub fn parse_spec_header(header: &Header) -> FrameMeta {
    let mut meta = FrameMeta::default();
    for key in CORE_KEYS {
        let card = key.as_str().to_ascii_uppercase();
        if let Some(value) = header.get(&card).and_then(|v| MetaValue::from_header(key, v)) {
            meta.set(key, value);
        }
    }
    meta
}
