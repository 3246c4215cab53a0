//! FITS header access for raw DEIMOS frames.
//!
//! Headers and pixel data are read through `fitrs`. Gzipped frames are
//! inflated to a temporary file first, and every data unit is checked
//! against the file length before fitrs is asked to read it.

use anyhow::{Context, Result};
use fitrs::{Fits, FitsData, Hdu};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

const BLOCK_SIZE: u64 = 2880;
const CARD_SIZE: usize = 80;
const END_CARD: &[u8] = b"END     ";

const FITS_MAGIC: &[u8] = b"SIMPLE  =";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const BZIP2_MAGIC: &[u8] = b"BZh";

/// BITPIX values fitrs decodes.
const SUPPORTED_BITPIX: [i64; 5] = [8, 16, 32, -32, -64];

#[derive(Debug, Error)]
pub enum FitsError {
    #[error("{path} is not a FITS file")]
    NotFits { path: String },
    #[error("{path} uses {format} compression; only gzip is supported")]
    UnsupportedCompression { path: String, format: &'static str },
    #[error("HDU {hdu} of {path} is truncated: data ends at byte {needed}, file has {available}")]
    Truncated {
        path: String,
        hdu: usize,
        needed: u64,
        available: u64,
    },
    #[error("HDU {hdu} of {path} is malformed: {reason}")]
    Malformed {
        path: String,
        hdu: usize,
        reason: String,
    },
    #[error("HDU {hdu} of {path} cannot be read as an image: {reason}")]
    NotAnImage {
        path: String,
        hdu: usize,
        reason: String,
    },
}

/// Value of a single header card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Empty,
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric value; integers are promoted and numeric strings parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Int(i) => Some(*i as f64),
            HeaderValue::Float(f) => Some(*f),
            HeaderValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(i) => Some(*i),
            HeaderValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            HeaderValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Value as it would appear in a card value field.
    fn card_field(&self) -> String {
        match self {
            HeaderValue::Str(s) => {
                let escaped = s.replace('\'', "''");
                format!("'{:<8}'", escaped)
            }
            HeaderValue::Bool(b) => format!("{:>20}", if *b { "T" } else { "F" }),
            HeaderValue::Int(i) => format!("{:>20}", i),
            HeaderValue::Float(f) => format!("{:>20}", format_float(*f)),
            HeaderValue::Empty => String::new(),
        }
    }
}

impl From<&fitrs::HeaderValue> for HeaderValue {
    fn from(value: &fitrs::HeaderValue) -> Self {
        match value {
            fitrs::HeaderValue::CharacterString(s) => HeaderValue::Str(s.trim_end().to_string()),
            fitrs::HeaderValue::Logical(b) => HeaderValue::Bool(*b),
            fitrs::HeaderValue::IntegerNumber(i) => HeaderValue::Int(i64::from(*i)),
            fitrs::HeaderValue::RealFloatingNumber(f) => HeaderValue::Float(*f),
            fitrs::HeaderValue::ComplexIntegerNumber(re, im) => {
                HeaderValue::Str(format!("({}, {})", re, im))
            }
            fitrs::HeaderValue::ComplexFloatingNumber(re, im) => {
                HeaderValue::Str(format!("({}, {})", re, im))
            }
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Str(s) => write!(f, "{}", s),
            HeaderValue::Bool(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            HeaderValue::Int(i) => write!(f, "{}", i),
            HeaderValue::Float(v) => write!(f, "{}", format_float(*v)),
            HeaderValue::Empty => Ok(()),
        }
    }
}

fn format_float(v: f64) -> String {
    let s = format!("{}", v);
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{}.0", s)
    }
}

/// A single header card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub key: String,
    pub value: HeaderValue,
}

impl Card {
    pub fn new(key: &str, value: HeaderValue) -> Self {
        Self {
            key: key.to_ascii_uppercase(),
            value,
        }
    }

    /// Render as a fixed-width 80 character card image.
    pub fn render(&self) -> String {
        let mut line = if matches!(self.value, HeaderValue::Empty) {
            self.key.clone()
        } else {
            format!("{:<8}= {}", self.key, self.value.card_field())
        };
        line.truncate(CARD_SIZE);
        format!("{:<80}", line)
    }
}

/// Ordered set of header cards for one HDU.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_hdu(hdu: &Hdu) -> Self {
        let cards = hdu
            .iter()
            .filter(|(key, _)| key.as_str() != "END")
            .map(|(key, value)| Card::new(key, value.map_or(HeaderValue::Empty, HeaderValue::from)))
            .collect();
        Self { cards }
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        let key = key.to_ascii_uppercase();
        self.cards
            .iter()
            .find(|c| c.key == key && !matches!(c.value, HeaderValue::Empty))
            .map(|c| &c.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(HeaderValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(HeaderValue::as_i64)
    }

    /// Required string card.
    pub fn require_str(&self, key: &str) -> Result<String> {
        self.get_str(key)
            .with_context(|| format!("Header card {} is missing", key))
    }

    /// Set a card, replacing an existing card of the same key.
    pub fn insert(&mut self, key: &str, value: HeaderValue) {
        let key = key.to_ascii_uppercase();
        if let Some(card) = self.cards.iter_mut().find(|c| c.key == key) {
            card.value = value;
        } else {
            self.cards.push(Card::new(&key, value));
        }
    }

    /// Integer card as fitrs stores it; floats do not count.
    fn get_int_card(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(HeaderValue::Int(i)) => Some(*i),
            _ => None,
        }
    }
}

fn padded(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// First bytes of a file, enough to tell FITS from a compressed stream.
fn read_magic(path: &Path) -> Result<Vec<u8>> {
    let mut magic = Vec::with_capacity(FITS_MAGIC.len());
    File::open(path)
        .and_then(|f| f.take(FITS_MAGIC.len() as u64).read_to_end(&mut magic))
        .with_context(|| format!("Failed to read FITS file: {}", path.display()))?;
    Ok(magic)
}

fn gunzip(path: &Path) -> Result<NamedTempFile> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open FITS file: {}", path.display()))?;
    let mut decoder = flate2::read::GzDecoder::new(BufReader::new(file));
    let mut inflated = NamedTempFile::new().context("Failed to create a temporary file")?;
    std::io::copy(&mut decoder, inflated.as_file_mut())
        .with_context(|| format!("Failed to decompress {}", path.display()))?;
    tracing::debug!("Inflated {} to {}", path.display(), inflated.path().display());
    Ok(inflated)
}

/// Integer value of a card image, ignoring any trailing comment.
fn card_int(card: &[u8]) -> Option<i32> {
    let value = card.get(10..)?;
    let end = value.iter().position(|b| *b == b'/').unwrap_or(value.len());
    std::str::from_utf8(&value[..end]).ok()?.trim().parse().ok()
}

/// Byte range of each data unit, read from the raw header blocks.
///
/// fitrs hides these offsets and panics on a header without integer
/// BITPIX and NAXISn cards, so the structural cards are checked here
/// first. Positions follow fitrs, which ignores PCOUNT and GCOUNT.
fn data_units(path: &Path) -> Result<Vec<Range<u64>>> {
    let name = path.display().to_string();
    let file = File::open(path).with_context(|| format!("Failed to open FITS file: {}", name))?;
    let available = file.metadata()?.len();
    let mut file = BufReader::new(file);
    let mut block = [0u8; BLOCK_SIZE as usize];
    let mut pos = 0u64;
    let mut units = Vec::new();

    while pos + BLOCK_SIZE <= available {
        let hdu = units.len();
        let mut ints: HashMap<String, i32> = HashMap::new();
        let mut ended = false;
        file.seek(SeekFrom::Start(pos))?;
        while !ended && pos + BLOCK_SIZE <= available {
            file.read_exact(&mut block)?;
            pos += BLOCK_SIZE;
            for card in block.chunks(CARD_SIZE) {
                if card.starts_with(END_CARD) {
                    ended = true;
                    break;
                }
                if &card[8..10] == b"= " {
                    if let Some(value) = card_int(card) {
                        let key = String::from_utf8_lossy(&card[..8]).trim_end().to_string();
                        ints.entry(key).or_insert(value);
                    }
                }
            }
        }
        if !ended {
            break;
        }

        let malformed = |reason: String| FitsError::Malformed {
            path: name.clone(),
            hdu,
            reason,
        };
        let int_card = |key: &str| {
            ints.get(key)
                .copied()
                .filter(|v| *v >= 0 || key == "BITPIX")
                .ok_or_else(|| malformed(format!("{} is missing or invalid", key)))
        };
        let bitpix = int_card("BITPIX")?;
        let naxis = int_card("NAXIS")?;
        let mut npix = 0u64;
        for axis in 1..=naxis {
            let len = int_card(&format!("NAXIS{}", axis))? as u64;
            npix = if axis == 1 { len } else { npix * len };
        }
        let size = npix * u64::from(bitpix.unsigned_abs()) / 8;

        if pos + size > available {
            return Err(FitsError::Truncated {
                path: name,
                hdu,
                needed: pos + size,
                available,
            }
            .into());
        }
        units.push(pos..pos + size);
        pos += padded(size);
    }
    Ok(units)
}

/// All headers of a FITS file, with lazy access to image data.
#[derive(Debug)]
pub struct FitsFile {
    path: PathBuf,
    fits: Fits,
    headers: Vec<Header>,
    /// Inflated copy of a gzipped file, removed on drop.
    _inflated: Option<NamedTempFile>,
}

impl FitsFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();

        let magic = read_magic(path)?;
        let inflated = if magic.starts_with(GZIP_MAGIC) {
            Some(gunzip(path)?)
        } else if magic.starts_with(BZIP2_MAGIC) {
            return Err(FitsError::UnsupportedCompression {
                path: name,
                format: "bzip2",
            }
            .into());
        } else {
            None
        };
        let readable = inflated.as_ref().map_or(path, |tmp| tmp.path());
        if !read_magic(readable)?.starts_with(FITS_MAGIC) {
            return Err(FitsError::NotFits { path: name }.into());
        }

        let units = data_units(readable)?;
        if units.is_empty() {
            return Err(FitsError::NotFits { path: name }.into());
        }
        let fits = Fits::open(readable)
            .with_context(|| format!("Failed to open FITS file: {}", name))?;
        let headers: Vec<Header> = fits
            .iter()
            .take(units.len())
            .map(|hdu| Header::from_hdu(&hdu))
            .collect();
        if headers.is_empty() {
            return Err(FitsError::NotFits { path: name }.into());
        }
        tracing::debug!("Read {} HDU headers from {}", headers.len(), name);

        Ok(Self {
            path: path.to_path_buf(),
            fits,
            headers,
            _inflated: inflated,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn primary(&self) -> &Header {
        &self.headers[0]
    }

    pub fn extension(&self, index: usize) -> Option<&Header> {
        self.headers.get(index)
    }

    pub fn extension_by_name(&self, name: &str) -> Option<&Header> {
        self.headers
            .iter()
            .find(|h| h.get_str("EXTNAME").is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    /// Read the image in HDU `index` as (NAXIS2 rows, NAXIS1 columns).
    pub fn read_image(&self, index: usize) -> Result<DMatrix<f64>> {
        let header = self
            .extension(index)
            .with_context(|| format!("HDU {} not found in {}", index, self.path.display()))?;
        let not_an_image = |reason: String| FitsError::NotAnImage {
            path: self.path.display().to_string(),
            hdu: index,
            reason,
        };

        if header.get("ZIMAGE").and_then(HeaderValue::as_bool) == Some(true) {
            return Err(FitsError::UnsupportedCompression {
                path: self.path.display().to_string(),
                format: "tile",
            }
            .into());
        }
        match header.get_int_card("BITPIX") {
            Some(bitpix) if SUPPORTED_BITPIX.contains(&bitpix) => {}
            other => return Err(not_an_image(format!("unsupported BITPIX {:?}", other)).into()),
        }
        if header.get_int_card("NAXIS") != Some(2) {
            return Err(not_an_image("expected 2 axes".to_string()).into());
        }
        let (Some(ncols), Some(nrows)) = (
            header.get_int_card("NAXIS1"),
            header.get_int_card("NAXIS2"),
        ) else {
            return Err(not_an_image("NAXIS1 or NAXIS2 missing".to_string()).into());
        };
        let (nrows, ncols) = (nrows.max(0) as usize, ncols.max(0) as usize);

        let bscale = header.get_f64("BSCALE").unwrap_or(1.0);
        let bzero = header.get_f64("BZERO").unwrap_or(0.0);
        let hdu = self
            .fits
            .get(index)
            .with_context(|| format!("HDU {} not found in {}", index, self.path.display()))?;

        let scale_int = |v: &Option<i32>| match v {
            Some(x) => f64::from(*x) * bscale + bzero,
            None => f64::NAN,
        };
        let values: Vec<f64> = match hdu.read_data() {
            FitsData::IntegersI32(arr) => arr.data.iter().map(scale_int).collect(),
            FitsData::IntegersU32(arr) => arr
                .data
                .iter()
                .map(|v| match v {
                    Some(x) => f64::from(*x) * bscale + bzero,
                    None => f64::NAN,
                })
                .collect(),
            FitsData::FloatingPoint32(arr) => arr
                .data
                .iter()
                .map(|x| f64::from(*x) * bscale + bzero)
                .collect(),
            FitsData::FloatingPoint64(arr) => arr.data.iter().map(|x| *x * bscale + bzero).collect(),
            FitsData::Characters(arr) => arr
                .data
                .iter()
                .map(|c| f64::from(u32::from(*c)) * bscale + bzero)
                .collect(),
        };

        if values.len() != nrows * ncols {
            return Err(not_an_image(format!(
                "{} values for a {}x{} image",
                values.len(),
                nrows,
                ncols
            ))
            .into());
        }
        Ok(DMatrix::from_row_slice(nrows, ncols, &values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn header_block(cards: &[Card]) -> Vec<u8> {
        let mut out: Vec<u8> = cards.iter().flat_map(|c| c.render().into_bytes()).collect();
        out.extend_from_slice(format!("{:<80}", "END").as_bytes());
        out.resize(padded(out.len() as u64) as usize, b' ');
        out
    }

    fn data_block(mut data: Vec<u8>) -> Vec<u8> {
        data.resize(padded(data.len() as u64) as usize, 0);
        data
    }

    /// Primary header plus one 2x3 BITPIX 16 image extension with
    /// BZERO 32768; the last pixel is BLANK.
    fn scaled_frame() -> Vec<u8> {
        let primary = vec![
            Card::new("SIMPLE", HeaderValue::Bool(true)),
            Card::new("BITPIX", HeaderValue::Int(8)),
            Card::new("NAXIS", HeaderValue::Int(0)),
            Card::new("EXTEND", HeaderValue::Bool(true)),
            Card::new("OBJECT", HeaderValue::Str("Bob's field".into())),
            Card::new("GRATEPOS", HeaderValue::Int(3)),
            Card::new("ROTPOSN", HeaderValue::Float(-12.5)),
            Card::new("COMMENT", HeaderValue::Empty),
        ];
        let image = vec![
            Card::new("XTENSION", HeaderValue::Str("IMAGE".into())),
            Card::new("BITPIX", HeaderValue::Int(16)),
            Card::new("NAXIS", HeaderValue::Int(2)),
            Card::new("NAXIS1", HeaderValue::Int(3)),
            Card::new("NAXIS2", HeaderValue::Int(2)),
            Card::new("PCOUNT", HeaderValue::Int(0)),
            Card::new("GCOUNT", HeaderValue::Int(1)),
            Card::new("BSCALE", HeaderValue::Float(1.0)),
            Card::new("BZERO", HeaderValue::Float(32768.0)),
            Card::new("BLANK", HeaderValue::Int(-32768)),
            Card::new("EXTNAME", HeaderValue::Str("CHIP1".into())),
        ];
        let counts: [u16; 5] = [1, 100, 32768, 40000, 65535];
        let mut data: Vec<u8> = counts
            .iter()
            .flat_map(|c| ((i32::from(*c) - 32768) as i16).to_be_bytes())
            .collect();
        data.extend_from_slice(&i16::MIN.to_be_bytes());

        let mut out = header_block(&primary);
        out.extend(header_block(&image));
        out.extend(data_block(data));
        out
    }

    #[test]
    fn test_headers_read_through_fitrs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.fits");
        std::fs::write(&path, scaled_frame()).unwrap();

        let fits = FitsFile::open(&path).unwrap();
        assert_eq!(fits.headers().len(), 2);
        let primary = fits.primary();
        assert_eq!(primary.get_str("OBJECT").as_deref(), Some("Bob's field"));
        assert_eq!(primary.get_i64("GRATEPOS"), Some(3));
        assert_eq!(primary.get_f64("ROTPOSN"), Some(-12.5));
        assert_eq!(primary.get("SIMPLE"), Some(&HeaderValue::Bool(true)));
        assert!(!primary.cards.iter().any(|c| c.key == "END"));
        assert!(fits.extension_by_name("chip1").is_some());
        assert!(fits.extension_by_name("CHIP2").is_none());
    }

    #[test]
    fn test_read_scaled_16bit_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.fits");
        std::fs::write(&path, scaled_frame()).unwrap();

        let image = FitsFile::open(&path).unwrap().read_image(1).unwrap();
        assert_eq!(image.shape(), (2, 3));
        assert_eq!(image[(0, 0)], 1.0);
        assert_eq!(image[(0, 1)], 100.0);
        assert_eq!(image[(0, 2)], 32768.0);
        assert_eq!(image[(1, 0)], 40000.0);
        assert_eq!(image[(1, 1)], 65535.0);
        assert!(image[(1, 2)].is_nan());
    }

    #[test]
    fn test_gzipped_file_is_inflated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.fits.gz");
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&scaled_frame()).unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        let fits = FitsFile::open(&path).unwrap();
        assert_eq!(fits.path(), path.as_path());
        assert_eq!(fits.primary().get_i64("GRATEPOS"), Some(3));
        assert_eq!(fits.read_image(1).unwrap()[(0, 1)], 100.0);
    }

    #[test]
    fn test_truncated_data_unit_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.fits");
        let mut bytes = scaled_frame();
        bytes.truncate(bytes.len() - BLOCK_SIZE as usize);
        std::fs::write(&path, bytes).unwrap();

        let err = FitsFile::open(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FitsError>(),
            Some(FitsError::Truncated { hdu: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_other_formats() {
        let dir = TempDir::new().unwrap();
        let bz = dir.path().join("frame.fits.bz2");
        std::fs::write(&bz, b"BZh91AY&SY").unwrap();
        let err = FitsFile::open(&bz).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FitsError>(),
            Some(FitsError::UnsupportedCompression { format: "bzip2", .. })
        ));

        let text = dir.path().join("notes.fits");
        std::fs::write(&text, b"not a fits file").unwrap();
        let err = FitsFile::open(&text).unwrap_err();
        assert!(matches!(err.downcast_ref::<FitsError>(), Some(FitsError::NotFits { .. })));
    }

    #[test]
    fn test_primary_is_not_an_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.fits");
        std::fs::write(&path, scaled_frame()).unwrap();
        let err = FitsFile::open(&path).unwrap().read_image(0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FitsError>(),
            Some(FitsError::NotAnImage { hdu: 0, .. })
        ));
    }

    #[test]
    fn test_render_card() {
        let card = Card::new("ampmode", HeaderValue::Str("SINGLE:B".into()));
        let rendered = card.render();
        assert_eq!(rendered.len(), 80);
        assert!(rendered.starts_with("AMPMODE = 'SINGLE:B'"));

        let flag = Card::new("SIMPLE", HeaderValue::Bool(true)).render();
        assert_eq!(&flag[29..30], "T");
        let angle = Card::new("ROTPOSN", HeaderValue::Float(-90.0)).render();
        assert!(angle[10..30].trim() == "-90.0");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut h = Header::new();
        h.insert("BINNING", HeaderValue::Str("1,1".into()));
        h.insert("airmass", HeaderValue::Float(1.2));
        assert_eq!(h.get_str("binning").as_deref(), Some("1,1"));
        assert_eq!(h.get_f64("AIRMASS"), Some(1.2));
        h.insert("AIRMASS", HeaderValue::Int(2));
        assert_eq!(h.get_f64("AIRMASS"), Some(2.0));
        assert_eq!(h.cards.len(), 2);
    }

    #[test]
    fn test_header_without_axis_lengths_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.fits");
        let primary = vec![
            Card::new("SIMPLE", HeaderValue::Bool(true)),
            Card::new("BITPIX", HeaderValue::Int(-32)),
            Card::new("NAXIS", HeaderValue::Int(2)),
            Card::new("NAXIS1", HeaderValue::Int(4)),
        ];
        std::fs::write(&path, header_block(&primary)).unwrap();

        let err = FitsFile::open(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FitsError>(),
            Some(FitsError::Malformed { hdu: 0, .. })
        ));
        assert!(err.to_string().contains("NAXIS2"));
        assert_eq!(padded(120), 2880);
        assert_eq!(padded(0), 0);
    }
}
