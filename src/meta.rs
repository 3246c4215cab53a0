//! Frame metadata pulled from raw headers.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::coords::{parse_dec, parse_ra};
use crate::header::HeaderValue;

/// Metadata keys used for frame typing, setup grouping and reduction files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaKey {
    Ra,
    Dec,
    Target,
    Decker,
    Binning,
    Mjd,
    Exptime,
    Airmass,
    Dispname,
    Hatch,
    Dispangle,
    Idname,
    Lampstat01,
    Dateobs,
    Utc,
    Mode,
    Amp,
    Object,
    Filter1,
    Frameno,
    Instrument,
}

/// Keys every spectrograph is expected to provide.
pub const CORE_KEYS: [MetaKey; 9] = [
    MetaKey::Ra,
    MetaKey::Dec,
    MetaKey::Target,
    MetaKey::Dispname,
    MetaKey::Decker,
    MetaKey::Binning,
    MetaKey::Mjd,
    MetaKey::Airmass,
    MetaKey::Exptime,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaType {
    Str,
    Float,
    Int,
}

impl MetaKey {
    pub const ALL: [MetaKey; 21] = [
        MetaKey::Ra,
        MetaKey::Dec,
        MetaKey::Target,
        MetaKey::Decker,
        MetaKey::Binning,
        MetaKey::Mjd,
        MetaKey::Exptime,
        MetaKey::Airmass,
        MetaKey::Dispname,
        MetaKey::Hatch,
        MetaKey::Dispangle,
        MetaKey::Idname,
        MetaKey::Lampstat01,
        MetaKey::Dateobs,
        MetaKey::Utc,
        MetaKey::Mode,
        MetaKey::Amp,
        MetaKey::Object,
        MetaKey::Filter1,
        MetaKey::Frameno,
        MetaKey::Instrument,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetaKey::Ra => "ra",
            MetaKey::Dec => "dec",
            MetaKey::Target => "target",
            MetaKey::Decker => "decker",
            MetaKey::Binning => "binning",
            MetaKey::Mjd => "mjd",
            MetaKey::Exptime => "exptime",
            MetaKey::Airmass => "airmass",
            MetaKey::Dispname => "dispname",
            MetaKey::Hatch => "hatch",
            MetaKey::Dispangle => "dispangle",
            MetaKey::Idname => "idname",
            MetaKey::Lampstat01 => "lampstat01",
            MetaKey::Dateobs => "dateobs",
            MetaKey::Utc => "utc",
            MetaKey::Mode => "mode",
            MetaKey::Amp => "amp",
            MetaKey::Object => "object",
            MetaKey::Filter1 => "filter1",
            MetaKey::Frameno => "frameno",
            MetaKey::Instrument => "instrument",
        }
    }

    pub fn dtype(&self) -> MetaType {
        match self {
            MetaKey::Ra
            | MetaKey::Dec
            | MetaKey::Mjd
            | MetaKey::Exptime
            | MetaKey::Airmass
            | MetaKey::Dispangle => MetaType::Float,
            MetaKey::Frameno => MetaType::Int,
            _ => MetaType::Str,
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetaKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match MetaKey::ALL.iter().find(|k| k.as_str().eq_ignore_ascii_case(s.trim())) {
            Some(k) => Ok(*k),
            None => bail!("Unknown metadata key '{}'", s),
        }
    }
}

/// A typed metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetaValue {
    /// Convert a header value to the type expected for `key`.
    /// Returns `None` when the card cannot be interpreted.
    pub fn from_header(key: MetaKey, value: &HeaderValue) -> Option<MetaValue> {
        match key {
            MetaKey::Ra => match value {
                HeaderValue::Str(s) => parse_ra(s).ok().map(MetaValue::Float),
                other => other.as_f64().map(MetaValue::Float),
            },
            MetaKey::Dec => match value {
                HeaderValue::Str(s) => parse_dec(s).ok().map(MetaValue::Float),
                other => other.as_f64().map(MetaValue::Float),
            },
            _ => match key.dtype() {
                MetaType::Float => value.as_f64().map(MetaValue::Float),
                MetaType::Int => value.as_i64().map(MetaValue::Int),
                MetaType::Str => match value {
                    HeaderValue::Empty => None,
                    other => Some(MetaValue::Str(other.to_string().trim().to_string())),
                },
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Float(f) => Some(*f),
            MetaValue::Int(i) => Some(*i as f64),
            MetaValue::Str(_) => None,
        }
    }

    /// Equality used when grouping configurations. Floats compare with a
    /// relative tolerance when one is given.
    pub fn matches(&self, other: &MetaValue, rtol: Option<f64>) -> bool {
        match (self, other, rtol) {
            (MetaValue::Float(a), MetaValue::Float(b), Some(rtol)) => {
                (a - b).abs() <= rtol * b.abs()
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Int(i) => write!(f, "{}", i),
            MetaValue::Float(v) => write!(f, "{}", v),
            MetaValue::Str(s) => f.write_str(s),
        }
    }
}

/// Metadata for one raw frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub filename: String,
    pub directory: PathBuf,
    pub values: BTreeMap<MetaKey, MetaValue>,
}

impl FrameMeta {
    pub fn new(filename: &str, directory: PathBuf) -> Self {
        Self {
            filename: filename.to_string(),
            directory,
            values: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }

    pub fn get(&self, key: MetaKey) -> Option<&MetaValue> {
        self.values.get(&key)
    }

    pub fn get_str(&self, key: MetaKey) -> Option<&str> {
        self.get(key).and_then(MetaValue::as_str)
    }

    pub fn get_f64(&self, key: MetaKey) -> Option<f64> {
        self.get(key).and_then(MetaValue::as_f64)
    }

    pub fn set(&mut self, key: MetaKey, value: MetaValue) {
        self.values.insert(key, value);
    }

    /// Builder-style setter, mostly for tests and synthetic frames.
    pub fn with(mut self, key: MetaKey, value: impl Into<MetaValue>) -> Self {
        self.set(key, value.into());
        self
    }

    pub fn exptime(&self) -> Option<f64> {
        self.get_f64(MetaKey::Exptime)
    }

    /// Display form of a key, `None` when missing.
    pub fn display(&self, key: MetaKey) -> String {
        self.get(key)
            .map_or_else(|| "None".to_string(), |v| v.to_string())
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Str(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Str(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

/// Modified Julian Date from `DATE-OBS` (`YYYY-MM-DD` or full ISO) and an
/// optional `UTC` time of day.
pub fn mjd_from_date_time(date: &str, utc: Option<&str>) -> Result<f64> {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    let date = date.trim();
    let datetime = if let Ok(dt) = NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%.f") {
        dt
    } else {
        let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Invalid DATE-OBS '{}': {}", date, e))?;
        let time = match utc {
            Some(t) => NaiveTime::parse_from_str(t.trim(), "%H:%M:%S%.f")
                .map_err(|e| anyhow::anyhow!("Invalid UTC '{}': {}", t, e))?,
            None => NaiveTime::from_hms_opt(0, 0, 0)
                .ok_or_else(|| anyhow::anyhow!("Invalid time of day"))?,
        };
        day.and_time(time)
    };

    let epoch = NaiveDate::from_ymd_opt(1858, 11, 17)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow::anyhow!("Invalid MJD epoch"))?;
    let delta = datetime - epoch;
    let micros = delta
        .num_microseconds()
        .ok_or_else(|| anyhow::anyhow!("Date out of range: {}", date))?;
    Ok(micros as f64 / 86_400_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_key_names() {
        assert_eq!("lampstat01".parse::<MetaKey>().unwrap(), MetaKey::Lampstat01);
        assert_eq!(MetaKey::Filter1.to_string(), "filter1");
        assert!("nope".parse::<MetaKey>().is_err());
        assert_eq!(MetaKey::Dispangle.dtype(), MetaType::Float);
    }

    #[test]
    fn test_from_header_values() {
        let ra = MetaValue::from_header(MetaKey::Ra, &HeaderValue::Str("01:00:00".into()));
        assert_eq!(ra, Some(MetaValue::Float(15.0)));
        let exptime = MetaValue::from_header(MetaKey::Exptime, &HeaderValue::Int(300));
        assert_eq!(exptime, Some(MetaValue::Float(300.0)));
        let frameno = MetaValue::from_header(MetaKey::Frameno, &HeaderValue::Int(42));
        assert_eq!(frameno, Some(MetaValue::Int(42)));
        let hatch = MetaValue::from_header(MetaKey::Hatch, &HeaderValue::Str("open".into()));
        assert_eq!(hatch, Some(MetaValue::from("open")));
        assert!(MetaValue::from_header(MetaKey::Airmass, &HeaderValue::Str("n/a".into())).is_none());
    }

    #[test]
    fn test_matches_with_tolerance() {
        let a = MetaValue::Float(7500.0);
        let b = MetaValue::Float(7500.05);
        assert!(a.matches(&b, Some(1e-5)));
        assert!(!a.matches(&b, None));
        assert!(!a.matches(&MetaValue::Float(7600.0), Some(1e-5)));
        assert!(MetaValue::from("600ZD").matches(&MetaValue::from("600ZD"), Some(1e-5)));
    }

    #[test]
    fn test_mjd_from_date_time() {
        let mjd = mjd_from_date_time("2020-01-01", Some("12:00:00.00")).unwrap();
        assert!((mjd - 58849.5).abs() < 1e-9);
        let mjd = mjd_from_date_time("2020-01-01T06:00:00", None).unwrap();
        assert!((mjd - 58849.25).abs() < 1e-9);
        assert!(mjd_from_date_time("01/01/2020", None).is_err());
    }

    #[test]
    fn test_frame_meta_access() {
        let meta = FrameMeta::new("d0101_0001.fits", PathBuf::from("/raw"))
            .with(MetaKey::Exptime, 60.0)
            .with(MetaKey::Dispname, "830G");
        assert_eq!(meta.exptime(), Some(60.0));
        assert_eq!(meta.get_str(MetaKey::Dispname), Some("830G"));
        assert_eq!(meta.display(MetaKey::Decker), "None");
        assert_eq!(meta.path(), PathBuf::from("/raw/d0101_0001.fits"));
    }
}
