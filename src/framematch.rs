use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Frame types a raw exposure can be assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    Arc,
    Bias,
    Dark,
    Pinhole,
    PixelFlat,
    IllumFlat,
    Science,
    Standard,
    Trace,
    Tilt,
}

impl FrameType {
    pub const ALL: [FrameType; 10] = [
        FrameType::Arc,
        FrameType::Bias,
        FrameType::Dark,
        FrameType::Pinhole,
        FrameType::PixelFlat,
        FrameType::IllumFlat,
        FrameType::Science,
        FrameType::Standard,
        FrameType::Trace,
        FrameType::Tilt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameType::Arc => "arc",
            FrameType::Bias => "bias",
            FrameType::Dark => "dark",
            FrameType::Pinhole => "pinhole",
            FrameType::PixelFlat => "pixelflat",
            FrameType::IllumFlat => "illumflat",
            FrameType::Science => "science",
            FrameType::Standard => "standard",
            FrameType::Trace => "trace",
            FrameType::Tilt => "tilt",
        }
    }

    /// Name of the parameter group holding this frame type's settings.
    pub fn par_group(&self) -> &'static str {
        match self {
            FrameType::Arc => "arcframe",
            FrameType::Bias => "biasframe",
            FrameType::Dark => "darkframe",
            FrameType::Pinhole => "pinholeframe",
            FrameType::PixelFlat => "pixelflatframe",
            FrameType::IllumFlat => "illumflatframe",
            FrameType::Science => "scienceframe",
            FrameType::Standard => "standardframe",
            FrameType::Trace => "traceframe",
            FrameType::Tilt => "tiltframe",
        }
    }

    fn bit(&self) -> u16 {
        1 << (*self as u16)
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match FrameType::ALL.iter().find(|t| t.as_str().eq_ignore_ascii_case(s)) {
            Some(t) => Ok(*t),
            None => bail!(
                "Unknown frame type '{}'; valid types are: {}",
                s,
                FrameType::ALL.map(|t| t.as_str()).join(", ")
            ),
        }
    }
}

/// Set of frame types assigned to one exposure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FrameTypeSet(u16);

impl FrameTypeSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Self {
        Self(bits & ((1 << FrameType::ALL.len()) - 1))
    }

    pub fn insert(&mut self, ftype: FrameType) {
        self.0 |= ftype.bit();
    }

    pub fn remove(&mut self, ftype: FrameType) {
        self.0 &= !ftype.bit();
    }

    pub fn contains(&self, ftype: FrameType) -> bool {
        self.0 & ftype.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = FrameType> + '_ {
        FrameType::ALL.into_iter().filter(|t| self.contains(*t))
    }
}

impl fmt::Display for FrameTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let names: Vec<&str> = self.iter().map(|t| t.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for FrameTypeSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut set = FrameTypeSet::empty();
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(set);
        }
        for name in s.split(',') {
            set.insert(name.parse()?);
        }
        Ok(set)
    }
}

impl Serialize for FrameTypeSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FrameTypeSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Check an exposure time against an `[min, max]` range. The lower bound
/// is exclusive, the upper inclusive; a missing exposure time never passes.
pub fn check_frame_exptime(exptime: Option<f64>, exprng: [Option<f64>; 2]) -> bool {
    let Some(exptime) = exptime else {
        return false;
    };
    if let Some(lo) = exprng[0] {
        if exptime <= lo {
            return false;
        }
    }
    if let Some(hi) = exprng[1] {
        if exptime > hi {
            return false;
        }
    }
    true
}
