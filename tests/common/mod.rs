#![allow(dead_code)]

use deimos_redux::header::{Card, HeaderValue};
use std::path::{Path, PathBuf};

// ---- Synthetic DEIMOS frames ----

pub const NROWS: usize = 6;
pub const NDATA: usize = 4;
pub const POSTPIX: usize = 2;

const BLOCK: usize = 2880;

pub fn s(v: &str) -> HeaderValue {
    HeaderValue::Str(v.to_string())
}

fn push_cards(out: &mut Vec<u8>, cards: &[Card]) {
    let start = out.len();
    for card in cards {
        out.extend_from_slice(card.render().as_bytes());
    }
    out.extend_from_slice(format!("{:<80}", "END").as_bytes());
    pad(out, start, b' ');
}

fn pad(out: &mut Vec<u8>, start: usize, fill: u8) {
    let len = out.len() - start;
    let padded = len.div_ceil(BLOCK) * BLOCK;
    out.resize(start + padded, fill);
}

/// On-disk encoding of synthetic image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Encoding {
    /// BITPIX -32
    Float32,
    /// BITPIX 16 with BZERO 32768, as the DEIMOS controller writes counts
    Unsigned16,
}

/// Write a multi-extension file: an empty primary HDU with `primary`
/// cards, then one BITPIX -32 image per entry of `images`.
pub fn write_mef(
    path: &Path,
    primary: &[(&str, HeaderValue)],
    images: &[(Vec<(&str, HeaderValue)>, Vec<Vec<f32>>)],
) {
    write_mef_encoded(path, primary, images, Encoding::Float32);
}

pub fn write_mef_encoded(
    path: &Path,
    primary: &[(&str, HeaderValue)],
    images: &[(Vec<(&str, HeaderValue)>, Vec<Vec<f32>>)],
    encoding: Encoding,
) {
    let mut out = Vec::new();
    let mut cards = vec![
        Card::new("SIMPLE", HeaderValue::Bool(true)),
        Card::new("BITPIX", HeaderValue::Int(8)),
        Card::new("NAXIS", HeaderValue::Int(0)),
        Card::new("EXTEND", HeaderValue::Bool(true)),
    ];
    cards.extend(primary.iter().map(|(k, v)| Card::new(k, v.clone())));
    push_cards(&mut out, &cards);

    let bitpix = match encoding {
        Encoding::Float32 => -32,
        Encoding::Unsigned16 => 16,
    };
    for (extra, rows) in images {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        let mut cards = vec![
            Card::new("XTENSION", s("IMAGE")),
            Card::new("BITPIX", HeaderValue::Int(bitpix)),
            Card::new("NAXIS", HeaderValue::Int(2)),
            Card::new("NAXIS1", HeaderValue::Int(ncols as i64)),
            Card::new("NAXIS2", HeaderValue::Int(nrows as i64)),
            Card::new("PCOUNT", HeaderValue::Int(0)),
            Card::new("GCOUNT", HeaderValue::Int(1)),
        ];
        if encoding == Encoding::Unsigned16 {
            cards.push(Card::new("BSCALE", HeaderValue::Float(1.0)));
            cards.push(Card::new("BZERO", HeaderValue::Float(32768.0)));
        }
        cards.extend(extra.iter().map(|(k, v)| Card::new(k, v.clone())));
        push_cards(&mut out, &cards);

        let start = out.len();
        for row in rows {
            for v in row {
                match encoding {
                    Encoding::Float32 => out.extend_from_slice(&v.to_be_bytes()),
                    Encoding::Unsigned16 => {
                        let stored = (*v as i32 - 32768) as i16;
                        out.extend_from_slice(&stored.to_be_bytes());
                    }
                }
            }
        }
        pad(&mut out, start, 0);
    }
    std::fs::write(path, out).unwrap();
}

/// Gzip `path` in place of a `.gz` sibling and remove the original.
pub fn gzip_file(path: &Path) -> PathBuf {
    use std::io::Write;
    let bytes = std::fs::read(path).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&bytes).unwrap();
    let gz = PathBuf::from(format!("{}.gz", path.display()));
    std::fs::write(&gz, encoder.finish().unwrap()).unwrap();
    std::fs::remove_file(path).unwrap();
    gz
}

/// Observation settings of a synthetic frame.
pub struct Exposure<'a> {
    pub obstype: &'a str,
    pub lamps: &'a str,
    pub hatch: &'a str,
    pub grating: &'a str,
    pub mask: &'a str,
    pub ampmode: &'a str,
    pub dec: &'a str,
    pub utc: &'a str,
    pub rotposn: f64,
    pub mosmode: &'a str,
    pub binning: &'a str,
    /// DETSEC runs high to low on both axes
    pub flipped: bool,
    pub encoding: Encoding,
}

impl Default for Exposure<'_> {
    fn default() -> Self {
        Self {
            obstype: "Object",
            lamps: "Off",
            hatch: "open",
            grating: "830G",
            mask: "dra11",
            ampmode: "SINGLE:B",
            dec: "+02:00:00",
            utc: "10:00:00",
            rotposn: -90.0,
            mosmode: "Spectral",
            binning: "1,1",
            flipped: false,
            encoding: Encoding::Float32,
        }
    }
}

/// Write an 8-chip DEIMOS frame. Data pixels of chip `n` hold `100 * n`
/// plus the column index, overscan pixels hold 10.
pub fn write_deimos_frame(dir: &Path, name: &str, exp: &Exposure<'_>) -> PathBuf {
    let primary = vec![
        ("INSTRUME", s("DEIMOS: real science mosaic CCD subsystem")),
        ("AMPMODE", s(exp.ampmode)),
        ("MOSMODE", s(exp.mosmode)),
        ("BINNING", s(exp.binning)),
        ("POSTPIX", HeaderValue::Int(POSTPIX as i64)),
        ("ELAPTIME", HeaderValue::Float(30.0)),
        ("RA", s("10:00:00.0")),
        ("DEC", s(exp.dec)),
        ("TARGNAME", s("cosmos")),
        ("SLMSKNAM", s(exp.mask)),
        ("GRATENAM", s(exp.grating)),
        ("GRATEPOS", HeaderValue::Int(3)),
        ("G3TLTWAV", HeaderValue::Float(8100.0)),
        ("G3TLTVAL", HeaderValue::Float(27.0)),
        ("HATCHPOS", s(exp.hatch)),
        ("OBSTYPE", s(exp.obstype)),
        ("LAMPS", s(exp.lamps)),
        ("DATE-OBS", s("2020-01-01")),
        ("UTC", s(exp.utc)),
        ("OBJECT", s("cosmos")),
        ("DWFILNAM", s("GG455")),
        ("FRAMENO", HeaderValue::Int(57)),
        ("AIRMASS", HeaderValue::Float(1.1)),
        ("ROTPOSN", HeaderValue::Float(exp.rotposn)),
    ];

    let datasec = format!("[1:{},1:{}]", NDATA, NROWS);
    let detsec = if exp.flipped {
        format!("[{}:1,{}:1]", NDATA, NROWS)
    } else {
        datasec.clone()
    };
    let images: Vec<(Vec<(&str, HeaderValue)>, Vec<Vec<f32>>)> = (1..=8)
        .map(|chip| {
            let cards = vec![
                ("DATASEC", s(&datasec)),
                ("DETSEC", s(&detsec)),
                ("CCDNAME", s(&format!("CHIP{}", chip))),
            ];
            let rows = (0..NROWS)
                .map(|_| {
                    (0..NDATA + POSTPIX)
                        .map(|c| {
                            if c < NDATA {
                                (100 * chip + c) as f32
                            } else {
                                10.0
                            }
                        })
                        .collect()
                })
                .collect();
            (cards, rows)
        })
        .collect();

    let path = dir.join(name);
    write_mef_encoded(&path, &primary, &images, exp.encoding);
    path
}
