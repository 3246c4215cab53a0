use anyhow::{bail, Context, Result};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// A detector section in numpy (row, column) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// 0-indexed, end-exclusive row range.
    pub rows: Range<usize>,
    /// 0-indexed, end-exclusive column range.
    pub cols: Range<usize>,
    pub rows_flipped: bool,
    pub cols_flipped: bool,
}

impl Section {
    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.cols.len()
    }
}

fn section_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\[\s*(\d+)\s*:\s*(\d+)\s*,\s*(\d+)\s*:\s*(\d+)\s*\]\s*$")
            .expect("section regex is valid")
    })
}

/// Parse an IRAF/FITS section string such as `[1:2048,1:4096]`.
///
/// The first range indexes columns (NAXIS1) and the second rows (NAXIS2),
/// both 1-indexed and inclusive.
pub fn parse_section(text: &str) -> Result<Section> {
    let caps = section_regex()
        .captures(text)
        .with_context(|| format!("Invalid detector section: {}", text))?;
    let num = |i: usize| -> Result<usize> {
        caps[i]
            .parse::<usize>()
            .with_context(|| format!("Invalid number in section {}", text))
    };
    let (c1, c2, r1, r2) = (num(1)?, num(2)?, num(3)?, num(4)?);
    if c1 == 0 || c2 == 0 || r1 == 0 || r2 == 0 {
        bail!("Detector sections are 1-indexed: {}", text);
    }

    let to_range = |a: usize, b: usize| -> Range<usize> {
        if a <= b {
            (a - 1)..b
        } else {
            (b - 1)..a
        }
    };

    Ok(Section {
        rows: to_range(r1, r2),
        cols: to_range(c1, c2),
        rows_flipped: r1 > r2,
        cols_flipped: c1 > c2,
    })
}

/// Parse a binning string (`"1,1"`, `"2 1"`, `"1x2"`) into its two factors.
pub fn parse_binning(text: &str) -> Result<(u32, u32)> {
    let parts: Vec<&str> = text
        .split(|c: char| c == ',' || c == 'x' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.len() != 2 {
        bail!("Unable to parse binning: {}", text);
    }
    let first = parts[0]
        .parse()
        .with_context(|| format!("Unable to parse binning: {}", text))?;
    let second = parts[1]
        .parse()
        .with_context(|| format!("Unable to parse binning: {}", text))?;
    Ok((first, second))
}

/// Binning in the order used by the reduction: spectral then spatial.
pub fn binning_to_string(binspec: u32, binspatial: u32) -> String {
    format!("{},{}", binspec, binspatial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_section_ascending() {
        let s = parse_section("[1:2048,1:4096]").unwrap();
        assert_eq!(s.rows, 0..4096);
        assert_eq!(s.cols, 0..2048);
        assert!(!s.rows_flipped);
        assert!(!s.cols_flipped);
    }

    #[test]
    fn test_parse_section_descending() {
        let s = parse_section("[2048:1, 8192:4097]").unwrap();
        assert_eq!(s.cols, 0..2048);
        assert_eq!(s.rows, 4096..8192);
        assert!(s.rows_flipped);
        assert!(s.cols_flipped);
    }

    #[test]
    fn test_parse_section_rejects_garbage() {
        assert!(parse_section("1:10,1:10").is_err());
        assert!(parse_section("[0:10,1:10]").is_err());
    }

    #[test]
    fn test_binning() {
        assert_eq!(parse_binning("1,1").unwrap(), (1, 1));
        assert_eq!(parse_binning("2 1").unwrap(), (2, 1));
        assert_eq!(parse_binning("1x2").unwrap(), (1, 2));
        assert!(parse_binning("2").is_err());
        assert_eq!(binning_to_string(2, 1), "2,1");
    }
}
