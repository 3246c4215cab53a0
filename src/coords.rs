//! Sky coordinate helpers used for pointing offsets and object matching.

use anyhow::{bail, Context, Result};

/// Parse a right ascension given either in decimal degrees or as
/// sexagesimal hours (`hh:mm:ss.s`).
pub fn parse_ra(text: &str) -> Result<f64> {
    let text = text.trim();
    if text.contains(':') || text.contains(' ') {
        Ok(parse_sexagesimal(text)? * 15.0)
    } else {
        text.parse::<f64>()
            .with_context(|| format!("Invalid RA: {}", text))
    }
}

/// Parse a declination given in decimal degrees or `±dd:mm:ss.s`.
pub fn parse_dec(text: &str) -> Result<f64> {
    let text = text.trim();
    if text.contains(':') || text.contains(' ') {
        parse_sexagesimal(text)
    } else {
        text.parse::<f64>()
            .with_context(|| format!("Invalid DEC: {}", text))
    }
}

fn parse_sexagesimal(text: &str) -> Result<f64> {
    let negative = text.starts_with('-');
    let parts: Vec<f64> = text
        .trim_start_matches(['-', '+'])
        .split([':', ' '])
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .with_context(|| format!("Invalid sexagesimal value: {}", text))
        })
        .collect::<Result<_>>()?;
    if parts.is_empty() || parts.len() > 3 {
        bail!("Invalid sexagesimal value: {}", text);
    }
    let value = parts
        .iter()
        .zip([1.0, 60.0, 3600.0])
        .map(|(v, div)| v / div)
        .sum::<f64>();
    Ok(if negative { -value } else { value })
}

/// Great-circle separation in degrees (Vincenty formula).
pub fn separation(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (d1, d2) = (dec1.to_radians(), dec2.to_radians());
    let dra = (ra2 - ra1).to_radians();
    let num1 = d2.cos() * dra.sin();
    let num2 = d1.cos() * d2.sin() - d1.sin() * d2.cos() * dra.cos();
    let denom = d1.sin() * d2.sin() + d1.cos() * d2.cos() * dra.cos();
    num1.hypot(num2).atan2(denom).to_degrees()
}

/// Position angle (east of north) of the second point from the first, in degrees.
pub fn position_angle(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (d1, d2) = (dec1.to_radians(), dec2.to_radians());
    let dra = (ra2 - ra1).to_radians();
    let y = dra.sin() * d2.cos();
    let x = d1.cos() * d2.sin() - d1.sin() * d2.cos() * dra.cos();
    y.atan2(x).to_degrees()
}

/// One telescope pointing.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointing {
    pub mjd: f64,
    pub ra: f64,
    pub dec: f64,
    /// Rotator position (ROTPOSN) in degrees.
    pub rotposn: f64,
}

/// Offsets along the slit, in arcsec, of each pointing relative to the
/// earliest one. The result follows MJD order. Objects in the slit move
/// by the negative of these values.
pub fn telescope_offsets(pointings: &[Pointing]) -> Vec<f64> {
    let mut sorted: Vec<&Pointing> = pointings.iter().collect();
    sorted.sort_by(|a, b| a.mjd.total_cmp(&b.mjd));

    let Some(first) = sorted.first() else {
        return Vec::new();
    };

    sorted
        .iter()
        .map(|p| {
            let offset = separation(first.ra, first.dec, p.ra, p.dec) * 3600.0;
            let pa = position_angle(first.ra, first.dec, p.ra, p.dec);
            let mask_pa = p.rotposn + 90.0;
            offset * (pa - mask_pa).to_radians().cos()
        })
        .collect()
}
