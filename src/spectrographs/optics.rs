//! DEIMOS grating orientation and CCD layout.

use anyhow::{bail, Context, Result};
use nalgebra::{Matrix2, Vector2};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::header::Header;

/// A reflection grating as seen by the optical model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReflectionGrating {
    /// Lines per mm.
    pub ruling: f64,
    /// Degrees.
    pub tilt: f64,
    pub roll: f64,
    pub yaw: f64,
    /// Angstroms.
    pub central_wave: f64,
}

/// Grating settings read from a raw header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GratingSetting {
    pub slider: i64,
    pub name: String,
    pub ruling: f64,
    pub central_wave: f64,
    /// Tilt after applying the orientation calibration.
    pub tilt: f64,
    pub roll: f64,
    pub yaw: f64,
    /// `None` when a mirror is in the beam.
    pub grating: Option<ReflectionGrating>,
}

fn digits_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9]").expect("digit regex is valid"))
}

/// Ruling in lines/mm from a grating name such as `830G`; `Mirror` is 0.
pub fn ruling_from_name(name: &str) -> Result<f64> {
    if name.contains("Mirror") {
        return Ok(0.0);
    }
    let digits = digits_regex().replace_all(name, "");
    let ruling: f64 = digits
        .parse()
        .with_context(|| format!("Cannot read a ruling from grating name '{}'", name))?;
    Ok(if (ruling - 1200.0).abs() < 0.5 {
        1200.06
    } else if (ruling - 831.0).abs() < 2.0 {
        831.90
    } else {
        ruling
    })
}

/// Calibrated roll, yaw and tilt for a grating in the given slider.
///
/// Coefficients apply to data taken after the 2016 servicing.
pub fn grating_orientation(slider: i64, ruling: f64, tilt: f64) -> Result<(f64, f64, f64)> {
    let ruling = ruling as i64;
    if slider == 2 && ruling == 0 {
        // Mirror in place of the grating
        return Ok((0.0, 0.0, -19.423));
    }
    if slider == 2 {
        bail!("Ruling should be 0 if slider in position 2.");
    }

    let coeffs: [f64; 4] = match (slider, ruling) {
        (3, 600) => [0.145, -0.008, 5.6e-4, -0.146],
        (3, 831) => [0.143, 0.000, 5.6e-4, -0.018],
        (3, 900) => [0.141, 0.000, 5.6e-4, -0.118],
        (3, 1200) => [0.145, 0.055, 5.6e-4, -0.141],
        (3, _) => [0.145, 0.000, 5.6e-4, -0.141],
        (4, 600) => [-0.065, 0.063, 6.9e-4, -0.108],
        (4, 831) => [-0.034, 0.060, 6.9e-4, -0.038],
        (4, 900) => [-0.064, 0.083, 6.9e-4, -0.060],
        (4, 1200) => [-0.052, 0.122, 6.9e-4, -0.110],
        (4, _) => [-0.050, 0.080, 6.9e-4, -0.110],
        (other, _) => bail!("No orientation calibration for slider {}", other),
    };
    Ok((coeffs[0], coeffs[1], tilt * (1.0 - coeffs[2]) + coeffs[3]))
}

/// Read the grating slider, name, tilt and central wavelength from a
/// primary header.
pub fn grating_from_header(header: &Header) -> Result<GratingSetting> {
    let slider = header
        .get_i64("GRATEPOS")
        .context("Header card GRATEPOS is missing")?;
    let (wave_card, tilt_card) = match slider {
        3 => ("G3TLTWAV", "G3TLTVAL"),
        2 | 4 => ("G4TLTWAV", "G4TLTVAL"),
        other => bail!("Slider has unknown value: {}", other),
    };
    let central_wave = header
        .get_f64(wave_card)
        .with_context(|| format!("Header card {} is missing", wave_card))?;
    let raw_tilt = header
        .get_f64(tilt_card)
        .with_context(|| format!("Header card {} is missing", tilt_card))?;
    let name = header.require_str("GRATENAM")?;
    let ruling = ruling_from_name(&name)?;

    let (roll, yaw, tilt) = grating_orientation(slider, ruling, raw_tilt)?;
    let grating = (ruling != 0.0).then(|| ReflectionGrating {
        ruling,
        tilt,
        roll,
        yaw,
        central_wave,
    });

    Ok(GratingSetting {
        slider,
        name,
        ruling,
        central_wave,
        tilt,
        roll,
        yaw,
        grating,
    })
}

/// Centre and rotation of each DEIMOS CCD in the image plane.
///
/// Pixel coordinates are 1-indexed.
#[derive(Debug, Clone)]
pub struct DeimosDetectorMap {
    pub nccd: usize,
    /// Pixels per CCD along x and y.
    pub npix: Vector2<f64>,
    /// mm per pixel.
    pub pixel_size: f64,
    /// Gap between CCDs in mm.
    pub ccd_gap: Vector2<f64>,
    /// Inactive border of each CCD in mm.
    pub ccd_edge: Vector2<f64>,
    /// Effective CCD footprint in pixels.
    pub ccd_size: Vector2<f64>,
    pub ccd_center: Vec<Vector2<f64>>,
    /// Radians.
    pub rotation: Vec<f64>,
    pub rot_matrix: Vec<Matrix2<f64>>,
}

impl Default for DeimosDetectorMap {
    fn default() -> Self {
        Self::new()
    }
}

impl DeimosDetectorMap {
    pub fn new() -> Self {
        let npix = Vector2::new(2048.0, 4096.0);
        let pixel_size = 0.015;
        let ccd_gap = Vector2::new(1.0, 0.1);
        let ccd_edge = Vector2::new(0.154, 0.070);
        let ccd_size = npix + (ccd_edge * 2.0 + ccd_gap) / pixel_size;

        let origin = [
            [-1.5, -0.5],
            [-0.5, -0.5],
            [0.5, -0.5],
            [1.5, -0.5],
            [-1.5, 0.5],
            [-0.5, 0.5],
            [0.5, 0.5],
            [1.5, 0.5],
        ];
        let offset = [
            [-20.05, 14.12],
            [-12.64, 7.25],
            [0.00, 0.00],
            [-1.34, -19.92],
            [-19.02, 16.46],
            [-9.65, 8.95],
            [1.88, 1.02],
            [4.81, -24.01],
        ];
        let ccd_center = origin
            .iter()
            .zip(offset.iter())
            .map(|(o, d)| Vector2::new(o[0] * ccd_size.x + d[0], o[1] * ccd_size.y + d[1]))
            .collect();

        let rotation: Vec<f64> = [-0.082, 0.030, 0.0, -0.1206, 0.136, -0.06, -0.019, -0.082]
            .iter()
            .map(|deg: &f64| deg.to_radians())
            .collect();
        let rot_matrix = rotation
            .iter()
            .map(|a| Matrix2::new(a.cos(), -a.sin(), a.sin(), a.cos()))
            .collect();

        Self {
            nccd: 8,
            npix,
            pixel_size,
            ccd_gap,
            ccd_edge,
            ccd_size,
            ccd_center,
            rotation,
            rot_matrix,
        }
    }

    /// Map image-plane coordinates (pixels, or mm when `in_mm`) to a CCD
    /// number and 1-indexed pixel coordinates on it. The CCD is 0 when the
    /// point falls off every detector.
    pub fn ccd_coordinates(&self, x_img: f64, y_img: f64, in_mm: bool) -> (usize, f64, f64) {
        let scale = if in_mm { 1.0 / self.pixel_size } else { 1.0 };
        let point = Vector2::new(x_img * scale, y_img * scale);

        for (i, (center, rot)) in self.ccd_center.iter().zip(&self.rot_matrix).enumerate() {
            // Undo the CCD rotation about its centre
            let local = rot.transpose() * (point - center);
            let x = local.x + (self.npix.x + 1.0) / 2.0;
            let y = local.y + (self.npix.y + 1.0) / 2.0;
            if x >= 0.5 && x < self.npix.x + 0.5 && y >= 0.5 && y < self.npix.y + 0.5 {
                return (i + 1, x, y);
            }
        }
        (0, -1.0, -1.0)
    }
}
