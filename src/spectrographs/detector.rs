use serde::{Deserialize, Serialize};

/// Static properties of one detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorPar {
    /// 1-indexed detector number.
    pub det: usize,
    /// HDU holding this detector's pixels.
    pub dataext: usize,
    /// 0 when the spectral axis runs along rows.
    pub specaxis: usize,
    pub specflip: bool,
    pub spatflip: bool,
    /// Arcsec per unbinned pixel.
    pub platescale: f64,
    /// Dark current in e-/pixel/hour.
    pub darkcurr: f64,
    /// Saturation level in ADU.
    pub saturation: f64,
    /// Fraction of saturation where the response turns non-linear.
    pub nonlinear: f64,
    pub mincounts: f64,
    pub numamplifiers: usize,
    /// e-/ADU, one entry per amplifier.
    pub gain: Vec<f64>,
    /// Read noise in e-, one entry per amplifier.
    pub ronoise: Vec<f64>,
    /// `"spec,spat"` binning.
    pub binning: String,
}

impl DetectorPar {
    /// Counts above which a pixel is flagged non-linear.
    pub fn nonlinear_counts(&self) -> f64 {
        self.saturation * self.nonlinear
    }
}
