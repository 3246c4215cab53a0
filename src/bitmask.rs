//! Named bit flags and the science-image pixel mask.

use nalgebra::DMatrix;
use thiserror::Error;

use crate::spectrographs::detector::DetectorPar;

#[derive(Debug, Error, PartialEq)]
pub enum BitMaskError {
    #[error("'{0}' is not a valid bit name")]
    UnknownBit(String),
    #[error("{0} bits requested; a mask holds at most 64")]
    TooManyBits(usize),
    #[error("bit name '{0}' is repeated")]
    DuplicateBit(String),
    #[error("{name} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: &'static str,
        found: (usize, usize),
        expected: (usize, usize),
    },
}

/// Bits available in a `u64` mask value.
pub const MAX_BITS: usize = u64::BITS as usize;

/// Ordered set of named bits; the first name is bit 0.
#[derive(Debug, Clone, PartialEq)]
pub struct BitMask {
    keys: Vec<String>,
    descr: Vec<String>,
}

impl BitMask {
    pub fn new(bits: &[(&str, &str)]) -> Result<Self, BitMaskError> {
        if bits.len() > MAX_BITS {
            return Err(BitMaskError::TooManyBits(bits.len()));
        }
        for (i, (key, _)) in bits.iter().enumerate() {
            if bits[..i].iter().any(|(k, _)| k == key) {
                return Err(BitMaskError::DuplicateBit(key.to_string()));
            }
        }
        Ok(Self::from_names(bits))
    }

    /// Mask from a fixed list whose length is checked at compile time.
    fn from_fixed<const N: usize>(bits: &[(&str, &str); N]) -> Self {
        const { assert!(N <= MAX_BITS) };
        Self::from_names(bits)
    }

    fn from_names(bits: &[(&str, &str)]) -> Self {
        Self {
            keys: bits.iter().map(|(k, _)| k.to_string()).collect(),
            descr: bits.iter().map(|(_, d)| d.to_string()).collect(),
        }
    }

    pub fn nbits(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Name and description of each bit, in bit order.
    pub fn info(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys
            .iter()
            .zip(&self.descr)
            .map(|(k, d)| (k.as_str(), d.as_str()))
    }

    pub fn bit(&self, key: &str) -> Result<u32, BitMaskError> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|i| i as u32)
            .ok_or_else(|| BitMaskError::UnknownBit(key.to_string()))
    }

    /// Smallest unsigned integer width (8, 16, 32 or 64) that holds every bit.
    pub fn minimum_dtype_bits(&self) -> u32 {
        match self.nbits() {
            0..=8 => 8,
            9..=16 => 16,
            17..=32 => 32,
            _ => 64,
        }
    }

    pub fn turn_on(&self, value: u64, key: &str) -> Result<u64, BitMaskError> {
        Ok(value | (1 << self.bit(key)?))
    }

    pub fn turn_off(&self, value: u64, key: &str) -> Result<u64, BitMaskError> {
        Ok(value & !(1 << self.bit(key)?))
    }

    /// Whether any of `keys` (every bit when `None`) is set.
    pub fn flagged(&self, value: u64, keys: Option<&[&str]>) -> Result<bool, BitMaskError> {
        let mask = match keys {
            None => (0..self.nbits()).fold(0u64, |m, b| m | (1 << b)),
            Some(keys) => keys
                .iter()
                .try_fold(0u64, |m, k| self.bit(k).map(|b| m | (1 << b)))?,
        };
        Ok(value & mask != 0)
    }

    /// Names of the bits set in `value`.
    pub fn flagged_bits(&self, value: u64) -> Vec<&str> {
        self.keys
            .iter()
            .enumerate()
            .filter(|(i, _)| value & (1 << i) != 0)
            .map(|(_, k)| k.as_str())
            .collect()
    }

    /// Per-pixel `flagged` over a mask image.
    pub fn flagged_image(
        &self,
        mask: &DMatrix<u64>,
        keys: Option<&[&str]>,
    ) -> Result<DMatrix<bool>, BitMaskError> {
        // Validate names once, then test each pixel
        self.flagged(0, keys)?;
        Ok(mask.map(|v| self.flagged(v, keys).unwrap_or(false)))
    }
}

/// Reasons a science image pixel is masked.
#[derive(Debug, Clone, PartialEq)]
pub struct ScienceImageBitMask {
    mask: BitMask,
}

impl Default for ScienceImageBitMask {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for ScienceImageBitMask {
    type Target = BitMask;

    fn deref(&self) -> &BitMask {
        &self.mask
    }
}

/// Inputs to [`ScienceImageBitMask::build_mask`].
pub struct MaskInputs<'a> {
    pub sciimg: &'a DMatrix<f64>,
    pub sciivar: &'a DMatrix<f64>,
    pub bpm: &'a DMatrix<u8>,
    pub crmask: Option<&'a DMatrix<bool>>,
    /// Slit id of each pixel, -1 off every slit.
    pub slitmask: Option<&'a DMatrix<i32>>,
    /// Flag pixels at or below the detector's minimum counts.
    pub mincounts: bool,
}

impl ScienceImageBitMask {
    pub fn new() -> Self {
        Self {
            mask: BitMask::from_fixed(&[
                ("BPM", "Component of the instrument-specific bad pixel mask"),
                ("CR", "Cosmic ray detected"),
                ("SATURATION", "Saturated pixel"),
                ("MINCOUNTS", "Pixel below the instrument-specific minimum counts"),
                ("OFFSLITS", "Pixel does not belong to any slit"),
                ("IS_NAN", "Pixel value is undefined"),
                ("IVAR0", "Inverse variance is undefined"),
                ("IVAR_NAN", "Inverse variance is NaN"),
                ("EXTRACT", "Pixel masked during local skysub and extraction"),
            ]),
        }
    }

    /// Bit value mask for a science image; 0 marks a good pixel.
    pub fn build_mask(
        &self,
        inputs: &MaskInputs<'_>,
        detector: &DetectorPar,
    ) -> Result<DMatrix<u64>, BitMaskError> {
        let shape = inputs.sciimg.shape();
        let check = |name: &'static str, found: (usize, usize)| {
            if found == shape {
                Ok(())
            } else {
                Err(BitMaskError::ShapeMismatch {
                    name,
                    found,
                    expected: shape,
                })
            }
        };
        check("sciivar", inputs.sciivar.shape())?;
        check("bpm", inputs.bpm.shape())?;
        if let Some(cr) = inputs.crmask {
            check("crmask", cr.shape())?;
        }
        if let Some(slits) = inputs.slitmask {
            check("slitmask", slits.shape())?;
        }

        let flag = |key: &str| self.bit(key).map(|b| 1u64 << b);
        let bpm = flag("BPM")?;
        let cr = flag("CR")?;
        let sat = flag("SATURATION")?;
        let minc = flag("MINCOUNTS")?;
        let offslit = flag("OFFSLITS")?;
        let isnan = flag("IS_NAN")?;
        let ivar0 = flag("IVAR0")?;
        let ivarnan = flag("IVAR_NAN")?;

        let mut mask = DMatrix::<u64>::zeros(shape.0, shape.1);
        for c in 0..shape.1 {
            for r in 0..shape.0 {
                let sci = inputs.sciimg[(r, c)];
                let ivar = inputs.sciivar[(r, c)];
                let value = &mut mask[(r, c)];
                if inputs.bpm[(r, c)] != 0 {
                    *value |= bpm;
                }
                if inputs.crmask.is_some_and(|m| m[(r, c)]) {
                    *value |= cr;
                }
                if sci >= detector.saturation {
                    *value |= sat;
                }
                if inputs.mincounts && sci <= detector.mincounts {
                    *value |= minc;
                }
                if inputs.slitmask.is_some_and(|m| m[(r, c)] == -1) {
                    *value |= offslit;
                }
                if !sci.is_finite() {
                    *value |= isnan;
                }
                if ivar.is_nan() || ivar <= 0.0 {
                    *value |= ivar0;
                }
                if !ivar.is_finite() {
                    *value |= ivarnan;
                }
            }
        }
        Ok(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrographs::{KeckDeimos, Spectrograph};

    #[test]
    fn test_turn_on_off_and_flags() {
        let bm = ScienceImageBitMask::new();
        assert_eq!(bm.nbits(), 9);
        assert_eq!(bm.minimum_dtype_bits(), 16);
        let v = bm.turn_on(0, "CR").unwrap();
        let v = bm.turn_on(v, "IVAR0").unwrap();
        assert_eq!(v, (1 << 1) | (1 << 6));
        assert_eq!(bm.flagged_bits(v), vec!["CR", "IVAR0"]);
        assert!(bm.flagged(v, Some(&["CR"][..])).unwrap());
        assert!(!bm.flagged(v, Some(&["BPM", "SATURATION"][..])).unwrap());
        assert!(bm.flagged(v, None).unwrap());
        let v = bm.turn_off(v, "CR").unwrap();
        assert_eq!(bm.flagged_bits(v), vec!["IVAR0"]);
        assert_eq!(bm.turn_on(0, "JUNK"), Err(BitMaskError::UnknownBit("JUNK".into())));
    }

    #[test]
    fn test_mask_width_limit() {
        let names: Vec<String> = (0..=MAX_BITS).map(|i| format!("B{}", i)).collect();
        let bits: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "")).collect();

        assert_eq!(BitMask::new(&bits), Err(BitMaskError::TooManyBits(65)));

        let full = BitMask::new(&bits[..MAX_BITS]).unwrap();
        assert_eq!(full.minimum_dtype_bits(), 64);
        let top = full.turn_on(0, "B63").unwrap();
        assert_eq!(top, 1 << 63);
        assert_eq!(full.flagged_bits(top), vec!["B63"]);
        assert!(full.flagged(u64::MAX, None).unwrap());

        assert_eq!(
            BitMask::new(&[("CR", ""), ("CR", "")]),
            Err(BitMaskError::DuplicateBit("CR".into()))
        );
    }

    #[test]
    fn test_build_mask() {
        let det = KeckDeimos::new().detector_par(1, None).unwrap();
        let sciimg = DMatrix::from_row_slice(2, 3, &[10.0, 70000.0, f64::NAN, 5.0, -2e10, 1.0]);
        let sciivar = DMatrix::from_row_slice(2, 3, &[1.0, 1.0, 1.0, 0.0, 1.0, f64::INFINITY]);
        let mut bpm = DMatrix::zeros(2, 3);
        bpm[(0, 0)] = 1u8;
        let mut crmask = DMatrix::from_element(2, 3, false);
        crmask[(1, 0)] = true;
        let slitmask = DMatrix::from_row_slice(2, 3, &[0, 0, 0, 0, 0, -1]);

        let bm = ScienceImageBitMask::new();
        let inputs = MaskInputs {
            sciimg: &sciimg,
            sciivar: &sciivar,
            bpm: &bpm,
            crmask: Some(&crmask),
            slitmask: Some(&slitmask),
            mincounts: true,
        };
        let mask = bm.build_mask(&inputs, &det).unwrap();
        assert_eq!(bm.flagged_bits(mask[(0, 0)]), vec!["BPM"]);
        assert_eq!(bm.flagged_bits(mask[(0, 1)]), vec!["SATURATION"]);
        assert_eq!(bm.flagged_bits(mask[(0, 2)]), vec!["IS_NAN"]);
        assert_eq!(bm.flagged_bits(mask[(1, 0)]), vec!["CR", "IVAR0"]);
        assert_eq!(bm.flagged_bits(mask[(1, 1)]), vec!["MINCOUNTS"]);
        assert_eq!(bm.flagged_bits(mask[(1, 2)]), vec!["OFFSLITS", "IVAR_NAN"]);

        let cr_only = bm.flagged_image(&mask, Some(&["CR"][..])).unwrap();
        assert_eq!(cr_only.iter().filter(|v| **v).count(), 1);

        let no_min = MaskInputs {
            mincounts: false,
            ..inputs
        };
        let mask = bm.build_mask(&no_min, &det).unwrap();
        assert_eq!(mask[(1, 1)], 0);
    }

    #[test]
    fn test_shape_mismatch() {
        let det = KeckDeimos::new().detector_par(1, None).unwrap();
        let sciimg = DMatrix::zeros(2, 2);
        let sciivar = DMatrix::zeros(2, 3);
        let bpm = DMatrix::zeros(2, 2);
        let inputs = MaskInputs {
            sciimg: &sciimg,
            sciivar: &sciivar,
            bpm: &bpm,
            crmask: None,
            slitmask: None,
            mincounts: true,
        };
        assert!(matches!(
            ScienceImageBitMask::new().build_mask(&inputs, &det),
            Err(BitMaskError::ShapeMismatch { name: "sciivar", .. })
        ));
    }
}
