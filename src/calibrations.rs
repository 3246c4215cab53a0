//! Checks that a setup has the calibration frames its reduction needs.

use anyhow::{bail, Result};
use nalgebra::DMatrix;
use serde::Serialize;

use crate::framematch::FrameType;
use crate::metadata::FrameTable;
use crate::par::pypeitpar::frame_group_path;
use crate::par::ParSet;
use crate::spectrographs::DetectorPar;

/// Outcome of [`check_for_calibs`] for one setup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibCheck {
    pub setup: String,
    pub passed: bool,
    /// Number of frames found for each required type.
    pub found: Vec<(FrameType, usize)>,
    pub missing: Vec<FrameType>,
}

/// Frame types a reduction with these parameters needs.
///
/// Flats, bias and dark are only needed when science processing uses them
/// and the frame group does not name a replacement in `useframe`.
pub fn required_frame_types(par: &ParSet) -> Vec<FrameType> {
    let mut required = Vec::new();
    let optional = [
        (FrameType::PixelFlat, "use_pixelflat"),
        (FrameType::IllumFlat, "use_illumflat"),
        (FrameType::Bias, "use_biasimage"),
        (FrameType::Dark, "use_darkimage"),
    ];
    for (ftype, flag) in optional {
        let used = par.get_bool(&format!("scienceframe.process.{}", flag));
        let provided = par
            .get_str(&format!("{}.useframe", frame_group_path(ftype)))
            .is_some();
        if used && !provided {
            required.push(ftype);
        }
    }
    required.extend([
        FrameType::Arc,
        FrameType::Tilt,
        FrameType::Science,
        FrameType::Trace,
    ]);
    required
}

/// Check one setup of a typed, configured frame table.
///
/// Setups without science frames are not checked. Missing frames are an
/// error when `raise_error` is set, otherwise they are reported with a
/// warning and the check fails.
pub fn check_for_calibs(
    par: &ParSet,
    table: &FrameTable<'_>,
    setup: &str,
    raise_error: bool,
) -> Result<CalibCheck> {
    let mut check = CalibCheck {
        setup: setup.to_string(),
        passed: true,
        found: Vec::new(),
        missing: Vec::new(),
    };

    if table.find_frames(FrameType::Science, Some(setup)).is_empty() {
        tracing::debug!("Setup {} has no science frames; nothing to check", setup);
        return Ok(check);
    }

    for ftype in required_frame_types(par) {
        let count = table.find_frames(ftype, Some(setup)).len();
        check.found.push((ftype, count));
        if count == 0 {
            let msg = format!(
                "No frames of type={} provided for setup {}. Add them to your reduction file!",
                ftype, setup
            );
            if raise_error {
                bail!(msg);
            }
            tracing::warn!("⚠️  {}", msg);
            check.missing.push(ftype);
            check.passed = false;
        }
    }
    Ok(check)
}

/// Apply `calibrations.flatfield.saturated_slits` to a flat image.
///
/// Pixels at or above the non-linear level are saturated. With `crash`
/// any saturated pixel is an error, with `mask` the saturated pixels are
/// returned for masking, and with `continue` they are only reported.
pub fn check_saturated_flat(
    par: &ParSet,
    flat: &DMatrix<f64>,
    detector: &DetectorPar,
) -> Result<Option<DMatrix<bool>>> {
    let limit = detector.nonlinear_counts();
    let saturated = flat.map(|v| v >= limit);
    let count = saturated.iter().filter(|s| **s).count();
    if count == 0 {
        return Ok(None);
    }

    let mode = par
        .get_str("calibrations.flatfield.saturated_slits")
        .unwrap_or("crash");
    match mode {
        "crash" => bail!(
            "{} pixels of the flat on detector {} are saturated. Set \
             [calibrations][[flatfield]] saturated_slits = mask to mask them instead",
            count,
            detector.det
        ),
        "mask" => {
            tracing::warn!(
                "⚠️  Masking {} saturated flat pixels on detector {}",
                count,
                detector.det
            );
            Ok(Some(saturated))
        }
        _ => {
            tracing::warn!(
                "⚠️  {} saturated flat pixels on detector {}; continuing",
                count,
                detector.det
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{FrameMeta, MetaKey};
    use crate::spectrographs::{KeckDeimos, Spectrograph};
    use std::path::PathBuf;

    fn frame(name: &str, idname: &str, lamps: &str, hatch: &str) -> FrameMeta {
        FrameMeta::new(name, PathBuf::from("/raw"))
            .with(MetaKey::Exptime, 30.0)
            .with(MetaKey::Mode, "Spectral")
            .with(MetaKey::Amp, "SINGLE:B")
            .with(MetaKey::Idname, idname)
            .with(MetaKey::Lampstat01, lamps)
            .with(MetaKey::Hatch, hatch)
            .with(MetaKey::Dispname, "830G")
            .with(MetaKey::Decker, "dra11")
            .with(MetaKey::Binning, "1,1")
    }

    #[test]
    fn test_required_types_follow_processing() {
        let spec = KeckDeimos::new();
        let par = spec.default_par().unwrap();
        let required = required_frame_types(&par);
        assert!(required.contains(&FrameType::PixelFlat));
        assert!(!required.contains(&FrameType::Bias));
        assert!(!required.contains(&FrameType::Dark));

        let mut par = par;
        par.set("calibrations.pixelflatframe.useframe", "flat.fits").unwrap();
        par.set("scienceframe.process.use_biasimage", true).unwrap();
        let required = required_frame_types(&par);
        assert!(!required.contains(&FrameType::PixelFlat));
        assert!(required.contains(&FrameType::Bias));
    }

    #[test]
    fn test_check_for_calibs() {
        let spec = KeckDeimos::new();
        let par = spec.default_par().unwrap();
        let mut table = FrameTable::from_metas(
            &spec,
            vec![
                frame("sci.fits", "Object", "Off", "open"),
                frame("arc.fits", "Line", "Ne Ar", "closed"),
            ],
        );
        table.get_frame_types(&par);
        table.set_configurations();

        let check = check_for_calibs(&par, &table, "A", false).unwrap();
        assert!(!check.passed);
        assert_eq!(check.missing, vec![FrameType::PixelFlat, FrameType::IllumFlat, FrameType::Trace]);
        assert!(check_for_calibs(&par, &table, "A", true).is_err());

        let mut table = FrameTable::from_metas(
            &spec,
            vec![
                frame("sci.fits", "Object", "Off", "open"),
                frame("arc.fits", "Line", "Ne Ar", "closed"),
                frame("flat.fits", "IntFlat", "Qz", "closed"),
            ],
        );
        table.get_frame_types(&par);
        table.set_configurations();
        let check = check_for_calibs(&par, &table, "A", true).unwrap();
        assert!(check.passed);
        assert!(check.found.contains(&(FrameType::Trace, 1)));
    }

    #[test]
    fn test_setup_without_science_is_skipped() {
        let spec = KeckDeimos::new();
        let par = spec.default_par().unwrap();
        let mut table =
            FrameTable::from_metas(&spec, vec![frame("arc.fits", "Line", "Ne", "closed")]);
        table.get_frame_types(&par);
        table.set_configurations();
        let check = check_for_calibs(&par, &table, "A", true).unwrap();
        assert!(check.passed);
        assert!(check.found.is_empty());
    }

    #[test]
    fn test_saturated_flat_modes() {
        let spec = KeckDeimos::new();
        let detector = spec.detector_par(1, None).unwrap();
        let mut par = spec.default_par().unwrap();

        let clean = DMatrix::from_element(3, 3, 1000.0);
        assert!(check_saturated_flat(&par, &clean, &detector).unwrap().is_none());

        let mut flat = clean.clone();
        flat[(1, 2)] = detector.saturation;
        let err = check_saturated_flat(&par, &flat, &detector).unwrap_err();
        assert!(err.to_string().contains("saturated_slits = mask"));

        par.set("calibrations.flatfield.saturated_slits", "mask").unwrap();
        let mask = check_saturated_flat(&par, &flat, &detector).unwrap().unwrap();
        assert!(mask[(1, 2)]);
        assert_eq!(mask.iter().filter(|m| **m).count(), 1);

        par.set("calibrations.flatfield.saturated_slits", "continue").unwrap();
        assert!(check_saturated_flat(&par, &flat, &detector).unwrap().is_none());
    }
}
