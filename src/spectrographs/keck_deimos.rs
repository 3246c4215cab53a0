//! Keck/DEIMOS: metadata, frame typing, parameters and raw image assembly.

use anyhow::{Context, Result};
use nalgebra::DMatrix;
use std::path::{Path, PathBuf};

use super::detector::DetectorPar;
use super::optics::{grating_from_header, DeimosDetectorMap, GratingSetting};
use super::{base_subheader, MetaSource, Spectrograph, TelescopePar};
use crate::coords::{telescope_offsets, Pointing};
use crate::framematch::{check_frame_exptime, FrameType};
use crate::header::{FitsFile, Header};
use crate::meta::{mjd_from_date_time, FrameMeta, MetaKey, MetaValue};
use crate::par::pypeitpar::TELGRID_ROOT;
use crate::par::{default_pypeit_par, ParSet, ParValue};
use crate::parse::{binning_to_string, parse_binning, parse_section};
use crate::rawimage::{locate_raw_file, RawImage, RawImageError};

const NDET: usize = 8;
const VALID_AMP: &str = "SINGLE:B";
const VALID_MODE: &str = "Spectral";

/// Gratings with an archived wavelength template.
const TEMPLATE_GRATINGS: [&str; 5] = ["600ZD", "830G", "1200G", "1200B", "900ZD"];

/// Cards kept from the Keck Observatory Archive in extracted spectra.
const KOA_CARDS: [&str; 5] = ["KOAID", "PROGPI", "PROGID", "SEMESTER", "GUIDFWHM"];

/// Dark current (e-/pix/hr), gain (e-/ADU) and read noise (e-) per detector.
const DETECTOR_CALIB: [(f64, f64, f64); NDET] = [
    (4.19, 1.226, 2.570),
    (3.46, 1.188, 2.491),
    (4.03, 1.248, 2.618),
    (3.80, 1.220, 2.557),
    (4.71, 1.184, 2.482),
    (4.28, 1.177, 2.469),
    (3.33, 1.201, 2.518),
    (3.69, 1.230, 2.580),
];

/// Known bad columns per detector as `(start, end)`; negative values count
/// from the right edge and an end of 0 runs to the edge.
const BAD_COLUMNS: [&[(i64, i64)]; NDET] = [
    &[(1052, 1054)],
    &[(0, 4), (376, 381), (489, 490), (1333, 1335), (2047, 2048)],
    &[
        (0, 4),
        (221, 222),
        (260, 261),
        (366, 367),
        (816, 819),
        (851, 852),
        (940, 941),
        (1167, 1168),
        (1280, 1281),
        (1301, 1303),
        (1744, 1747),
        (-4, 0),
    ],
    &[(0, 4), (47, 48), (744, 745), (790, 792), (997, 999)],
    &[(25, 27), (128, 130), (1535, 1539)],
    &[],
    &[(426, 428), (676, 677), (1176, 1178)],
    &[(440, 441), (509, 513), (806, 807), (931, 934)],
];

#[derive(Debug, Clone, Default)]
pub struct KeckDeimos;

impl KeckDeimos {
    pub fn new() -> Self {
        Self
    }

    /// Grating setup of a raw frame.
    pub fn grating(&self, path: &Path) -> Result<GratingSetting> {
        let fits = FitsFile::open(path)?;
        grating_from_header(fits.primary())
            .with_context(|| format!("Failed to read grating from {}", path.display()))
    }

    pub fn detector_map(&self) -> DeimosDetectorMap {
        DeimosDetectorMap::new()
    }

    /// Telescope offsets along the slit (arcsec) of each file relative to
    /// the earliest one, in MJD order.
    pub fn telescope_offsets(&self, files: &[PathBuf]) -> Result<Vec<f64>> {
        let mut pointings = Vec::with_capacity(files.len());
        for path in files {
            let fits = FitsFile::open(path)?;
            let meta = self.meta_from_file(path)?;
            let missing = |key: &str| format!("{} has no {}", path.display(), key);
            pointings.push(Pointing {
                mjd: meta.get_f64(MetaKey::Mjd).with_context(|| missing("mjd"))?,
                ra: meta.get_f64(MetaKey::Ra).with_context(|| missing("ra"))?,
                dec: meta.get_f64(MetaKey::Dec).with_context(|| missing("dec"))?,
                rotposn: fits
                    .primary()
                    .get_f64("ROTPOSN")
                    .with_context(|| missing("ROTPOSN"))?,
            });
        }
        Ok(telescope_offsets(&pointings))
    }

    /// Pull the data and overscan regions of one chip (1-indexed HDU),
    /// flipped into detector orientation.
    fn read_chip(
        &self,
        fits: &FitsFile,
        chip: usize,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
        let header = fits.extension(chip).ok_or_else(|| RawImageError::BadSection {
            chip,
            reason: "HDU not found".to_string(),
        })?;
        let card = |name: &str| {
            header.get_str(name).ok_or_else(|| RawImageError::MissingCard {
                card: name.to_string(),
                hdu: chip,
            })
        };
        let datasec = parse_section(&card("DATASEC")?)?;
        let detsec = parse_section(&card("DETSEC")?)?;

        let full = fits.read_image(chip)?;
        let (nrows, ncols) = full.shape();
        if datasec.rows.end > nrows || datasec.cols.end > ncols {
            return Err(RawImageError::BadSection {
                chip,
                reason: format!(
                    "DATASEC exceeds the {}x{} image",
                    nrows, ncols
                ),
            }
            .into());
        }

        let mut data = full
            .view(
                (datasec.rows.start, datasec.cols.start),
                (datasec.nrows(), datasec.ncols()),
            )
            .into_owned();
        let mut oscan = full
            .view(
                (datasec.rows.start, datasec.cols.end),
                (datasec.nrows(), ncols - datasec.cols.end),
            )
            .into_owned();

        if detsec.rows_flipped {
            data = flip_rows(&data);
            oscan = flip_rows(&oscan);
        }
        if detsec.cols_flipped {
            data = flip_cols(&data);
            oscan = flip_cols(&oscan);
        }
        Ok((data, oscan))
    }
}

fn flip_rows(m: &DMatrix<f64>) -> DMatrix<f64> {
    let n = m.nrows();
    DMatrix::from_fn(n, m.ncols(), |r, c| m[(n - 1 - r, c)])
}

fn flip_cols(m: &DMatrix<f64>) -> DMatrix<f64> {
    let n = m.ncols();
    DMatrix::from_fn(m.nrows(), n, |r, c| m[(r, n - 1 - c)])
}

fn meta_str<'a>(meta: &'a FrameMeta, key: MetaKey) -> &'a str {
    meta.get_str(key).unwrap_or("")
}

impl Spectrograph for KeckDeimos {
    fn name(&self) -> &'static str {
        "keck_deimos"
    }

    fn camera(&self) -> &'static str {
        "DEIMOS"
    }

    fn telescope(&self) -> TelescopePar {
        TelescopePar::keck()
    }

    fn ndet(&self) -> usize {
        NDET
    }

    fn detector_par(&self, det: usize, binning: Option<&str>) -> Result<DetectorPar> {
        if det == 0 || det > NDET {
            return Err(RawImageError::BadDetector { det, ndet: NDET }.into());
        }
        let (darkcurr, gain, ronoise) = DETECTOR_CALIB[det - 1];
        Ok(DetectorPar {
            det,
            dataext: det,
            specaxis: 0,
            specflip: false,
            spatflip: false,
            platescale: 0.1185,
            darkcurr,
            saturation: 65535.0,
            nonlinear: 0.95,
            mincounts: -1e10,
            numamplifiers: 1,
            gain: vec![gain],
            ronoise: vec![ronoise],
            binning: binning.unwrap_or("1,1").to_string(),
        })
    }

    fn list_detectors(&self) -> (Vec<Vec<usize>>, bool) {
        (vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]], true)
    }

    fn default_par(&self) -> Result<ParSet> {
        let mut par = default_pypeit_par();
        par.set("rdx.spectrograph", self.name())?;

        par.set("flexure.spec_method", "boxcar")?;
        par.set("calibrations.slitedges.edge_thresh", 50.0)?;
        par.set("calibrations.slitedges.fit_order", 3)?;
        par.set("calibrations.slitedges.minimum_slit_gap", 0.25)?;
        par.set("calibrations.slitedges.minimum_slit_length_sci", 4.0)?;

        par.set("calibrations.wavelengths.lamps", vec!["ArI", "NeI", "KrI", "XeI"])?;
        par.set("calibrations.wavelengths.n_first", 3)?;
        par.set("calibrations.wavelengths.match_toler", 2.5)?;

        // Bias frames are not required
        par.reset_all_processimages_par("use_biasimage", false)?;

        par.set("calibrations.pixelflatframe.process.combine", "median")?;
        par.set("calibrations.pixelflatframe.process.comb_sigrej", 10.0)?;
        par.set("calibrations.arcframe.process.clip", false)?;
        par.set("calibrations.tiltframe.process.clip", false)?;
        par.set("calibrations.tilts.tracethresh", 10.0)?;

        par.set("scienceframe.process.sigclip", 4.0)?;
        par.set("scienceframe.process.objlim", 1.5)?;

        // 1.1 arcsec unbinned
        par.set("reduce.findobj.find_fwhm", 10.0)?;

        par.set(
            "sensfunc.IR.telgridfile",
            format!("{}/TelFit_MaunaKea_3100_26100_R20000.fits", TELGRID_ROOT),
        )?;
        Ok(par)
    }

    fn config_specific_par(&self, meta: &FrameMeta, mut par: ParSet) -> Result<ParSet> {
        let decker = meta_str(meta, MetaKey::Decker);
        let is_lvm = decker.contains("LVMslit");
        let is_long = decker.contains("Long");

        if is_lvm {
            par.set("rdx.detnum", vec![3i64, 7])?;
        }
        if is_long || is_lvm {
            par.set("calibrations.slitedges.sync_predict", "nearest")?;
        } else {
            par.set("calibrations.slitedges.use_maskdesign", true)?;
            par.set("calibrations.slitedges.minimum_slit_length_sci", ParValue::None)?;
            par.set("calibrations.slitedges.minimum_slit_length", 3.0)?;
            par.set("calibrations.slitedges.minimum_slit_gap", 0.0)?;
            par.set("calibrations.slitedges.edge_thresh", 10.0)?;
            par.set("calibrations.flatfield.tweak_slits", false)?;
            par.set("reduce.slitmask.assign_obj", true)?;
            par.set("reduce.slitmask.extract_missing_objs", true)?;
        }

        let dispname = meta_str(meta, MetaKey::Dispname);
        if TEMPLATE_GRATINGS.iter().any(|g| *g == dispname) {
            par.set("calibrations.wavelengths.method", "full_template")?;
            par.set(
                "calibrations.wavelengths.reid_arxiv",
                format!("keck_deimos_{}.fits", dispname),
            )?;
        }
        par.set("calibrations.wavelengths.lamps", vec!["use_header"])?;

        let binning = meta
            .get_str(MetaKey::Binning)
            .with_context(|| format!("{} has no binning", meta.filename))?;
        let (_, binspatial) = parse_binning(binning)?;
        par.set("calibrations.wavelengths.fwhm", 6.0 / binspatial as f64)?;
        par.set("calibrations.wavelengths.fwhm_fromlines", true)?;

        tracing::debug!(
            "Configuration parameters for {}: decker={}, dispname={}",
            meta.filename,
            decker,
            dispname
        );
        Ok(par)
    }

    fn meta_sources(&self) -> Vec<(MetaKey, MetaSource)> {
        let card = |card: &'static str| MetaSource::Card { ext: 0, card };
        vec![
            (MetaKey::Ra, card("RA")),
            (MetaKey::Dec, card("DEC")),
            (MetaKey::Target, card("TARGNAME")),
            (MetaKey::Decker, card("SLMSKNAM")),
            (MetaKey::Binning, MetaSource::Compound),
            (MetaKey::Mjd, MetaSource::Compound),
            (MetaKey::Exptime, card("ELAPTIME")),
            (MetaKey::Airmass, card("AIRMASS")),
            (MetaKey::Dispname, card("GRATENAM")),
            (MetaKey::Hatch, card("HATCHPOS")),
            (MetaKey::Dispangle, MetaSource::Compound),
            (MetaKey::Idname, card("OBSTYPE")),
            (MetaKey::Lampstat01, card("LAMPS")),
            (MetaKey::Dateobs, card("DATE-OBS")),
            (MetaKey::Utc, card("UTC")),
            (MetaKey::Mode, card("MOSMODE")),
            (MetaKey::Amp, card("AMPMODE")),
            (MetaKey::Object, card("OBJECT")),
            (MetaKey::Filter1, card("DWFILNAM")),
            (MetaKey::Frameno, card("FRAMENO")),
            (MetaKey::Instrument, card("INSTRUME")),
        ]
    }

    fn compound_meta(&self, headers: &[Header], key: MetaKey) -> Result<Option<MetaValue>> {
        let Some(primary) = headers.first() else {
            return Ok(None);
        };
        match key {
            MetaKey::Binning => {
                let Some(text) = primary.get_str("BINNING") else {
                    return Ok(None);
                };
                let (binspatial, binspec) = parse_binning(&text)?;
                Ok(Some(MetaValue::Str(binning_to_string(binspec, binspatial))))
            }
            MetaKey::Dispangle => match primary.get_i64("GRATEPOS") {
                Some(3) => Ok(primary.get_f64("G3TLTWAV").map(MetaValue::Float)),
                Some(4) => Ok(primary.get_f64("G4TLTWAV").map(MetaValue::Float)),
                other => {
                    tracing::warn!(
                        "⚠️  This is probably a problem. Non-standard DEIMOS GRATEPOS={:?}",
                        other
                    );
                    Ok(None)
                }
            },
            MetaKey::Mjd => {
                if let Some(mjd) = primary.get_f64("MJD-OBS") {
                    return Ok(Some(MetaValue::Float(mjd)));
                }
                let Some(date) = primary.get_str("DATE-OBS") else {
                    return Ok(None);
                };
                let utc = primary.get_str("UTC");
                Ok(Some(MetaValue::Float(mjd_from_date_time(&date, utc.as_deref())?)))
            }
            other => anyhow::bail!("Not ready for compound meta {}", other),
        }
    }

    fn meta_rtol(&self, key: MetaKey) -> Option<f64> {
        (key == MetaKey::Dispangle).then_some(1e-5)
    }

    fn configuration_keys(&self) -> Vec<MetaKey> {
        vec![
            MetaKey::Dispname,
            MetaKey::Decker,
            MetaKey::Binning,
            MetaKey::Dispangle,
            MetaKey::Amp,
            MetaKey::Filter1,
        ]
    }

    fn valid_configuration_values(&self) -> Vec<(MetaKey, Vec<&'static str>)> {
        vec![(MetaKey::Amp, vec![VALID_AMP]), (MetaKey::Mode, vec![VALID_MODE])]
    }

    fn config_independent_frames(&self) -> Vec<(FrameType, MetaKey)> {
        vec![
            (FrameType::Bias, MetaKey::Dateobs),
            (FrameType::Dark, MetaKey::Dateobs),
        ]
    }

    fn pypeit_file_keys(&self) -> Vec<MetaKey> {
        let mut keys: Vec<MetaKey> = crate::meta::CORE_KEYS.to_vec();
        for key in self.configuration_keys() {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys.extend([MetaKey::Dateobs, MetaKey::Utc, MetaKey::Frameno]);
        keys
    }

    fn check_frame_type(
        &self,
        ftype: FrameType,
        meta: &FrameMeta,
        exprng: [Option<f64>; 2],
    ) -> bool {
        let good_exp = check_frame_exptime(meta.exptime(), exprng)
            && meta_str(meta, MetaKey::Mode) == VALID_MODE;
        let idname = meta_str(meta, MetaKey::Idname);
        let lamps = meta_str(meta, MetaKey::Lampstat01);
        let hatch = meta_str(meta, MetaKey::Hatch);

        match ftype {
            FrameType::Science => {
                good_exp && idname == "Object" && lamps == "Off" && hatch == "open"
            }
            FrameType::Bias => good_exp && idname == "Bias" && lamps == "Off" && hatch == "closed",
            FrameType::PixelFlat | FrameType::Trace | FrameType::IllumFlat => {
                let is_flat = matches!(
                    (idname, hatch),
                    ("IntFlat", "closed") | ("DmFlat", "open") | ("SkyFlat", "open")
                );
                good_exp && is_flat && lamps != "Off"
            }
            // Never assigned for this instrument
            FrameType::Pinhole => false,
            FrameType::Dark => good_exp && idname == "Dark" && lamps == "Off" && hatch == "closed",
            FrameType::Arc | FrameType::Tilt => {
                good_exp && idname == "Line" && hatch == "closed" && lamps != "Off"
            }
            FrameType::Standard => {
                tracing::warn!("⚠️  Cannot determine if frames are of type {}", ftype);
                false
            }
        }
    }

    fn idname(&self, ftype: FrameType) -> Option<&'static str> {
        match ftype {
            FrameType::Arc => Some("Line"),
            FrameType::PixelFlat | FrameType::Trace => Some("IntFlat"),
            FrameType::Science => Some("Object"),
            _ => None,
        }
    }

    fn bpm(&self, shape: (usize, usize), det: usize) -> DMatrix<u8> {
        let (nrows, ncols) = shape;
        let mut mask = DMatrix::zeros(nrows, ncols);
        let Some(columns) = det.checked_sub(1).and_then(|i| BAD_COLUMNS.get(i)) else {
            return mask;
        };
        let resolve = |v: i64, is_end: bool| -> usize {
            if v < 0 || (is_end && v == 0) {
                (ncols as i64 + v).max(0) as usize
            } else {
                (v as usize).min(ncols)
            }
        };
        for &(start, end) in columns.iter() {
            let (c0, c1) = (resolve(start, false), resolve(end, true));
            for c in c0..c1.max(c0) {
                mask.column_mut(c).fill(1);
            }
        }
        mask
    }

    fn lamps_from_frames(&self, frames: &[&FrameMeta]) -> Vec<String> {
        let mut lamps: Vec<&str> = frames
            .iter()
            .filter_map(|f| f.get_str(MetaKey::Lampstat01))
            .flat_map(|s| s.split_whitespace())
            .collect();
        lamps.sort_unstable();
        lamps.dedup();
        lamps.into_iter().map(|l| format!("{}I", l)).collect()
    }

    fn read_raw(&self, raw_file: &Path, det: Option<usize>) -> Result<RawImage> {
        let path = locate_raw_file(raw_file)?;
        tracing::info!("📖 Reading DEIMOS file: {}", path.display());

        let fits = FitsFile::open(&path)?;
        let primary = fits.primary();
        let amp = primary.get_str("AMPMODE").unwrap_or_default();
        if amp != VALID_AMP {
            return Err(RawImageError::WrongAmpMode {
                expected: VALID_AMP.to_string(),
                found: amp,
            }
            .into());
        }
        let mode = primary.get_str("MOSMODE").unwrap_or_default();
        if mode != VALID_MODE {
            return Err(RawImageError::WrongMosMode {
                expected: VALID_MODE.to_string(),
                found: mode,
            }
            .into());
        }

        let postpix = primary
            .get_i64("POSTPIX")
            .ok_or(RawImageError::MissingCard {
                card: "POSTPIX".to_string(),
                hdu: 0,
            })?
            .max(0) as usize;
        let binning = primary.get_str("BINNING").unwrap_or_default();
        if binning.trim() != "1,1" {
            return Err(RawImageError::UnsupportedBinning(binning).into());
        }
        if let Some(d) = det {
            if d == 0 || d > NDET {
                return Err(RawImageError::BadDetector { det: d, ndet: NDET }.into());
            }
        }

        let (image, datasec_img, oscansec_img) = match det {
            Some(d) => {
                let (data, oscan) = self.read_chip(&fits, d)?;
                let (nr, nc) = data.shape();
                let width = nc + oscan.ncols();
                let mut image = DMatrix::zeros(nr, width);
                let mut datasec_img = DMatrix::zeros(nr, width);
                let mut oscansec_img = DMatrix::zeros(nr, width);
                image.view_mut((0, 0), (nr, nc)).copy_from(&data);
                datasec_img.view_mut((0, 0), (nr, nc)).fill(1u8);
                image.view_mut((0, nc), (nr, oscan.ncols())).copy_from(&oscan);
                oscansec_img.view_mut((0, nc), (nr, oscan.ncols())).fill(1u8);
                (image, datasec_img, oscansec_img)
            }
            None => {
                let mut chips = Vec::with_capacity(NDET);
                for chip in 1..=NDET {
                    chips.push(self.read_chip(&fits, chip)?);
                }
                let (nr, nc) = chips[0].0.shape();
                let width = 4 * nc + 4 * postpix;
                let mut image = DMatrix::zeros(2 * nr, width);
                let mut datasec_img = DMatrix::zeros(2 * nr, width);
                let mut oscansec_img = DMatrix::zeros(2 * nr, width);
                for (idx, (data, oscan)) in chips.iter().enumerate() {
                    if data.shape() != (nr, nc) || oscan.shape() != (nr, postpix) {
                        return Err(RawImageError::BadSection {
                            chip: idx + 1,
                            reason: format!(
                                "chip sections do not match the {}x{} mosaic layout with POSTPIX={}",
                                nr, nc, postpix
                            ),
                        }
                        .into());
                    }
                    let row0 = if idx < 4 { 0 } else { nr };
                    let col0 = (idx % 4) * nc;
                    let ocol0 = 4 * nc + (idx % 4) * postpix;
                    image.view_mut((row0, col0), (nr, nc)).copy_from(data);
                    datasec_img.view_mut((row0, col0), (nr, nc)).fill(1u8);
                    image.view_mut((row0, ocol0), (nr, postpix)).copy_from(oscan);
                    oscansec_img.view_mut((row0, ocol0), (nr, postpix)).fill(1u8);
                }
                (image, datasec_img, oscansec_img)
            }
        };

        let exptime = primary.get_f64("ELAPTIME").ok_or(RawImageError::MissingCard {
            card: "ELAPTIME".to_string(),
            hdu: 0,
        })?;
        let meta_binning = self
            .compound_meta(fits.headers(), MetaKey::Binning)?
            .map(|b| b.to_string());
        let detector = self.detector_par(det.unwrap_or(1), meta_binning.as_deref())?;

        Ok(RawImage {
            filename: path,
            detector,
            image,
            exptime,
            datasec_img,
            oscansec_img,
        })
    }

    fn subheader_for_spec(
        &self,
        meta: &FrameMeta,
        raw_header: &Header,
        extra_cards: &[&str],
        allow_missing: bool,
    ) -> Result<Header> {
        let mut cards: Vec<&str> = extra_cards.to_vec();
        cards.extend(KOA_CARDS);
        base_subheader(self.name(), meta, raw_header, &cards, allow_missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderValue;

    fn frame(idname: &str, lamps: &str, hatch: &str) -> FrameMeta {
        FrameMeta::new("d.fits", PathBuf::from("."))
            .with(MetaKey::Exptime, 10.0)
            .with(MetaKey::Mode, "Spectral")
            .with(MetaKey::Idname, idname)
            .with(MetaKey::Lampstat01, lamps)
            .with(MetaKey::Hatch, hatch)
    }

    #[test]
    fn test_detector_par_values() {
        let spec = KeckDeimos::new();
        let det3 = spec.detector_par(3, None).unwrap();
        assert_eq!(det3.dataext, 3);
        assert_eq!(det3.darkcurr, 4.03);
        assert_eq!(det3.gain, vec![1.248]);
        assert_eq!(det3.ronoise, vec![2.618]);
        assert_eq!(det3.binning, "1,1");
        assert_eq!(det3.platescale, 0.1185);
        assert!(spec.detector_par(0, None).is_err());
        assert!(spec.detector_par(9, None).is_err());
        assert_eq!(spec.list_detectors(), (vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]], true));
    }

    #[test]
    fn test_default_par() {
        let par = KeckDeimos::new().default_par().unwrap();
        assert_eq!(par.get_str("flexure.spec_method"), Some("boxcar"));
        assert_eq!(par.get_f64("calibrations.slitedges.edge_thresh"), Some(50.0));
        assert_eq!(par.get_i64("calibrations.slitedges.fit_order"), Some(3));
        assert_eq!(
            par.get_str_list("calibrations.wavelengths.lamps"),
            vec!["ArI", "NeI", "KrI", "XeI"]
        );
        assert!(!par.get_bool("scienceframe.process.use_biasimage"));
        assert!(!par.get_bool("calibrations.pixelflatframe.process.use_biasimage"));
        assert_eq!(par.get_str("calibrations.pixelflatframe.process.combine"), Some("median"));
        assert!(!par.get_bool("calibrations.arcframe.process.clip"));
        assert_eq!(par.get_f64("scienceframe.process.objlim"), Some(1.5));
        assert_eq!(par.get_f64("reduce.findobj.find_fwhm"), Some(10.0));
        assert!(par
            .get_str("sensfunc.IR.telgridfile")
            .is_some_and(|f| f.ends_with("TelFit_MaunaKea_3100_26100_R20000.fits")));
    }

    #[test]
    fn test_config_specific_par_multislit() {
        let spec = KeckDeimos::new();
        let meta = frame("Object", "Off", "open")
            .with(MetaKey::Decker, "dra11")
            .with(MetaKey::Dispname, "830G")
            .with(MetaKey::Binning, "1,1");
        let par = spec.config_specific_par(&meta, spec.default_par().unwrap()).unwrap();
        assert!(par.get_bool("calibrations.slitedges.use_maskdesign"));
        assert!(par.get("calibrations.slitedges.minimum_slit_length_sci").unwrap().is_none());
        assert_eq!(par.get_f64("calibrations.slitedges.edge_thresh"), Some(10.0));
        assert!(!par.get_bool("calibrations.flatfield.tweak_slits"));
        assert!(par.get_bool("reduce.slitmask.extract_missing_objs"));
        assert_eq!(par.get_str("calibrations.wavelengths.method"), Some("full_template"));
        assert_eq!(
            par.get_str("calibrations.wavelengths.reid_arxiv"),
            Some("keck_deimos_830G.fits")
        );
        assert_eq!(par.get_str_list("calibrations.wavelengths.lamps"), vec!["use_header"]);
        assert_eq!(par.get_f64("calibrations.wavelengths.fwhm"), Some(6.0));
        assert!(par.get_bool("calibrations.wavelengths.fwhm_fromlines"));
    }

    #[test]
    fn test_config_specific_par_longslit_and_lvm() {
        let spec = KeckDeimos::new();
        let long = frame("Object", "Off", "open")
            .with(MetaKey::Decker, "LongMirr")
            .with(MetaKey::Dispname, "1200G")
            .with(MetaKey::Binning, "1,2");
        let par = spec.config_specific_par(&long, spec.default_par().unwrap()).unwrap();
        assert_eq!(par.get_str("calibrations.slitedges.sync_predict"), Some("nearest"));
        assert!(!par.get_bool("calibrations.slitedges.use_maskdesign"));
        assert_eq!(par.get_f64("calibrations.wavelengths.fwhm"), Some(3.0));
        assert!(par.get("rdx.detnum").unwrap().is_none());

        let lvm = long.clone().with(MetaKey::Decker, "LVMslitC");
        let par = spec.config_specific_par(&lvm, spec.default_par().unwrap()).unwrap();
        assert_eq!(par.get_i64_list("rdx.detnum"), Some(vec![3, 7]));
    }

    #[test]
    fn test_check_frame_type() {
        let spec = KeckDeimos::new();
        let all = [None, None];
        assert!(spec.check_frame_type(FrameType::Science, &frame("Object", "Off", "open"), all));
        assert!(spec.check_frame_type(FrameType::Bias, &frame("Bias", "Off", "closed"), all));
        assert!(spec.check_frame_type(FrameType::Dark, &frame("Dark", "Off", "closed"), all));
        let arc = frame("Line", "Kr Xe Ar Ne", "closed");
        assert!(spec.check_frame_type(FrameType::Arc, &arc, all));
        assert!(spec.check_frame_type(FrameType::Tilt, &arc, all));
        assert!(!spec.check_frame_type(FrameType::Science, &arc, all));
        let flat = frame("IntFlat", "Qz", "closed");
        assert!(spec.check_frame_type(FrameType::PixelFlat, &flat, all));
        assert!(spec.check_frame_type(FrameType::Trace, &flat, all));
        assert!(!spec.check_frame_type(FrameType::PixelFlat, &frame("DmFlat", "Qz", "closed"), all));
        assert!(spec.check_frame_type(FrameType::IllumFlat, &frame("SkyFlat", "Qz", "open"), all));
        assert!(!spec.check_frame_type(FrameType::Pinhole, &flat, all));
        assert!(!spec.check_frame_type(FrameType::Standard, &frame("Object", "Off", "open"), all));

        let imaging = frame("Object", "Off", "open").with(MetaKey::Mode, "Direct");
        assert!(!spec.check_frame_type(FrameType::Science, &imaging, all));
        let short = frame("Object", "Off", "open");
        assert!(!spec.check_frame_type(FrameType::Science, &short, [Some(30.0), None]));
    }

    #[test]
    fn test_meta_from_headers() {
        let spec = KeckDeimos::new();
        let mut primary = Header::new();
        for (key, value) in [
            ("RA", HeaderValue::Str("10:00:00.0".into())),
            ("DEC", HeaderValue::Str("+02:30:00.0".into())),
            ("SLMSKNAM", HeaderValue::Str("dra11".into())),
            ("BINNING", HeaderValue::Str("1,2".into())),
            ("DATE-OBS", HeaderValue::Str("2020-01-01".into())),
            ("UTC", HeaderValue::Str("12:00:00.00".into())),
            ("ELAPTIME", HeaderValue::Int(1200)),
            ("GRATENAM", HeaderValue::Str("600ZD".into())),
            ("GRATEPOS", HeaderValue::Int(3)),
            ("G3TLTWAV", HeaderValue::Float(7200.0)),
            ("FRAMENO", HeaderValue::Int(57)),
        ] {
            primary.insert(key, value);
        }
        let meta = spec
            .meta_from_headers(&[primary], "d0101_0057.fits", Path::new("/raw"))
            .unwrap();
        assert_eq!(meta.get_f64(MetaKey::Ra), Some(150.0));
        assert_eq!(meta.get_f64(MetaKey::Dec), Some(2.5));
        assert_eq!(meta.get_str(MetaKey::Binning), Some("2,1"));
        assert_eq!(meta.get_f64(MetaKey::Dispangle), Some(7200.0));
        assert!((meta.get_f64(MetaKey::Mjd).unwrap() - 58849.5).abs() < 1e-9);
        assert_eq!(meta.exptime(), Some(1200.0));
        assert_eq!(meta.get(MetaKey::Frameno), Some(&MetaValue::Int(57)));
        assert!(meta.get(MetaKey::Hatch).is_none());
    }

    #[test]
    fn test_dispangle_needs_standard_slider() {
        let spec = KeckDeimos::new();
        let mut primary = Header::new();
        primary.insert("GRATEPOS", HeaderValue::Int(2));
        primary.insert("G4TLTWAV", HeaderValue::Float(7000.0));
        assert!(spec
            .compound_meta(&[primary], MetaKey::Dispangle)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_bpm_columns() {
        let spec = KeckDeimos::new();
        let bpm = spec.bpm((10, 2048), 3);
        assert_eq!(bpm[(0, 0)], 1);
        assert_eq!(bpm[(5, 3)], 1);
        assert_eq!(bpm[(5, 4)], 0);
        assert_eq!(bpm[(9, 221)], 1);
        assert_eq!(bpm[(9, 2043)], 0);
        assert_eq!(bpm[(9, 2044)], 1);
        assert_eq!(bpm[(9, 2047)], 1);

        let bpm = spec.bpm((4, 2048), 2);
        assert_eq!(bpm[(0, 2047)], 1);
        assert_eq!(bpm.column(489).sum(), 4);

        assert_eq!(spec.bpm((4, 2048), 6).sum(), 0);
    }

    #[test]
    fn test_lamps_from_frames() {
        let spec = KeckDeimos::new();
        let a = frame("Line", "Ne Ar", "closed");
        let b = frame("Line", "Kr Xe Ar", "closed");
        assert_eq!(
            spec.lamps_from_frames(&[&a, &b]),
            vec!["ArI", "KrI", "NeI", "XeI"]
        );
    }

    #[test]
    fn test_pypeit_file_keys() {
        let keys = KeckDeimos::new().pypeit_file_keys();
        assert_eq!(keys.last(), Some(&MetaKey::Frameno));
        assert!(keys.contains(&MetaKey::Dispangle));
        assert!(keys.contains(&MetaKey::Dateobs));
    }

    #[test]
    fn test_subheader_includes_koa_cards() {
        let spec = KeckDeimos::new();
        let meta = frame("Object", "Off", "open");
        let mut raw = Header::new();
        raw.insert("INSTRUME", HeaderValue::Str("DEIMOS: spectrograph".into()));
        raw.insert("KOAID", HeaderValue::Str("DE.20200101.43200.fits".into()));
        raw.insert("PROGPI", HeaderValue::Str("Smith".into()));
        let header = spec.subheader_for_spec(&meta, &raw, &[], true).unwrap();
        assert_eq!(header.get_str("KOAID").as_deref(), Some("DE.20200101.43200.fits"));
        assert_eq!(header.get_str("PYP_SPEC").as_deref(), Some("keck_deimos"));
        assert!(!header.contains("SEMESTER"));
        assert!(spec.subheader_for_spec(&meta, &raw, &[], false).is_err());
    }
}
