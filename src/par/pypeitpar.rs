//! Default parameter tree for a reduction run.

use super::{ParError, ParSet, ParType, ParValue};
use crate::framematch::FrameType;

/// Directory holding telluric model grids.
pub const TELGRID_ROOT: &str = "data/telluric/atm_grids";

pub fn rdx_par() -> ParSet {
    ParSet::new("rdx")
        .with("spectrograph", ParType::Str, ParValue::None, "Spectrograph that provided the data")
        .with(
            "detnum",
            ParType::IntList,
            ParValue::None,
            "Restrict reduction to these detectors",
        )
        .with("redux_path", ParType::Str, "./", "Path for reduction products")
        .with("scidir", ParType::Str, "Science", "Directory for science products")
        .with("qadir", ParType::Str, "QA", "Directory for quality assessment output")
        .with(
            "ignore_bad_headers",
            ParType::Bool,
            false,
            "Ignore headers that cannot be read",
        )
}

/// Image processing parameters with science-frame defaults.
pub fn process_images_par() -> ParSet {
    frame_process_par(FrameType::Science)
}

/// Image processing parameters for one frame type. Calibration frames are
/// not flattened, and bias frames do not subtract a bias image.
fn frame_process_par(ftype: FrameType) -> ParSet {
    let flatten = matches!(ftype, FrameType::Science | FrameType::Standard);
    ParSet::new("process")
        .with("trim", ParType::Bool, true, "Trim the image to the detector data section")
        .with("apply_gain", ParType::Bool, true, "Convert ADU to electrons")
        .with("orient", ParType::Bool, true, "Orient the image with spectral axis vertical")
        .with_options(
            "overscan_method",
            ParType::Str,
            "savgol",
            &["polynomial", "savgol", "median"],
            "Method used to fit the overscan",
        )
        .with("overscan_par", ParType::IntList, vec![5i64, 65], "Overscan fit parameters")
        .with(
            "use_biasimage",
            ParType::Bool,
            ftype != FrameType::Bias,
            "Subtract a combined bias image",
        )
        .with("use_darkimage", ParType::Bool, false, "Subtract a combined dark image")
        .with("use_pixelflat", ParType::Bool, flatten, "Apply the pixel flat")
        .with("use_illumflat", ParType::Bool, flatten, "Apply the illumination flat")
        .with_options(
            "combine",
            ParType::Str,
            "mean",
            &["mean", "median"],
            "Method used to combine frames",
        )
        .with("clip", ParType::Bool, true, "Sigma-clip when combining")
        .with("comb_sigrej", ParType::Float, ParValue::None, "Sigma rejection when combining")
        .with("n_lohi", ParType::IntList, vec![0i64, 0], "Low/high pixels rejected when combining")
        .with("mask_cr", ParType::Bool, false, "Identify and mask cosmic rays")
        .with("sigclip", ParType::Float, 4.5, "Cosmic ray detection threshold")
        .with("objlim", ParType::Float, 3.0, "Object contrast limit for cosmic rays")
        .with("sigfrac", ParType::Float, 0.3, "Neighbour fraction for cosmic rays")
        .with("grow", ParType::Float, 1.5, "Radius used to grow masked pixels")
        .with("spat_flexure_correct", ParType::Bool, false, "Correct for spatial flexure")
}

/// Parameters for one group of calibration or science frames.
pub fn frame_group_par(ftype: FrameType) -> ParSet {
    ParSet::new(ftype.par_group())
        .with_options(
            "frametype",
            ParType::Str,
            ftype.as_str(),
            &FrameType::ALL.map(|t| t.as_str()),
            "Frame type",
        )
        .with("useframe", ParType::Str, ParValue::None, "Master frame or method to use")
        .with("number", ParType::Int, 0i64, "Number of frames to use")
        .with(
            "exprng",
            ParType::FloatList,
            vec![ParValue::None, ParValue::None],
            "Allowed exposure time range",
        )
        .with_group(frame_process_par(ftype))
}

/// Dotted path of a frame type's parameter group in the full tree.
pub fn frame_group_path(ftype: FrameType) -> String {
    match ftype {
        FrameType::Science => ftype.par_group().to_string(),
        other => format!("calibrations.{}", other.par_group()),
    }
}

pub fn edge_trace_par() -> ParSet {
    ParSet::new("slitedges")
        .with("edge_thresh", ParType::Float, 20.0, "Threshold for finding edges")
        .with("fit_order", ParType::Int, 5i64, "Order of the edge trace fit")
        .with("minimum_slit_gap", ParType::Float, ParValue::None, "Minimum slit gap in arcsec")
        .with("minimum_slit_length", ParType::Float, ParValue::None, "Minimum slit length in arcsec")
        .with(
            "minimum_slit_length_sci",
            ParType::Float,
            ParValue::None,
            "Minimum science slit length in arcsec",
        )
        .with_options(
            "sync_predict",
            ParType::Str,
            "pca",
            &["pca", "nearest", "auto"],
            "Mode used to predict missing edges",
        )
        .with("use_maskdesign", ParType::Bool, false, "Match edges to the slit-mask design")
        .with("maskdesign_maxsep", ParType::Float, 50.0, "Max design offset in pixels")
}

pub fn wavelength_solution_par() -> ParSet {
    ParSet::new("wavelengths")
        .with_options(
            "method",
            ParType::Str,
            "holy-grail",
            &["holy-grail", "identify", "reidentify", "full_template"],
            "Wavelength calibration method",
        )
        .with("lamps", ParType::StrList, ParValue::None, "Arc lamps; use_header reads them from the frames")
        .with("reid_arxiv", ParType::Str, ParValue::None, "Archived template solution")
        .with("n_first", ParType::Int, 2i64, "Order of the first fit")
        .with("match_toler", ParType::Float, 2.0, "Matching tolerance in pixels")
        .with("fwhm", ParType::Float, 4.0, "Arc line FWHM in binned pixels")
        .with("fwhm_fromlines", ParType::Bool, false, "Measure the FWHM from the arc lines")
        .with("sigdetect", ParType::Float, 5.0, "Line detection threshold")
}

pub fn wave_tilts_par() -> ParSet {
    ParSet::new("tilts")
        .with("tracethresh", ParType::Float, 20.0, "Threshold for tracing arc lines")
        .with("spat_order", ParType::Int, 3i64, "Spatial order of the tilt fit")
        .with("spec_order", ParType::Int, 4i64, "Spectral order of the tilt fit")
        .with("idsonly", ParType::Bool, false, "Only trace identified lines")
}

pub fn flat_field_par() -> ParSet {
    ParSet::new("flatfield")
        .with_options(
            "method",
            ParType::Str,
            "bspline",
            &["bspline", "skip"],
            "Flat-field method",
        )
        .with("tweak_slits", ParType::Bool, true, "Tweak slit edges using the flat")
        .with("tweak_slits_thresh", ParType::Float, 0.93, "Threshold for slit tweaks")
        .with_options(
            "saturated_slits",
            ParType::Str,
            "crash",
            &["crash", "mask", "continue"],
            "What to do when a slit of the flat is saturated",
        )
        .with("illum_iter", ParType::Int, 0i64, "Illumination iterations")
}

pub fn calibrations_par() -> ParSet {
    let mut set = ParSet::new("calibrations")
        .with("master_dir", ParType::Str, "Masters", "Directory for calibration masters")
        .with("raise_chk_error", ParType::Bool, true, "Fail when calibrations are missing")
        .with("bpm_usebias", ParType::Bool, false, "Build the bad-pixel mask from the bias");
    for ftype in [
        FrameType::Bias,
        FrameType::Dark,
        FrameType::Arc,
        FrameType::Tilt,
        FrameType::PixelFlat,
        FrameType::IllumFlat,
        FrameType::Pinhole,
        FrameType::Trace,
        FrameType::Standard,
    ] {
        set = set.with_group(frame_group_par(ftype));
    }
    set.with_group(edge_trace_par())
        .with_group(wavelength_solution_par())
        .with_group(wave_tilts_par())
        .with_group(flat_field_par())
}

pub fn reduce_par() -> ParSet {
    ParSet::new("reduce")
        .with_group(
            ParSet::new("findobj")
                .with("find_fwhm", ParType::Float, 5.0, "Object FWHM in pixels")
                .with("snr_thresh", ParType::Float, 10.0, "Detection threshold")
                .with("maxnumber", ParType::Int, 10i64, "Maximum objects per slit")
                .with("skip_final_global", ParType::Bool, false, "Skip the final global sky"),
        )
        .with_group(
            ParSet::new("skysub")
                .with("bspline_spacing", ParType::Float, 0.6, "Sky b-spline breakpoint spacing")
                .with("no_local_sky", ParType::Bool, false, "Skip local sky subtraction")
                .with("global_sky_std", ParType::Bool, true, "Global sky for standards"),
        )
        .with_group(
            ParSet::new("extraction")
                .with("boxcar_radius", ParType::Float, 1.5, "Boxcar radius in arcsec")
                .with("std_prof_nsigma", ParType::Float, 30.0, "Profile width for standards")
                .with("sn_gauss", ParType::Float, 4.0, "S/N below which a Gaussian profile is used")
                .with("skip_optimal", ParType::Bool, false, "Only boxcar extraction")
                .with("manual", ParType::StrList, ParValue::None, "Manual extraction positions"),
        )
        .with_group(
            ParSet::new("slitmask")
                .with("assign_obj", ParType::Bool, false, "Assign design RA, DEC, names to objects")
                .with(
                    "extract_missing_objs",
                    ParType::Bool,
                    false,
                    "Force extraction of undetected design objects",
                )
                .with("obj_toler", ParType::Float, 1.0, "Object match tolerance in arcsec")
                .with(
                    "missing_objs_fwhm",
                    ParType::Float,
                    ParValue::None,
                    "Gaussian FWHM for forced extraction",
                )
                .with(
                    "missing_objs_boxcar_rad",
                    ParType::Float,
                    1.0,
                    "Boxcar radius for forced extraction",
                )
                .with("use_dither_offset", ParType::Bool, true, "Use dither offsets in matching"),
        )
}

pub fn flexure_par() -> ParSet {
    ParSet::new("flexure")
        .with_options(
            "spec_method",
            ParType::Str,
            "skip",
            &["skip", "boxcar", "slitcen"],
            "Spectral flexure method",
        )
        .with("spec_maxshift", ParType::Int, 20i64, "Maximum flexure shift in pixels")
        .with("spectrum", ParType::Str, "paranal_sky.fits", "Archived sky spectrum")
}

pub fn flux_calibrate_par() -> ParSet {
    ParSet::new("fluxcalib")
        .with("extinct_correct", ParType::Bool, true, "Apply extinction correction")
        .with("extrap_sens", ParType::Bool, false, "Extrapolate the sensitivity function")
}

pub fn sensfunc_par() -> ParSet {
    ParSet::new("sensfunc")
        .with_options(
            "algorithm",
            ParType::Str,
            "UVIS",
            &["UVIS", "IR"],
            "Sensitivity function algorithm",
        )
        .with("polyorder", ParType::Int, 5i64, "Polynomial order")
        .with_group(
            ParSet::new("IR")
                .with("telgridfile", ParType::Str, ParValue::None, "Telluric model grid")
                .with("maxiter", ParType::Int, 2i64, "Fit iterations"),
        )
}

/// The full default tree, before any instrument tweaks.
pub fn default_pypeit_par() -> ParSet {
    ParSet::new("pypeit")
        .with_group(rdx_par())
        .with_group(calibrations_par())
        .with_group(frame_group_par(FrameType::Science))
        .with_group(reduce_par())
        .with_group(flexure_par())
        .with_group(flux_calibrate_par())
        .with_group(sensfunc_par())
}

/// Build parameters from base config lines (typically an instrument's
/// defaults) and then merge user lines on top.
pub fn from_cfg_lines<S: AsRef<str>, U: AsRef<str>>(
    cfg_lines: &[S],
    merge_with: &[U],
) -> Result<ParSet, ParError> {
    let mut par = default_pypeit_par();
    par.merge_cfg_lines(cfg_lines)?;
    par.merge_cfg_lines(merge_with)?;
    Ok(par)
}
