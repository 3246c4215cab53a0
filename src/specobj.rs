//! Extracted objects and matching across the two halves of the mosaic.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Slit-mask design name given to objects found without a design target.
pub const SERENDIP: &str = "SERENDIP";

/// Detectors 1-4 are on the blue side of the mosaic.
const LAST_BLUE_DET: usize = 4;

/// The parts of an extracted object used to pair blue and red spectra.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecObj {
    pub name: String,
    pub det: usize,
    pub ra: f64,
    pub dec: f64,
    pub maskdef_objname: Option<String>,
    pub maskdef_id: Option<i64>,
}

impl SpecObj {
    pub fn is_serendip(&self) -> bool {
        self.maskdef_objname.as_deref() == Some(SERENDIP)
    }

    pub fn is_blue(&self) -> bool {
        self.det <= LAST_BLUE_DET
    }
}

fn isclose(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

/// Pair blue-side objects with the red-side object at the same RA.
///
/// Returns indices into `objs`: blue indices and the matching red indices.
/// Serendipitous detections are skipped. Blue objects with no red match are
/// left out. An RA match whose DEC disagrees, or more than one red match,
/// is an error.
pub fn match_blue_red(objs: &[SpecObj]) -> Result<(Vec<usize>, Vec<usize>)> {
    let red: Vec<usize> = (0..objs.len())
        .filter(|&i| !objs[i].is_blue() && !objs[i].is_serendip())
        .collect();

    let mut blue_idx = Vec::new();
    let mut red_idx = Vec::new();
    for (ib, blue) in objs
        .iter()
        .enumerate()
        .filter(|(_, o)| o.is_blue() && !o.is_serendip())
    {
        let matches: Vec<usize> = red
            .iter()
            .copied()
            .filter(|&ir| objs[ir].ra == blue.ra)
            .collect();
        match matches.as_slice() {
            [] => tracing::debug!("No red match for {}", blue.name),
            [ir] => {
                if !isclose(blue.dec, objs[*ir].dec) {
                    bail!(
                        "DEC does not match RA for {} and {}",
                        blue.name,
                        objs[*ir].name
                    );
                }
                blue_idx.push(ib);
                red_idx.push(*ir);
            }
            _ => bail!("Multiple RA matches for {}", blue.name),
        }
    }
    tracing::info!("🔗 Matched {} blue/red object pairs", blue_idx.len());
    Ok((blue_idx, red_idx))
}
