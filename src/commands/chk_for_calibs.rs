use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::calibrations::check_for_calibs;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::db::Database;
use crate::framematch::FrameType;
use crate::metadata::FrameTable;
use crate::spectrographs::load_spectrograph;

use super::{apply_user_par, load_par, open_catalog, scan_frames, type_and_group};

/// Calibration check result for one setup.
#[derive(Debug, Clone, Serialize)]
pub struct SetupAnswer {
    pub setup: String,
    /// Configuration values in key order
    pub config: Vec<(String, String)>,
    pub passed: bool,
    /// Science frames; `None` when the setup has no science or standard frame
    pub scifiles: Option<Vec<String>>,
    pub missing: Vec<FrameType>,
}

/// Group the frames under `root` (or the catalog) into setups and check
/// each for its calibrations.
pub fn chk_for_calibs(
    config: &Config,
    root: Option<&Path>,
    from_catalog: bool,
    save_setups: bool,
    format: OutputFormat,
) -> Result<Vec<SetupAnswer>> {
    let spectrograph = load_spectrograph(&config.get_spectrograph())?;
    tracing::info!("🔭 Loaded spectrograph {}", spectrograph.name());
    let base_par = load_par(spectrograph.as_ref(), config)?;

    let table = match root {
        Some(root) if !from_catalog => scan_frames(
            spectrograph.as_ref(),
            root,
            &config.get_extension(),
            false,
            &base_par,
        )?,
        _ => {
            let conn = open_catalog(config)?;
            let db = Database::new(&conn);
            tracing::info!(
                "📋 Catalog holds {} {} frames",
                db.count_frames(spectrograph.name())?,
                spectrograph.name()
            );
            for summary in db.get_setup_summaries(spectrograph.name())? {
                tracing::info!(
                    "📋 Stored setup {}: {} frames, {} science",
                    summary.setup,
                    summary.frame_count,
                    summary.science_count
                );
            }
            let metas = db.load_metas(spectrograph.name())?;
            let mut table = FrameTable::from_metas(spectrograph.as_ref(), metas);
            type_and_group(&mut table, &base_par);
            table
        }
    };

    let mut answers = Vec::new();
    for setup in table.unique_configurations() {
        let name = setup.name.as_str();
        let mut answer = SetupAnswer {
            setup: name.to_string(),
            config: setup
                .values
                .iter()
                .map(|(k, v)| {
                    let v = v.as_ref().map_or("None".to_string(), |v| v.to_string());
                    (k.to_string(), v)
                })
                .collect(),
            passed: false,
            scifiles: None,
            missing: Vec::new(),
        };

        tracing::info!("=======================================================");
        tracing::info!("Working on setup: {}", name);

        let in_setup = table.frames_in_setup(name);
        let Some(reference) = in_setup.iter().rev().find(|r| {
            r.frametype.contains(FrameType::Science) || r.frametype.contains(FrameType::Standard)
        }) else {
            tracing::warn!("⚠️  No science or standard frame in setup {}; skipping", name);
            answers.push(answer);
            continue;
        };
        tracing::info!(
            "Setting configuration-specific parameters using {}",
            reference.meta.filename
        );
        let par = spectrograph
            .config_specific_par(&reference.meta, spectrograph.default_par()?)
            .with_context(|| format!("Failed to build parameters for setup {}", name))?;
        let par = apply_user_par(par, config)?;

        let scifiles: Vec<String> = table
            .find_frames(FrameType::Science, Some(name))
            .iter()
            .map(|r| r.meta.filename.clone())
            .collect();
        if scifiles.is_empty() {
            tracing::warn!("⚠️  Setup {} has no science frames", name);
        } else {
            tracing::info!("Science frames: {}", scifiles.join(", "));
        }
        answer.scifiles = Some(scifiles);

        let check = check_for_calibs(&par, &table, name, false)?;
        if !check.passed {
            tracing::warn!("⚠️  Setup {} did not pass the calibration check", name);
        }
        answer.passed = check.passed;
        answer.missing = check.missing;
        answers.push(answer);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&answers)?),
        OutputFormat::Text => {
            println!("= RESULTS ============================================");
            for line in format_answers(&answers) {
                println!("{}", line);
            }
            println!("======================================================");
        }
    }

    if save_setups {
        let conn = open_catalog(config)?;
        let count = Database::new(&conn).save_table(&table)?;
        tracing::info!("💾 Stored {} frames in {}", count, config.database.path);
    }

    Ok(answers)
}

/// Results as an aligned text table.
pub fn format_answers(answers: &[SetupAnswer]) -> Vec<String> {
    let Some(first) = answers.first() else {
        return vec!["No setups found".to_string()];
    };
    let mut header = vec!["setups".to_string()];
    header.extend(first.config.iter().map(|(k, _)| k.clone()));
    header.push("pass".to_string());
    header.push("scifiles".to_string());

    let rows: Vec<Vec<String>> = answers
        .iter()
        .map(|a| {
            let mut row = vec![a.setup.clone()];
            row.extend(a.config.iter().map(|(_, v)| v.clone()));
            row.push(if a.passed { "True" } else { "False" }.to_string());
            row.push(a.scifiles.as_ref().map_or("None".to_string(), |f| f.join(", ")));
            row
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            rows.iter()
                .map(|r| r.get(i).map_or(0, String::len))
                .chain(std::iter::once(header[i].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let render = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:>w$}", c, w = *w))
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(&header)];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join(" "),
    );
    lines.extend(rows.iter().map(|r| render(r)));
    lines
}
