use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::{
    chk_for_calibs, read_raw, run_setup, show_bpm, show_detectors, show_grating, show_header,
    show_lamps, show_par, show_tel_offsets,
};
use crate::config::Config;

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

/// Apply per-command overrides and validate the result.
fn prepare(config: &mut Config, spectrograph: Option<String>, extension: Option<String>) -> Result<()> {
    config.merge_with_cli(None, spectrograph, None, None);
    if let Some(ext) = extension {
        config.raw.extension = Some(ext);
    }
    config
        .validate()
        .context("Configuration validation failed")
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let log_level = match cli.verbose {
        0 => None,
        1 => Some("debug".to_string()),
        _ => Some("trace".to_string()),
    };
    config.merge_with_cli(cli.database, None, log_level, None);
    init_tracing(&config.get_log_level());

    match cli.command {
        Commands::Setup {
            root,
            spectrograph,
            extension,
            setups,
            output,
            strict,
            save_catalog,
        } => {
            config.merge_with_cli(None, None, None, output);
            prepare(&mut config, spectrograph, extension)?;
            let root = config.raw_root(root)?;
            run_setup(&config, &root, &setups, strict, save_catalog)?;
        }
        Commands::ChkForCalibs {
            root,
            spectrograph,
            extension,
            save_setups,
            from_catalog,
            format,
        } => {
            prepare(&mut config, spectrograph, extension)?;
            let root = if from_catalog {
                None
            } else {
                Some(config.raw_root(root)?)
            };
            chk_for_calibs(&config, root.as_deref(), from_catalog, save_setups, format)?;
        }
        Commands::ShowHeader { path, ext, key } => {
            show_header(&path, ext, key.as_deref())?;
        }
        Commands::ShowPar {
            spectrograph,
            file,
            changed,
            format,
        } => {
            prepare(&mut config, spectrograph, None)?;
            show_par(&config, file.as_deref(), changed, format)?;
        }
        Commands::Detector {
            det,
            binning,
            format,
        } => {
            prepare(&mut config, None, None)?;
            show_detectors(&config, det, &binning, format)?;
        }
        Commands::Bpm {
            det,
            file,
            binning,
            png,
        } => {
            prepare(&mut config, None, None)?;
            show_bpm(&config, det, file.as_deref(), &binning, png.as_deref())?;
        }
        Commands::ReadRaw {
            path,
            det,
            png,
            format,
        } => {
            prepare(&mut config, None, None)?;
            read_raw(&config, &path, det, png.as_deref(), format)?;
        }
        Commands::Grating { paths, format } => {
            show_grating(&paths, format)?;
        }
        Commands::Lamps { root, extension } => {
            prepare(&mut config, None, extension)?;
            let root = config.raw_root(root)?;
            show_lamps(&config, &root)?;
        }
        Commands::TelOffset { paths } => {
            show_tel_offsets(&paths)?;
        }
    }

    Ok(())
}
