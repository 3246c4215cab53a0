use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deimos-redux")]
#[command(about = "Keck/DEIMOS setup, calibration check and raw frame inspection", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Frame catalog database, overrides the config file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub database: Option<String>,

    /// Increase logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan raw frames, type them, group them into setups and write reduction files
    Setup {
        /// Directory or path prefix of the raw files, e.g. /data/raw/d0101_
        /// (default: [raw] root from the config file)
        root: Option<PathBuf>,

        /// Spectrograph name, overrides the config file
        #[arg(short, long)]
        spectrograph: Option<String>,

        /// Raw file extension; compression suffixes are found automatically
        #[arg(short, long)]
        extension: Option<String>,

        /// Setups to write (comma separated letters, or "all")
        #[arg(long, default_value = "all", value_delimiter = ',')]
        setups: Vec<String>,

        /// Output directory, overrides the config file
        #[arg(short, long)]
        output: Option<String>,

        /// Fail on unreadable files instead of skipping them
        #[arg(long)]
        strict: bool,

        /// Store the typed frames in the catalog
        #[arg(long)]
        save_catalog: bool,
    },

    /// Check each setup for the calibration frames its reduction needs
    ChkForCalibs {
        /// Directory or path prefix of the raw files (default: [raw] root)
        root: Option<PathBuf>,

        /// Spectrograph name, overrides the config file
        #[arg(short, long)]
        spectrograph: Option<String>,

        /// Raw file extension
        #[arg(short, long)]
        extension: Option<String>,

        /// Keep the setup results: store the frames in the catalog
        #[arg(long)]
        save_setups: bool,

        /// Use frames stored in the catalog instead of scanning files
        #[arg(long, conflicts_with = "root")]
        from_catalog: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the header cards of a FITS file
    ShowHeader {
        /// FITS file
        path: PathBuf,

        /// HDU index (all HDUs when omitted)
        #[arg(long)]
        ext: Option<usize>,

        /// Only cards whose keyword starts with this prefix
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Print reduction parameters
    ShowPar {
        /// Spectrograph name, overrides the config file
        #[arg(short, long)]
        spectrograph: Option<String>,

        /// Raw frame used to apply configuration-specific parameters
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Only print values that differ from the defaults
        #[arg(long)]
        changed: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print detector parameters
    Detector {
        /// Detector number (all detectors when omitted)
        #[arg(long)]
        det: Option<usize>,

        /// Binning as "spec,spat"
        #[arg(short, long, default_value = "1,1")]
        binning: String,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the bad-pixel mask of a detector
    Bpm {
        /// Detector number
        #[arg(long)]
        det: usize,

        /// Raw frame giving the image shape; also rendered with --png
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Binning as "spec,spat" when no file is given
        #[arg(short, long, default_value = "1,1")]
        binning: String,

        /// Write a PNG of the frame with masked pixels in red
        #[arg(long)]
        png: Option<PathBuf>,
    },

    /// Read a raw frame, one detector or the full mosaic
    ReadRaw {
        /// Raw file; a compression suffix may be omitted
        path: PathBuf,

        /// Detector number (mosaic when omitted)
        #[arg(long)]
        det: Option<usize>,

        /// Write a PNG render of the image
        #[arg(long)]
        png: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the grating setup of raw frames
    Grating {
        /// Raw files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the arc lamps used in each setup
    Lamps {
        /// Directory or path prefix of the raw files (default: [raw] root)
        root: Option<PathBuf>,

        /// Raw file extension
        #[arg(short, long)]
        extension: Option<String>,
    },

    /// Telescope offsets along the slit between dithered frames
    TelOffset {
        /// Raw files
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}
