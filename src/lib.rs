pub mod bitmask;
pub mod calibrations;
pub mod cli;
pub mod commands;
pub mod config;
pub mod coords;
pub mod db;
pub mod directory_tree;
pub mod framematch;
pub mod header;
pub mod meta;
pub mod metadata;
pub mod models;
pub mod onespec;
pub mod par;
pub mod parse;
pub mod pypeit_file;
pub mod rawimage;
pub mod render;
pub mod specobj;
pub mod spectrographs;

// Main entry points
pub mod cli_main;

// Re-export commonly used items
pub use header::{FitsFile, Header};
pub use metadata::FrameTable;
pub use spectrographs::{load_spectrograph, KeckDeimos, Spectrograph};
