use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::spectrographs::available_spectrographs;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Main configuration structure, read from `deimos-redux.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Instrument configuration
    pub instrument: InstrumentConfig,
    /// Raw data discovery
    pub raw: RawConfig,
    /// Frame catalog
    pub database: DatabaseConfig,
    /// Where reduction files and renders are written
    pub output: OutputConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Spectrograph name (default: "keck_deimos")
    pub spectrograph: Option<String>,
    /// User parameter file merged over the instrument defaults
    pub user_par: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    /// Raw file extension (default: ".fits")
    pub extension: Option<String>,
    /// Directory or path prefix of the raw frames, used when a command
    /// is not given one
    pub root: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite frame catalog
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./setup_files")
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is unset (default: "info")
    pub level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instrument: InstrumentConfig::default(),
            raw: RawConfig::default(),
            database: DatabaseConfig {
                path: "deimos_frames.sqlite".to_string(),
            },
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            spectrograph: Some("keck_deimos".to_string()),
            user_par: None,
        }
    }
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            extension: Some(".fits".to_string()),
            root: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: Some("./setup_files".to_string()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Some("info".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml_edit::de::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_string = toml_edit::ser::to_string_pretty(self)
            .context("Failed to serialize configuration to TOML")?;

        std::fs::write(&path, toml_string)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Merge configuration with command line arguments, prioritizing CLI values
    pub fn merge_with_cli(
        &mut self,
        database_path: Option<String>,
        spectrograph: Option<String>,
        log_level: Option<String>,
        output_dir: Option<String>,
    ) {
        if let Some(db_path) = database_path {
            self.database.path = db_path;
        }

        if let Some(name) = spectrograph {
            self.instrument.spectrograph = Some(name);
        }

        if let Some(level) = log_level {
            self.logging.level = Some(level);
        }

        if let Some(dir) = output_dir {
            self.output.directory = Some(dir);
        }
    }

    /// Get the effective values with defaults applied
    pub fn get_spectrograph(&self) -> String {
        self.instrument
            .spectrograph
            .clone()
            .unwrap_or_else(|| "keck_deimos".to_string())
    }

    pub fn get_extension(&self) -> String {
        self.raw
            .extension
            .clone()
            .unwrap_or_else(|| ".fits".to_string())
    }

    /// Raw root from the command line, falling back to `raw.root`
    pub fn raw_root(&self, cli_root: Option<PathBuf>) -> Result<PathBuf> {
        cli_root
            .or_else(|| self.raw.root.as_ref().map(PathBuf::from))
            .context("No raw root given on the command line or in [raw] root")
    }

    pub fn get_output_directory(&self) -> PathBuf {
        PathBuf::from(self.output.directory.as_deref().unwrap_or("./setup_files"))
    }

    pub fn get_log_level(&self) -> String {
        self.logging
            .level
            .clone()
            .unwrap_or_else(|| "info".to_string())
    }

    pub fn get_user_par(&self) -> Option<PathBuf> {
        self.instrument.user_par.as_ref().map(PathBuf::from)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let spectrograph = self.get_spectrograph();
        if !available_spectrographs().iter().any(|s| *s == spectrograph) {
            return Err(anyhow::anyhow!(
                "Unknown spectrograph '{}'; available: {}",
                spectrograph,
                available_spectrographs().join(", ")
            ));
        }

        let extension = self.get_extension();
        if !extension.starts_with('.') {
            return Err(anyhow::anyhow!(
                "Raw file extension must start with '.', got: {}",
                extension
            ));
        }

        let level = self.get_log_level();
        if !LOG_LEVELS.iter().any(|l| l.eq_ignore_ascii_case(&level)) {
            return Err(anyhow::anyhow!(
                "Invalid log level '{}'; expected one of {}",
                level,
                LOG_LEVELS.join(", ")
            ));
        }

        if let Some(par) = self.get_user_par() {
            if !par.is_file() {
                return Err(anyhow::anyhow!(
                    "User parameter file does not exist: {}",
                    par.display()
                ));
            }
        }

        if let Some(root) = &self.raw.root {
            if Path::new(root).is_file() {
                return Err(anyhow::anyhow!(
                    "Raw root must be a directory or path prefix, not a file: {}",
                    root
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.get_spectrograph(), "keck_deimos");
        assert_eq!(config.get_extension(), ".fits");
        assert_eq!(config.database.path, "deimos_frames.sqlite");
        assert_eq!(config.get_output_directory(), PathBuf::from("./setup_files"));
        assert_eq!(config.get_log_level(), "info");
        assert!(config.get_user_par().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_string = toml_edit::ser::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[instrument]"));
        assert!(toml_string.contains("[raw]"));
        assert!(toml_string.contains("[database]"));
        assert!(toml_string.contains("[logging]"));

        let parsed: Config = toml_edit::de::from_str(&toml_string).unwrap();
        assert_eq!(parsed.get_spectrograph(), config.get_spectrograph());
        assert_eq!(parsed.database.path, config.database.path);
    }

    #[test]
    fn test_config_merge_with_cli() {
        let mut config = Config::default();

        config.merge_with_cli(
            Some("/data/catalog.sqlite".to_string()),
            None,
            Some("debug".to_string()),
            Some("/data/out".to_string()),
        );

        assert_eq!(config.database.path, "/data/catalog.sqlite");
        assert_eq!(config.get_spectrograph(), "keck_deimos");
        assert_eq!(config.get_log_level(), "debug");
        assert_eq!(config.get_output_directory(), PathBuf::from("/data/out"));
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = Config::default();
        config.raw.root = Some("/data/raw/2020jan".to_string());
        let temp_file = NamedTempFile::new().unwrap();

        config.to_file(temp_file.path()).unwrap();

        let loaded_config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded_config.get_extension(), config.get_extension());
        assert_eq!(loaded_config.raw.root, config.raw.root);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.instrument.spectrograph = Some("keck_lris_red".to_string());
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("Unknown spectrograph"));

        let mut config = Config::default();
        config.raw.extension = Some("fits".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = Some("loud".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.instrument.user_par = Some("/does/not/exist.par".to_string());
        assert!(config.validate().is_err());

        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.raw.root = Some(file.path().display().to_string());
        assert!(config.validate().is_err());
        config.raw.root = Some("/data/raw/d0101_".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_raw_root_fallback() {
        let mut config = Config::default();
        assert!(config.raw_root(None).is_err());

        config.raw.root = Some("/data/raw".to_string());
        assert_eq!(config.raw_root(None).unwrap(), PathBuf::from("/data/raw"));
        assert_eq!(
            config.raw_root(Some(PathBuf::from("/night2/d0102_"))).unwrap(),
            PathBuf::from("/night2/d0102_")
        );
    }
}
