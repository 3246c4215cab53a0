use anyhow::{bail, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffixes a raw frame may carry after its extension. Only gzip is
/// decompressed on read, so other compressed frames are not selected.
pub const COMPRESSION_SUFFIXES: [&str; 2] = ["", ".gz"];

/// In-memory index of the files below a raw data root
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    /// Map from filename to all possible full paths
    file_map: HashMap<String, Vec<PathBuf>>,
}

impl DirectoryTree {
    /// Index every file below `root`
    pub fn build(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            bail!("Raw data directory does not exist: {}", root.display());
        }
        tracing::info!("🌳 Indexing raw data below: {:?}", root);
        let start_time = std::time::Instant::now();

        let mut file_map: HashMap<String, Vec<PathBuf>> = HashMap::new();
        let mut total_files = 0;
        let mut total_dirs = 0;

        Self::scan_directory(root, &mut file_map, &mut total_files, &mut total_dirs)?;

        let elapsed = start_time.elapsed();
        tracing::info!(
            "🌳 Indexed in {:.2}s: {} files, {} directories",
            elapsed.as_secs_f64(),
            total_files,
            total_dirs
        );

        Ok(DirectoryTree { file_map })
    }

    /// Recursively scan a directory and populate the file map
    fn scan_directory(
        dir: &Path,
        file_map: &mut HashMap<String, Vec<PathBuf>>,
        total_files: &mut usize,
        total_dirs: &mut usize,
    ) -> Result<()> {
        // Reduction products live next to the raw data
        if let Some(dir_name) = dir.file_name() {
            let name = dir_name.to_string_lossy();
            if matches!(
                name.as_ref(),
                "Calibrations" | "Science" | "QA" | "setup_files" | ".git"
            ) {
                tracing::trace!("⏭️  Skipping directory: {:?}", dir);
                return Ok(());
            }
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::trace!("⚠️  Cannot read directory {:?}: {}", dir, e);
                return Ok(());
            }
        };
        *total_dirs += 1;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::trace!("⚠️  Error reading entry in {:?}: {}", dir, e);
                    continue;
                }
            };

            let path = entry.path();
            if path.is_dir() {
                Self::scan_directory(&path, file_map, total_files, total_dirs)?;
            } else if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                file_map
                    .entry(filename.to_string())
                    .or_default()
                    .push(path.clone());
                *total_files += 1;
            }
        }
        Ok(())
    }

    /// Find files whose name satisfies `predicate`, sorted by path
    pub fn find_files_matching<F>(&self, predicate: F) -> Vec<&PathBuf>
    where
        F: Fn(&str) -> bool,
    {
        let mut files: Vec<&PathBuf> = self
            .file_map
            .iter()
            .filter(|(filename, _)| predicate(filename))
            .flat_map(|(_, paths)| paths.iter())
            .collect();
        files.sort();
        files
    }

    /// Raw frames: names starting with `prefix` and ending in `extension`,
    /// optionally followed by a compression suffix
    pub fn raw_files(&self, prefix: &str, extension: &str) -> Vec<&PathBuf> {
        self.find_files_matching(|filename| {
            filename.starts_with(prefix)
                && COMPRESSION_SUFFIXES
                    .iter()
                    .any(|suffix| filename.ends_with(&format!("{}{}", extension, suffix)))
        })
    }
}

/// Raw frames selected by a root that is either a directory or a path
/// prefix such as `/data/raw/d0101_`.
pub fn find_raw_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let (dir, prefix) = if root.is_dir() {
        (root.to_path_buf(), String::new())
    } else {
        let dir = match root.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (dir, prefix)
    };

    let tree = DirectoryTree::build(&dir)?;
    let files: Vec<PathBuf> = tree
        .raw_files(&prefix, extension)
        .into_iter()
        .cloned()
        .collect();
    if files.is_empty() {
        bail!(
            "No raw files matching {}*{} found below {}",
            prefix,
            extension,
            dir.display()
        );
    }
    tracing::info!("📁 Found {} raw files", files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_tree_basic() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        fs::create_dir_all(root.join("night1"))?;
        fs::create_dir_all(root.join("night2/extra"))?;
        fs::write(root.join("d0101_0001.fits"), "test")?;
        fs::write(root.join("night1/d0102_0001.fits.gz"), "test")?;
        fs::write(root.join("night2/extra/notes.txt"), "test")?;
        fs::write(root.join("night2/d0103_0001.fits.bak"), "test")?;

        let tree = DirectoryTree::build(root)?;

        let raw = tree.raw_files("", ".fits");
        assert_eq!(raw.len(), 2);
        assert!(raw.iter().any(|p| p.ends_with("night1/d0102_0001.fits.gz")));
        assert_eq!(tree.raw_files("d0102", ".fits").len(), 1);

        let notes = tree.find_files_matching(|name| name.ends_with(".txt"));
        assert_eq!(notes.len(), 1);
        assert!(notes[0].ends_with("night2/extra/notes.txt"));

        Ok(())
    }

    #[test]
    fn test_directory_tree_skipped_dirs() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        fs::create_dir_all(root.join("Calibrations"))?;
        fs::create_dir_all(root.join("raw"))?;
        fs::write(root.join("Calibrations/Flat_A_1.fits"), "test")?;
        fs::write(root.join("raw/d0101_0001.fits"), "test")?;

        let tree = DirectoryTree::build(root)?;

        let raw = tree.raw_files("", ".fits");
        assert_eq!(raw.len(), 1);
        assert!(raw[0].ends_with("raw/d0101_0001.fits"));

        Ok(())
    }

    #[test]
    fn test_find_raw_files_by_prefix() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::write(root.join("d0101_0001.fits"), "test")?;
        fs::write(root.join("d0101_0002.fits.gz"), "test")?;
        fs::write(root.join("d0101_0003.fits.fz"), "test")?;
        fs::write(root.join("d0101_0004.fits.bz2"), "test")?;
        fs::write(root.join("d0102_0001.fits"), "test")?;

        assert_eq!(find_raw_files(root, ".fits")?.len(), 3);
        let night = find_raw_files(&root.join("d0101_"), ".fits")?;
        assert_eq!(night.len(), 2);
        assert!(night[0].ends_with("d0101_0001.fits"));
        assert!(night[1].ends_with("d0101_0002.fits.gz"));
        assert!(find_raw_files(&root.join("d0103_"), ".fits").is_err());

        Ok(())
    }
}
