use anyhow::{bail, Result};
use std::path::Path;

use crate::header::FitsFile;

pub fn show_header(path: &Path, ext: Option<usize>, key: Option<&str>) -> Result<()> {
    let fits = FitsFile::open(path)?;
    let nhdu = fits.headers().len();
    if let Some(ext) = ext {
        if ext >= nhdu {
            bail!("{} has {} HDUs; no HDU {}", path.display(), nhdu, ext);
        }
    }
    let prefix = key.map(|k| k.to_ascii_uppercase());

    for (idx, header) in fits.headers().iter().enumerate() {
        if ext.is_some_and(|e| e != idx) {
            continue;
        }
        println!("# HDU {}", idx);
        for card in &header.cards {
            if prefix.as_deref().is_some_and(|p| !card.key.starts_with(p)) {
                continue;
            }
            println!("{}", card.render().trim_end());
        }
    }
    Ok(())
}
