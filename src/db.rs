use crate::meta::FrameMeta;
use crate::metadata::FrameTable;
use crate::models::{CatalogFrame, SetupSummary};
use anyhow::{Context, Result};
use rusqlite::{params, Connection};

/// Frame catalog stored in SQLite
pub struct Database<'a> {
    conn: &'a Connection,
}

impl<'a> Database<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Database { conn }
    }

    pub fn create_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS frame (
                    Id INTEGER PRIMARY KEY AUTOINCREMENT,
                    filename TEXT NOT NULL,
                    directory TEXT NOT NULL,
                    spectrograph TEXT NOT NULL,
                    frametype TEXT NOT NULL,
                    setups TEXT NOT NULL,
                    metadata TEXT NOT NULL,
                    scannedAt INTEGER NOT NULL,
                    UNIQUE (directory, filename)
                 );
                 CREATE INDEX IF NOT EXISTS frame_spectrograph ON frame (spectrograph);",
            )
            .context("Failed to create frame catalog schema")?;
        Ok(())
    }

    // Frame queries
    pub fn get_frames(
        &self,
        spectrograph: &str,
        setup_filter: Option<&str>,
    ) -> Result<Vec<CatalogFrame>> {
        let mut stmt = self.conn.prepare(
            "SELECT Id, filename, directory, spectrograph, frametype, setups, metadata, scannedAt
             FROM frame
             WHERE spectrograph = ?
             ORDER BY filename",
        )?;

        let frames = stmt
            .query_map([spectrograph], |row| {
                Ok(CatalogFrame {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    directory: row.get(2)?,
                    spectrograph: row.get(3)?,
                    frametype: row.get(4)?,
                    setups: row.get(5)?,
                    metadata: row.get(6)?,
                    scanned_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match setup_filter {
            Some(setup) => frames
                .into_iter()
                .filter(|f| f.setup_list().contains(&setup))
                .collect(),
            None => frames,
        })
    }

    /// Frame metadata stored for a spectrograph, ready to rebuild a table
    /// without opening the files again.
    pub fn load_metas(&self, spectrograph: &str) -> Result<Vec<FrameMeta>> {
        self.get_frames(spectrograph, None)?
            .iter()
            .map(|f| {
                serde_json::from_str(&f.metadata)
                    .with_context(|| format!("Invalid catalog metadata for {}", f.filename))
            })
            .collect()
    }

    pub fn get_setup_summaries(&self, spectrograph: &str) -> Result<Vec<SetupSummary>> {
        let frames = self.get_frames(spectrograph, None)?;
        let mut summaries: Vec<SetupSummary> = Vec::new();
        for frame in &frames {
            for setup in frame.setup_list() {
                let idx = match summaries.iter().position(|s| s.setup == setup) {
                    Some(idx) => idx,
                    None => {
                        summaries.push(SetupSummary {
                            setup: setup.to_string(),
                            frame_count: 0,
                            science_count: 0,
                        });
                        summaries.len() - 1
                    }
                };
                summaries[idx].frame_count += 1;
                if frame.frametype.split(',').any(|t| t == "science") {
                    summaries[idx].science_count += 1;
                }
            }
        }
        summaries.sort_by(|a, b| (a.setup.len(), &a.setup).cmp(&(b.setup.len(), &b.setup)));
        Ok(summaries)
    }

    pub fn count_frames(&self, spectrograph: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM frame WHERE spectrograph = ?",
            [spectrograph],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // Update queries
    /// Store every row of a typed, configured table, replacing earlier
    /// entries for the same files.
    pub fn save_table(&self, table: &FrameTable<'_>) -> Result<usize> {
        let spectrograph = table.spectrograph().name();
        let scanned_at = chrono::Utc::now().timestamp();
        self.with_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO frame
                    (filename, directory, spectrograph, frametype, setups, metadata, scannedAt)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (directory, filename) DO UPDATE SET
                    spectrograph = excluded.spectrograph,
                    frametype = excluded.frametype,
                    setups = excluded.setups,
                    metadata = excluded.metadata,
                    scannedAt = excluded.scannedAt",
            )?;
            for row in table.rows() {
                let metadata = serde_json::to_string(&row.meta)
                    .with_context(|| format!("Failed to serialize {}", row.meta.filename))?;
                stmt.execute(params![
                    row.meta.filename,
                    row.meta.directory.to_string_lossy(),
                    spectrograph,
                    row.frametype.to_string(),
                    row.setups.join(","),
                    metadata,
                    scanned_at,
                ])?;
            }
            Ok(table.len())
        })
    }

    // Transaction helpers
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}
