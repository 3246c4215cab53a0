use serde::{Deserialize, Serialize};

/// A raw frame as stored in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFrame {
    pub id: i64,
    pub filename: String,
    pub directory: String,
    pub spectrograph: String,
    /// Comma separated frame types, "None" when untyped
    pub frametype: String,
    /// Comma separated setup letters, empty when unassigned
    pub setups: String,
    /// `FrameMeta` as JSON
    pub metadata: String,
    /// Unix timestamp of the scan that stored the row
    pub scanned_at: i64,
}

impl CatalogFrame {
    pub fn setup_list(&self) -> Vec<&str> {
        self.setups.split(',').filter(|s| !s.is_empty()).collect()
    }
}

/// Frame counts of one setup in the catalog.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetupSummary {
    pub setup: String,
    pub frame_count: i64,
    pub science_count: i64,
}
