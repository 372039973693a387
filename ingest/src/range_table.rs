use anyhow::Context;
use nexradcore::prelude::RangeTable;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeEntry {
    pub elevation_deg: f64,
    pub range_km: f64,
}

/// Maximum useful range per elevation, loaded from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticRangeTable {
    entries: Vec<RangeEntry>,
}

impl StaticRangeTable {
    pub fn new(mut entries: Vec<RangeEntry>) -> Self {
        entries.sort_by(|a, b| a.elevation_deg.total_cmp(&b.elevation_deg));
        Self { entries }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading range table {}", path_ref.display()))?;
        let entries: Vec<RangeEntry> = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing range table {}", path_ref.display()))?;
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RangeTable for StaticRangeTable {
    /// Entry for the largest elevation not above `elevation_deg`.
    fn range_for_elevation(&self, elevation_deg: f64) -> Option<f64> {
        self.entries
            .iter()
            .take_while(|entry| entry.elevation_deg <= elevation_deg)
            .last()
            .map(|entry| entry.range_km)
    }
}
