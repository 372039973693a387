use crate::sink::SinkOptions;
use anyhow::Context;
use nexradcore::config::IngestConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Outer run configuration; the `ingest` section feeds the core as is.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub ingest: IngestConfig,
    pub output_dir: PathBuf,
    /// YAML list of `elevation_deg` / `range_km` pairs.
    pub range_table: Option<PathBuf>,
    pub sink: SinkOptions,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            output_dir: PathBuf::from("sweeps"),
            range_table: None,
            sink: SinkOptions::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = output_dir {
            self.output_dir = dir;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn output_dir_flag_overrides_file() {
        let cfg = WorkflowConfig::default().with_output_dir(Some(PathBuf::from("/tmp/out")));
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
        let cfg = cfg.with_output_dir(None);
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"output_dir: out\ningest:\n  combine_sweeps: false\n  merge_vcps: [212]\n  rec: null\nsink:\n  include_data: true\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
        assert!(!cfg.ingest.combine_sweeps);
        assert_eq!(cfg.ingest.merge_vcps, vec![212]);
        assert!(cfg.ingest.rec.is_none());
        assert_eq!(cfg.ingest.power_ratio_default, 90.0);
        assert!(cfg.sink.include_data);
        assert!(cfg.range_table.is_none());
    }

    #[test]
    fn malformed_yaml_is_reported_with_path() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"ingest: [not, a, map]\n").unwrap();
        let err = WorkflowConfig::load(temp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing workflow config"));
    }
}
