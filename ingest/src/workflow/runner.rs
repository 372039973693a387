use crate::range_table::StaticRangeTable;
use crate::sink::JsonSweepSink;
use crate::source::FileSource;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use log::{debug, error, info, warn};
use nexradcore::prelude::{ByteSource, IngestStatus, SourceError};
use nexradcore::telemetry::MetricsRecorder;
use nexradcore::wire::{VolumeTitle, VOLUME_TITLE_BYTES};
use nexradcore::VolumeController;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct RunSummary {
    pub files: usize,
    pub failed_files: Vec<PathBuf>,
    pub status: IngestStatus,
    pub outputs: Vec<PathBuf>,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

/// Splits a leading volume title off an archive buffer.
fn strip_volume_title(data: &[u8]) -> (Option<VolumeTitle>, &[u8]) {
    match VolumeTitle::detect(data) {
        Some(title) => (Some(title), &data[VOLUME_TITLE_BYTES..]),
        None => (None, data),
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, SourceError> {
    let mut source = FileSource::open(path)?;
    debug!("{}: {:?} stream", path.display(), source.encoding());
    source.read_all()
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Ingests `files` in order and flushes the last sweep.
    ///
    /// A file that cannot be read is reported and skipped; a sink failure
    /// stops the run.
    pub fn execute(&self, files: &[PathBuf]) -> anyhow::Result<RunSummary> {
        let sink = JsonSweepSink::create(&self.config.output_dir, self.config.sink.clone())
            .with_context(|| {
                format!("creating output directory {}", self.config.output_dir.display())
            })?;
        let metrics = Arc::new(MetricsRecorder::new());
        let mut controller = VolumeController::new(self.config.ingest.clone(), sink)
            .context("validating ingest configuration")?
            .with_metrics(metrics.clone());
        if let Some(path) = &self.config.range_table {
            let table = StaticRangeTable::load(path)?;
            if table.is_empty() {
                warn!("range table {} has no entries", path.display());
            } else {
                info!("range table {} with {} entries", path.display(), table.len());
            }
            controller = controller.with_range_table(Box::new(table));
        }

        let mut failed_files = Vec::new();
        for path in files {
            let data = match read_file(path) {
                Ok(data) => data,
                Err(err) => {
                    error!("skipping {}: {err}", path.display());
                    metrics.record_error();
                    failed_files.push(path.clone());
                    continue;
                }
            };
            let (title, body) = strip_volume_title(&data);
            if let Some(title) = &title {
                info!(
                    "{}: {} volume {}",
                    path.display(),
                    title.filetype.trim(),
                    title.volume_number
                );
            }
            controller
                .ingest_message(body, title.is_some())
                .with_context(|| format!("ingesting {}", path.display()))?;
        }
        controller.end_of_data().context("flushing final sweep")?;

        Ok(RunSummary {
            files: files.len(),
            failed_files,
            status: metrics.snapshot(),
            outputs: controller.into_sink().written().to_vec(),
        })
    }
}
