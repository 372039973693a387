use crate::prelude::IngestStatus;
use std::sync::Mutex;

/// Running totals across every ingest call, shareable with the driver.
pub struct MetricsRecorder {
    inner: Mutex<IngestStatus>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(IngestStatus::default()),
        }
    }

    pub fn record(&self, status: &IngestStatus) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.absorb(*status);
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.errors += 1;
        }
    }

    pub fn snapshot(&self) -> IngestStatus {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            IngestStatus::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
