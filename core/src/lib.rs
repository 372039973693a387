//! Core of the Level-II ingester: record framing, message decoding, beam
//! building with derived clutter fields, and sweep/volume assembly.
//!
//! Output and input stay behind the collaborator traits in [`prelude`] so a
//! driver can plug in files, sinks and range tables of its own.

pub mod config;
pub mod math;
pub mod output;
pub mod prelude;
pub mod processing;
pub mod telemetry;
pub mod wire;

pub use config::IngestConfig;
pub use output::FinishedSweep;
pub use prelude::{IngestError, IngestResult, IngestStatus, RangeTable, SweepSink};
pub use processing::VolumeController;
