use crate::output::FinishedSweep;
use serde::{Deserialize, Serialize};

/// Problems splitting a byte buffer into logical messages.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("unknown message type {message_type} at offset {offset}")]
    UnknownType { message_type: u8, offset: usize },
    #[error("implausible segment count {count} for message type {message_type}")]
    SegmentCount { message_type: u8, count: u16 },
    #[error(
        "record at offset {offset} needs {expected_length} bytes, but only {buffer_length} remain"
    )]
    Truncated {
        offset: usize,
        expected_length: usize,
        buffer_length: usize,
    },
    #[error("message type {message_type} at offset {offset} declares {length} halfwords")]
    BadLength {
        message_type: u8,
        length: u16,
        offset: usize,
    },
    #[error("segment {segment} of message type {message_type} at offset {offset} has no first segment")]
    OrphanSegment {
        message_type: u8,
        segment: u16,
        offset: usize,
    },
    #[error("segment chain for message type {message_type} broke after segment {segment} of {count}")]
    BrokenChain {
        message_type: u8,
        segment: u16,
        count: u16,
    },
}

/// Problems interpreting one logical payload.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("expected {expected_length} bytes, but buffer is only {buffer_length} bytes long")]
    Truncated {
        expected_length: usize,
        buffer_length: usize,
    },
    #[error("data block count {count} outside 3..=9")]
    BlockCount { count: u16 },
    #[error("{count} elevation cuts exceeds the limit of {limit}")]
    CutCount { count: u16, limit: usize },
    #[error("{count} range zones exceeds the limit of {limit}")]
    ZoneCount { count: u16, limit: usize },
    #[error("data block {index} offset {offset} outside payload of {length} bytes")]
    BlockOffset {
        index: usize,
        offset: u32,
        length: usize,
    },
    #[error("unrecognized block tag {tag:?}")]
    UnknownTag { tag: String },
    #[error("missing required {0} block")]
    MissingBlock(&'static str),
    #[error("{moment} data width is {width} bits, expected {expected}")]
    DataWidth {
        moment: &'static str,
        width: u8,
        expected: u8,
    },
    #[error("{moment} declares {gates} gates which overrun the payload")]
    MomentOverrun { moment: &'static str, gates: usize },
    #[error("{moment} scale {scale} cannot convert stored values")]
    BadScale { moment: &'static str, scale: f32 },
    #[error("message type {0} carries no decodable product")]
    Unsupported(u8),
}

/// Invalid ingest configuration, detected before any data flows.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("interest map {name} values must increase monotonically")]
    NonMonotonic { name: String },
    #[error("interest map {name} has no control points")]
    EmptyMap { name: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure reported by an output sink.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("sink write failed: {0}")]
    Write(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure reported by a byte-stream source.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("decompression failed: {0}")]
    Decompress(String),
}

/// Top-level error for the ingest entry points.
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Counters describing what one `ingest_message` or `end_of_data` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStatus {
    pub messages: usize,
    pub beams: usize,
    pub sweeps_written: usize,
    pub sweeps_lost: usize,
    pub sweeps_skipped: usize,
    pub errors: usize,
}

impl IngestStatus {
    pub fn absorb(&mut self, other: IngestStatus) {
        self.messages += other.messages;
        self.beams += other.beams;
        self.sweeps_written += other.sweeps_written;
        self.sweeps_lost += other.sweeps_lost;
        self.sweeps_skipped += other.sweeps_skipped;
        self.errors += other.errors;
    }
}

/// Receives every finalized, non-skipped sweep exactly once.
pub trait SweepSink {
    fn write(&mut self, sweep: &FinishedSweep) -> Result<(), SinkError>;
}

/// Optional elevation-dependent maximum range used to cap output gates.
pub trait RangeTable {
    fn range_for_elevation(&self, elevation_deg: f64) -> Option<f64>;
}

/// Compression-independent byte stream over one input file.
pub trait ByteSource {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, SourceError>;
    fn is_at_end(&self) -> bool;

    /// Drains the source into memory.
    fn read_all(&mut self) -> Result<Vec<u8>, SourceError> {
        let mut out = Vec::new();
        let mut chunk = vec![0u8; 64 * 1024];
        while !self.is_at_end() {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }
}
