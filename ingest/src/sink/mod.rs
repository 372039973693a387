pub mod json;

pub use json::{JsonSweepSink, SinkOptions};
