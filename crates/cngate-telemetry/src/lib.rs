//! Telemetry sinks for decoded control node measures.
//!
//! The gateway hands every decoded sample to a [`TelemetrySink`]. The
//! shipped implementation appends to per-stream text files configured from
//! a YAML file ([`FileSink`]); [`NullSink`] drops everything and
//! [`DebugSink`] echoes samples to stdout for the supervising process.
//! Metric names live in [`counters`].

pub mod counters;
mod file_sink;
mod sink;

pub use file_sink::*;
pub use sink::*;
