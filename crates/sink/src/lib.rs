//! CSV sink for pattern records.
//!
//! Serializes `PatternRecord`s into the canonical dataset layout consumed
//! by the downstream labeling and training tools.

pub mod csv_sink;
pub mod schema;

pub use csv_sink::CsvSink;
