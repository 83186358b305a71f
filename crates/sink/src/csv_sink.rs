//! CSV writer implementing the engine's `RecordSink`.

use std::fs::File;
use std::path::Path;

use engine::error::SinkError;
use engine::scan::RecordSink;
use engine::types::PatternRecord;
use tracing::info;

use crate::schema;

pub struct CsvSink {
    writer: csv::Writer<File>,
    rows: u64,
}

impl CsvSink {
    /// Create the output file (and parent directories) and write the
    /// canonical header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| SinkError::Encode(e.to_string()))?;
        writer
            .write_record(schema::header())
            .map_err(|e| SinkError::Encode(e.to_string()))?;
        Ok(Self { writer, rows: 0 })
    }
}

impl RecordSink for CsvSink {
    fn emit(&mut self, record: &PatternRecord) -> Result<(), SinkError> {
        self.writer
            .write_record(schema::row(record))
            .map_err(|e| SinkError::Encode(e.to_string()))?;
        self.rows += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        info!(rows = self.rows, "dataset written");
        Ok(())
    }
}
