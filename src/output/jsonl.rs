//! JSON-lines output writer

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{OutputError, OutputResult, OutputWriter};

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024; // 64KB buffer

/// Flush every N records so a crash loses at most one interval
const FLUSH_INTERVAL: u64 = 1_000;

/// Writes one JSON document per line
pub struct JsonLinesWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    records_written: u64,
}

impl JsonLinesWriter {
    /// Create (or truncate) a JSON-lines file
    ///
    /// # Arguments
    /// * `path` - Output file path; the parent directory must already exist
    pub fn create<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        Self::create_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Create a JSON-lines file with a custom buffer size
    pub fn create_with_buffer_size<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> OutputResult<Self> {
        let path = path.as_ref();
        debug!("Creating JSON-lines writer: path={}", path.display());

        let file = File::create(path).map_err(|e| {
            OutputError::IoError(format!("Failed to create {}: {}", path.display(), e))
        })?;

        Ok(Self {
            writer: BufWriter::with_capacity(buffer_size, file),
            path: path.to_path_buf(),
            records_written: 0,
        })
    }

    /// Serialize `record` and append it as a single line
    pub fn write_record<T: Serialize + ?Sized>(&mut self, record: &T) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, record).map_err(|e| {
            OutputError::SerializationError(format!(
                "Failed to write record to {}: {}",
                self.path.display(),
                e
            ))
        })?;
        self.writer.write_all(b"\n").map_err(|e| {
            OutputError::IoError(format!("Failed to write {}: {}", self.path.display(), e))
        })?;

        self.records_written += 1;

        if self.records_written % FLUSH_INTERVAL == 0 {
            self.flush()?;
            debug!(
                path = %self.path.display(),
                records = self.records_written,
                "Progress: records written"
            );
        }

        Ok(())
    }

    /// Number of records written so far
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Path being written
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputWriter for JsonLinesWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer.flush().map_err(|e| {
            OutputError::FlushError(format!("Failed to flush {}: {}", self.path.display(), e))
        })
    }

    fn close(mut self) -> OutputResult<()> {
        self.flush()?;

        let file = self.writer.into_inner().map_err(|e| {
            OutputError::IoError(format!("Failed to get file handle: {}", e))
        })?;

        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {}", e)))?;

        info!(
            "Closed {}: {} records written",
            self.path.display(),
            self.records_written
        );
        Ok(())
    }
}
