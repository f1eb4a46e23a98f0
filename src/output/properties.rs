//! Two-column TSV metadata file

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use super::{OutputError, OutputResult};

/// Write `key<TAB>value` rows to `path`, replacing any existing file.
///
/// Tabs and newlines inside values are replaced with spaces so every row
/// stays exactly two columns.
pub fn write_properties<P: AsRef<Path>>(path: P, rows: &[(&str, String)]) -> OutputResult<()> {
    let path = path.as_ref();
    debug!("Writing {} properties to {}", rows.len(), path.display());

    let file = File::create(path)
        .map_err(|e| OutputError::IoError(format!("Failed to create {}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);

    for (key, value) in rows {
        writeln!(writer, "{}\t{}", sanitise(key), sanitise(value))
            .map_err(|e| OutputError::IoError(format!("Failed to write {}: {}", path.display(), e)))?;
    }

    let file = writer
        .into_inner()
        .map_err(|e| OutputError::FlushError(format!("Failed to flush {}: {}", path.display(), e)))?;
    file.sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync file: {}", e)))
}

fn sanitise(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}
