//! Line-delimited corpus file.
//!
//! The loader's output is written as one JSON object per line
//! (`{"metadata": ..., "text": ...}`) before embedding. The file is a
//! throwaway intermediate, regenerated on every ingestion attempt, so a
//! write is only as atomic as the underlying file write.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::DocumentRecord;

/// Write `records` to `path`, one JSON object per line, in order.
///
/// Returns the path that was written.
pub fn write_jsonl(records: &[DocumentRecord], path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create corpus file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    info!(path = %path.display(), records = records.len(), "wrote corpus file");
    Ok(path.to_path_buf())
}

/// Read every record from a corpus file.
///
/// Blank lines are ignored. Any line that does not parse is an error naming
/// the file and line, so a truncated file is never silently accepted.
pub fn read_jsonl(path: &Path) -> Result<Vec<DocumentRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open corpus file: {}", path.display()))?;

    let mut records = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: DocumentRecord = serde_json::from_str(&line).with_context(|| {
            format!("Corrupt corpus record at {}:{}", path.display(), i + 1)
        })?;
        records.push(record);
    }
    Ok(records)
}
