//! Document loader.
//!
//! Walks a corpus directory recursively and turns every readable UTF text
//! file into a [`DocumentRecord`]. Binary and non-UTF files are skipped, and
//! so is any file that fails to read or decode: one bad asset never aborts the
//! walk.

use anyhow::{bail, Result};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::extract::extract_text;
use crate::models::DocumentRecord;

/// Load every accepted file under `root`, in sorted walk order.
///
/// # Errors
///
/// Only a missing or non-directory `root` is an error. Per-file problems are
/// logged at debug level and the file is left out.
pub fn load_documents(root: &Path) -> Result<Vec<DocumentRecord>> {
    if !root.is_dir() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "skipping unreadable directory entry");
                skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        match file_to_record(entry.path()) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    info!(
        root = %root.display(),
        loaded = records.len(),
        skipped,
        "loaded corpus documents"
    );
    Ok(records)
}

fn file_to_record(path: &Path) -> Option<DocumentRecord> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping file: read failed");
            return None;
        }
    };

    let content = match extract_text(&bytes) {
        Ok(text) => text,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "skipping file");
            return None;
        }
    };

    let identifier = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Some(DocumentRecord {
        identifier,
        text: flatten(&content),
    })
}

/// Remove line breaks so a multi-line document becomes one logical line.
pub fn flatten(content: &str) -> String {
    content.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}
