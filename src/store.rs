//! Persistent local vector store.
//!
//! A line-delimited file of [`EmbeddingEntry`] records, loaded fully into
//! memory on open. The store is append-only: ingestion adds entries in bulk
//! and each bulk append is flushed and synced before returning, so a crash
//! mid-ingestion leaves a prefix of the intended entries on disk. Search only
//! reads.
//!
//! All entries share one vector dimensionality, fixed by the first entry
//! ever written.

use anyhow::{bail, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::EmbeddingEntry;

#[derive(Debug)]
pub struct VectorStore {
    path: PathBuf,
    entries: Vec<EmbeddingEntry>,
}

impl VectorStore {
    /// Open the store at `path`, loading any existing entries.
    ///
    /// A missing file is an empty store; the file is created on first append.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            load_entries(&path)?
        } else {
            Vec::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "opened vector store");
        Ok(Self { path, entries })
    }

    /// Truncate the store at `path` without reading it and return it empty.
    ///
    /// Works on a store left corrupt by an interrupted append.
    pub fn recreate(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            File::create(&path).with_context(|| {
                format!("Failed to truncate vector store: {}", path.display())
            })?;
        }
        info!(path = %path.display(), "cleared vector store");
        Ok(Self {
            path,
            entries: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimensionality, or `None` while the store is empty.
    pub fn dims(&self) -> Option<usize> {
        self.entries.first().map(|e| e.vector.len())
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[EmbeddingEntry] {
        &self.entries
    }

    /// Append a batch of entries and sync them to disk.
    ///
    /// # Errors
    ///
    /// Fails without writing anything if any vector is empty or its
    /// dimensionality differs from the store's.
    ///
    /// An I/O error while writing is fatal and may leave a partial line at
    /// the end of the file while the in-memory entries are unchanged. The
    /// next [`VectorStore::open`] then reports a corrupt entry; recover with
    /// `mud ingest --rebuild`, which goes through [`VectorStore::recreate`].
    pub fn append(&mut self, batch: Vec<EmbeddingEntry>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let expected = self.dims().unwrap_or(batch[0].vector.len());
        if expected == 0 {
            bail!("Refusing to store an empty embedding vector");
        }
        if let Some(bad) = batch.iter().find(|e| e.vector.len() != expected) {
            bail!(
                "Embedding dimension mismatch for '{}': expected {}, got {}",
                bad.identifier,
                expected,
                bad.vector.len()
            );
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open vector store: {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        for entry in &batch {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;

        self.entries.extend(batch);
        Ok(())
    }
}

fn load_entries(path: &Path) -> Result<Vec<EmbeddingEntry>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open vector store: {}", path.display()))?;

    let mut entries: Vec<EmbeddingEntry> = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: EmbeddingEntry = serde_json::from_str(&line)
            .with_context(|| format!("Corrupt vector store entry at {}:{}", path.display(), i + 1))?;

        if let Some(first) = entries.first() {
            if first.vector.len() != entry.vector.len() {
                bail!(
                    "Vector store {} mixes dimensions: line {} has {}, expected {}",
                    path.display(),
                    i + 1,
                    entry.vector.len(),
                    first.vector.len()
                );
            }
        }
        entries.push(entry);
    }
    Ok(entries)
}
