//! Store statistics.
//!
//! A quick summary of what is indexed: corpus paths, serialized record count,
//! store entry count and vector dimensionality. Used by `mud stats` to check
//! that ingestion ran before starting a chat.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::corpus;
use crate::store::VectorStore;

/// Run the stats command: open the store and print a summary.
pub fn run_stats(config: &Config) -> Result<()> {
    let store = VectorStore::open(config.corpus.store_file())?;
    let corpus_file = config.corpus.corpus_file();

    let corpus_records = if corpus_file.exists() {
        Some(corpus::read_jsonl(&corpus_file)?.len())
    } else {
        None
    };

    println!("Corpus '{}'", config.corpus.name);
    println!("================================");
    println!();
    println!("  Root:        {}", config.corpus.root().display());
    println!(
        "  Corpus file: {} ({})",
        corpus_file.display(),
        match corpus_records {
            Some(n) => format!("{} records", n),
            None => "not written".to_string(),
        }
    );
    println!(
        "  Store:       {} ({})",
        store.path().display(),
        format_bytes(file_size(store.path()))
    );
    println!("  Entries:     {}", store.len());
    println!(
        "  Dimensions:  {}",
        store
            .dims()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );

    Ok(())
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
