//! Embedding ingestion pipeline.
//!
//! Coordinates the one-time fill of the vector store: loader → corpus file →
//! batched embedding → store append. Ingestion is gated on the store being
//! empty; a populated store is never re-embedded, merged or deduplicated.
//!
//! An embedding failure aborts the run. Batches appended before the failure
//! stay in the store, which then counts as populated; recovering from that
//! requires clearing the store (`mud ingest --rebuild`).

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{Config, CorpusConfig};
use crate::corpus;
use crate::embedding::{self, EmbeddingProvider};
use crate::loader;
use crate::models::EmbeddingEntry;
use crate::store::VectorStore;

/// Outcome of an ingestion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The store already held this many entries; nothing was done.
    AlreadyPopulated(usize),
    /// The store was filled from the corpus.
    Ingested { documents: usize, batches: usize },
}

/// Fill `store` from the corpus described by `corpus_config`, unless it
/// already holds entries.
pub async fn ensure_populated(
    corpus_config: &CorpusConfig,
    store: &mut VectorStore,
    provider: &dyn EmbeddingProvider,
) -> Result<IngestOutcome> {
    if !store.is_empty() {
        info!(entries = store.len(), "vector store already populated, skipping ingestion");
        return Ok(IngestOutcome::AlreadyPopulated(store.len()));
    }

    info!("vector store is empty, filling it from local text files");
    let records = loader::load_documents(&corpus_config.root())?;
    let corpus_file = corpus::write_jsonl(&records, &corpus_config.corpus_file())?;

    let batches = embed_and_upload(&corpus_file, store, provider, corpus_config.batch_size)
        .await
        .with_context(|| format!("Ingestion of {} failed", corpus_file.display()))?;

    Ok(IngestOutcome::Ingested {
        documents: records.len(),
        batches,
    })
}

/// Embed a serialized corpus file in batches and append each batch to the
/// store. Returns the number of batches uploaded.
pub async fn embed_and_upload(
    corpus_file: &std::path::Path,
    store: &mut VectorStore,
    provider: &dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<usize> {
    let dims = provider.dims();
    if let Some(stored) = store.dims() {
        if stored != dims {
            anyhow::bail!(
                "Embedding model '{}' produces {} dimensions but the store holds {}",
                provider.model_name(),
                dims,
                stored
            );
        }
    }

    let records = corpus::read_jsonl(corpus_file)?;
    let total = records.len();
    let mut uploaded = 0usize;
    let mut batches = 0usize;

    for batch in records.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
        let vectors = provider.embed(&texts).await?;
        if vectors.len() != batch.len() {
            anyhow::bail!(
                "Embedding provider returned {} vectors for a batch of {}",
                vectors.len(),
                batch.len()
            );
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            anyhow::bail!(
                "Embedding model '{}' is configured for {} dimensions but returned {}; \
                 check embedding.dims",
                provider.model_name(),
                dims,
                bad.len()
            );
        }

        let entries: Vec<EmbeddingEntry> = batch
            .iter()
            .zip(vectors)
            .map(|(record, vector)| EmbeddingEntry {
                identifier: record.identifier.clone(),
                vector,
                text: record.text.clone(),
            })
            .collect();

        store.append(entries)?;
        uploaded += batch.len();
        batches += 1;
        info!(
            model = provider.model_name(),
            uploaded,
            total,
            "embedded batch {}",
            batches
        );
    }

    Ok(batches)
}

/// `mud ingest`: open (or with `rebuild`, truncate) the store and ingest if empty.
pub async fn run_ingest(config: &Config, rebuild: bool) -> Result<()> {
    let provider = embedding::create_provider(&config.embedding)?;
    let mut store = if rebuild {
        VectorStore::recreate(config.corpus.store_file())?
    } else {
        VectorStore::open(config.corpus.store_file())?
    };

    match ensure_populated(&config.corpus, &mut store, provider.as_ref()).await? {
        IngestOutcome::AlreadyPopulated(n) => {
            println!("ingest {}", config.corpus.name);
            println!("  store already populated: {} entries", n);
            println!("  (use --rebuild to re-embed)");
        }
        IngestOutcome::Ingested { documents, batches } => {
            println!("ingest {}", config.corpus.name);
            println!("  documents: {}", documents);
            println!("  batches: {}", batches);
            println!("  entries: {}", store.len());
        }
    }
    println!("ok");
    Ok(())
}
