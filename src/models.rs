//! Core data models used throughout the agent.
//!
//! These types represent the documents, stored embeddings, search hits and
//! conversation turns that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// One flattened source file, as emitted by the loader.
///
/// Serialized as `{"metadata": <file name>, "text": <content>}`, one per line
/// in the corpus file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Base name of the source file. Not unique across subdirectories.
    #[serde(rename = "metadata")]
    pub identifier: String,
    pub text: String,
}

/// An embedded document held by the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingEntry {
    #[serde(rename = "metadata")]
    pub identifier: String,
    #[serde(rename = "embedding")]
    pub vector: Vec<f32>,
    pub text: String,
}

/// A ranked store entry returned by the retriever.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Position of the entry in the store (insertion order).
    pub index: usize,
    pub identifier: String,
    pub text: String,
    pub score: f32,
}

/// One question/answer exchange in the interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub query: String,
    /// `None` while the completion is pending or after it failed.
    pub response: Option<String>,
}

impl ConversationTurn {
    pub fn pending(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            response: None,
        }
    }
}
