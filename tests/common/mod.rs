//! Stub providers shared by the integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use mud_agent::completion::{Completion, CompletionProvider, CompletionRequest, StopReason};
use mud_agent::embedding::EmbeddingProvider;

/// Terms that make up the stub embedding space, one dimension each.
pub const VOCABULARY: [&str; 4] = ["button", "table", "dialog", "theme"];

/// Embeds text as term counts over [`VOCABULARY`] and counts calls.
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
    pub texts_embedded: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
        }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        VOCABULARY
            .iter()
            .map(|term| lower.matches(term).count() as f32)
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-stub"
    }
    fn dims(&self) -> usize {
        VOCABULARY.len()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Replays scripted completions and records every request.
///
/// When the script runs out it answers `fallback`, stopping on
/// `fallback_stop`.
pub struct ScriptedCompleter {
    script: Mutex<VecDeque<Result<Completion, String>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
    fallback: Completion,
}

impl ScriptedCompleter {
    pub fn new() -> Self {
        Self::with_fallback(Completion {
            text: " END_OF_SEARCH".to_string(),
            stop_reason: StopReason::StopSequence("END_OF_SEARCH".to_string()),
        })
    }

    pub fn with_fallback(fallback: Completion) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fallback,
        }
    }

    pub fn push(&self, text: &str, stop: Option<&str>) {
        let stop_reason = match stop {
            Some(s) => StopReason::StopSequence(s.to_string()),
            None => StopReason::Other("end_turn".to_string()),
        };
        self.script.lock().unwrap().push_back(Ok(Completion {
            text: text.to_string(),
            stop_reason,
        }));
    }

    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompleter {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(c)) => Ok(c),
            Some(Err(message)) => bail!("{}", message),
            None => Ok(self.fallback.clone()),
        }
    }
}
