//! Semantic search tool with model-guided query refinement.
//!
//! # Ranking
//!
//! 1. Embed the query with the same provider used at ingestion.
//! 2. Score every store entry by cosine similarity.
//! 3. Sort by score (desc), then insertion index (asc).
//! 4. Truncate to `n_search_results_to_use`.
//!
//! # Refinement
//!
//! After ranking the raw query, the completion provider is shown the results
//! and may ask for another search by emitting
//! `<search_query>...</search_query>`. Each request triggers one more
//! embed-and-rank round, up to `max_searches_to_try` rounds. Hits from all
//! rounds are merged (best score per entry) before the final top-k cut.
//! Anything other than a closed search-query tag ends refinement, and so does
//! running out of rounds or token budget; none of these are errors.

use anyhow::{bail, Result};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

use crate::completion::{
    AnthropicClient, CompletionProvider, CompletionRequest, AI_PROMPT, HUMAN_PROMPT,
};
use crate::config::{Config, Credentials};
use crate::embedding::{self, cosine_similarity, EmbeddingProvider};
use crate::models::{EmbeddingEntry, SearchHit};
use crate::store::VectorStore;

/// Shown to the model when it is offered the search tool.
pub const SEARCH_TOOL_DESCRIPTION: &str = "The search engine will search over the MudBlazor \
documentation database and return relevant information and examples using ```csharp``` tags.";

const SEARCH_QUERY_OPEN: &str = "<search_query>";
const SEARCH_QUERY_CLOSE: &str = "</search_query>";
/// Stop sequence the model uses to declare the results sufficient.
pub const END_OF_SEARCH: &str = "END_OF_SEARCH";
/// Approximate chars-per-token ratio for budgeting refinement completions.
const CHARS_PER_TOKEN: usize = 4;
const REFINE_TEMPERATURE: f32 = 1.0;

/// Inputs for one [`Retriever::retrieve`] call.
#[derive(Debug, Clone)]
pub struct RetrieveParams {
    pub stop_sequences: Vec<String>,
    pub model: String,
    pub n_search_results_to_use: usize,
    pub max_searches_to_try: usize,
    pub max_tokens_to_sample: usize,
}

/// Embedding search over a [`VectorStore`].
pub struct Retriever {
    description: String,
    store: VectorStore,
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
}

impl Retriever {
    pub fn new(
        description: impl Into<String>,
        store: VectorStore,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            description: description.into(),
            store,
            embedder,
            completer,
        }
    }

    /// What the tool searches, as shown to the model.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// One embed-and-rank round for `query`.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.store.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embedding::embed_query(self.embedder.as_ref(), query).await?;
        check_query_dims(&self.store, &query_vec)?;

        let hits = rank(self.store.entries(), &query_vec, k);
        debug!(query, hits = hits.len(), "search round");
        Ok(hits)
    }

    /// Search, refine, and return the final hits.
    pub async fn retrieve_hits(&self, query: &str, params: &RetrieveParams) -> Result<Vec<SearchHit>> {
        let k = params.n_search_results_to_use;
        let mut gathered = self.search(query, k).await?;

        let mut stop_sequences = params.stop_sequences.clone();
        stop_sequences.push(SEARCH_QUERY_CLOSE.to_string());

        let mut prompt = self.refinement_prompt(query, &gathered, params.max_searches_to_try);
        let mut budget = params.max_tokens_to_sample;
        let mut rounds = 0usize;

        while rounds < params.max_searches_to_try && budget > 0 {
            let completion = self
                .completer
                .complete(&CompletionRequest {
                    prompt: prompt.clone(),
                    stop_sequences: stop_sequences.clone(),
                    model: params.model.clone(),
                    max_tokens_to_sample: budget,
                    temperature: REFINE_TEMPERATURE,
                })
                .await?;

            budget = budget.saturating_sub(estimate_tokens(&completion.text));
            prompt.push_str(&completion.text);

            if !completion.stopped_on(SEARCH_QUERY_CLOSE) {
                debug!(rounds, "refinement converged");
                break;
            }
            let Some(refined) = extract_search_query(&completion.text) else {
                debug!(rounds, "search tag without a query, stopping refinement");
                break;
            };

            rounds += 1;
            info!(round = rounds, query = %refined, "refined search");
            let hits = self.search(&refined, k).await?;
            prompt.push_str(SEARCH_QUERY_CLOSE);
            prompt.push_str(&format_results(&hits));
            merge_hits(&mut gathered, hits);
        }

        sort_hits(&mut gathered);
        gathered.truncate(k);
        Ok(gathered)
    }

    /// Search, refine, and return the final hits formatted for a prompt.
    pub async fn retrieve(&self, query: &str, params: &RetrieveParams) -> Result<String> {
        let hits = self.retrieve_hits(query, params).await?;
        Ok(format_results(&hits))
    }

    fn refinement_prompt(&self, query: &str, initial: &[SearchHit], max_searches: usize) -> String {
        format!(
            "{human} You can look things up with a search tool. {description}\n\n\
             A first search for the user's query returned:\n{results}\n\n\
             If these results are not enough to answer the query, write a better search \
             query between {open} and {close} tags. You may search at most {max} more times. \
             Each search is answered with a new <search_results> block. Once the results \
             are sufficient, write {end}.\n\n\
             Here is the user's query: <query>{query}</query>{ai}",
            human = HUMAN_PROMPT,
            description = self.description,
            results = format_results(initial),
            open = SEARCH_QUERY_OPEN,
            close = SEARCH_QUERY_CLOSE,
            max = max_searches,
            end = END_OF_SEARCH,
            query = query,
            ai = AI_PROMPT,
        )
    }
}

/// Fail if `query_vec` does not live in the store's embedding space.
///
/// [`cosine_similarity`] scores mismatched lengths as `0.0`, so ranking
/// without this check would return arbitrary entries.
pub fn check_query_dims(store: &VectorStore, query_vec: &[f32]) -> Result<()> {
    if let Some(dims) = store.dims() {
        if dims != query_vec.len() {
            bail!(
                "Query embedding has {} dimensions but the store has {}; \
                 ingestion and search must use the same embedding model \
                 (run `mud ingest --rebuild` after changing it)",
                query_vec.len(),
                dims
            );
        }
    }
    Ok(())
}

/// Score every entry against `query_vec` and keep the best `k`.
///
/// Callers check dimensions first with [`check_query_dims`].
pub fn rank(entries: &[EmbeddingEntry], query_vec: &[f32], k: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| SearchHit {
            index,
            identifier: entry.identifier.clone(),
            text: entry.text.clone(),
            score: cosine_similarity(query_vec, &entry.vector),
        })
        .collect();
    sort_hits(&mut hits);
    hits.truncate(k);
    hits
}

/// Descending score, ties broken by ascending insertion index.
fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
}

/// Add `new` hits to `gathered`, keeping the higher score for repeats.
fn merge_hits(gathered: &mut Vec<SearchHit>, new: Vec<SearchHit>) {
    for hit in new {
        match gathered.iter_mut().find(|g| g.index == hit.index) {
            Some(existing) => {
                if hit.score > existing.score {
                    existing.score = hit.score;
                }
            }
            None => gathered.push(hit),
        }
    }
}

/// Pull the query out of a completion that stopped on the closing tag.
fn extract_search_query(text: &str) -> Option<String> {
    let start = text.rfind(SEARCH_QUERY_OPEN)? + SEARCH_QUERY_OPEN.len();
    let query = text[start..].trim();
    if query.is_empty() {
        None
    } else {
        Some(query.to_string())
    }
}

fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(CHARS_PER_TOKEN)
}

/// Render hits as a `<search_results>` block.
pub fn format_results(hits: &[SearchHit]) -> String {
    let mut out = String::from("<search_results>\n");
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "<item index=\"{}\">\n<source>{}</source>\n<page_content>\n{}\n</page_content>\n</item>\n",
            i + 1,
            hit.identifier,
            hit.text
        ));
    }
    out.push_str("</search_results>");
    out
}

/// `mud search`: run the retriever once and print the result block.
pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    refine_with: Option<&Credentials>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let store = VectorStore::open(config.corpus.store_file())?;
    if store.is_empty() {
        bail!(
            "Vector store {} is empty. Run `mud ingest` first.",
            store.path().display()
        );
    }

    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    let k = limit.unwrap_or(config.retrieval.n_search_results_to_use);

    let output = if let Some(credentials) = refine_with {
        let completer: Arc<dyn CompletionProvider> =
            Arc::new(AnthropicClient::new(&config.completion, credentials)?);
        let retriever = Retriever::new(SEARCH_TOOL_DESCRIPTION, store, embedder, completer);
        let params = RetrieveParams {
            stop_sequences: vec![HUMAN_PROMPT.to_string(), END_OF_SEARCH.to_string()],
            model: credentials.model.clone(),
            n_search_results_to_use: k,
            max_searches_to_try: config.retrieval.max_searches_to_try,
            max_tokens_to_sample: config.retrieval.max_tokens_to_sample,
        };
        retriever.retrieve(query, &params).await?
    } else {
        let query_vec = embedding::embed_query(embedder.as_ref(), query).await?;
        check_query_dims(&store, &query_vec)?;
        format_results(&rank(store.entries(), &query_vec, k))
    };

    println!("{}", output);
    Ok(())
}
