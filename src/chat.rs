//! Interactive question answering loop.
//!
//! Each turn reads one line, retrieves supporting documents, folds the
//! conversation so far and the results into a single completion prompt, and
//! records the answer in the turn history. History lives only as long as the
//! [`Conversation`].
//!
//! ```text
//! START ─▶ AWAIT_QUERY ─┬─ "exit" ─▶ EXIT
//!              ▲        └─ query ─▶ RETRIEVING ─▶ COMPLETING ─┐
//!              └──────────────────────────────────────────────┘
//! ```
//!
//! Provider failures end the session: they propagate out of [`Conversation::run`]
//! with the failed turn left in history without a response.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::completion::{
    AnthropicClient, CompletionProvider, CompletionRequest, AI_PROMPT, HUMAN_PROMPT,
};
use crate::config::{Config, Credentials};
use crate::embedding::{self, EmbeddingProvider};
use crate::ingest;
use crate::models::ConversationTurn;
use crate::search::{RetrieveParams, Retriever, END_OF_SEARCH, SEARCH_TOOL_DESCRIPTION};
use crate::store::VectorStore;

/// Printed before each line of input.
pub const INPUT_PROMPT: &str = "Enter question (or exit): ";

/// Rendered in place of a response that is pending or failed.
pub const ABSENT_RESPONSE: &str = "None";

const SYSTEM_PROMPT: &str = r#"You are a friendly dotnet programming assistant with a focus on Blazor using the MudBlazor framework.
Please write a response to the user that answers their query and provides them with helpful feedback.
Feel free to use the search results above to help you write your response, or ignore them if they are not helpful.

Please ensure your results are in the following format:

Your response to the user's query.

```csharp
@code{
  Relevant Blazor code
}
```"#;

/// Fixed per-session completion parameters.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub stop_sequences: Vec<String>,
    pub max_tokens_to_sample: usize,
    pub temperature: f32,
    pub exit_sentinel: String,
    pub retrieve: RetrieveParams,
}

impl ChatSettings {
    pub fn from_config(config: &Config, credentials: &Credentials) -> Self {
        Self {
            model: credentials.model.clone(),
            stop_sequences: vec![HUMAN_PROMPT.to_string()],
            max_tokens_to_sample: config.chat.max_tokens_to_sample,
            temperature: config.chat.temperature,
            exit_sentinel: config.chat.exit_sentinel.clone(),
            retrieve: RetrieveParams {
                stop_sequences: vec![HUMAN_PROMPT.to_string(), END_OF_SEARCH.to_string()],
                model: credentials.model.clone(),
                n_search_results_to_use: config.retrieval.n_search_results_to_use,
                max_searches_to_try: config.retrieval.max_searches_to_try,
                max_tokens_to_sample: config.retrieval.max_tokens_to_sample,
            },
        }
    }
}

/// Long-lived orchestrator: one retriever, one completion client, one history.
pub struct Conversation {
    retriever: Retriever,
    completer: Arc<dyn CompletionProvider>,
    settings: ChatSettings,
    history: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new(
        retriever: Retriever,
        completer: Arc<dyn CompletionProvider>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            retriever,
            completer,
            settings,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Answer one query and record the turn.
    pub async fn ask(&mut self, query: &str) -> Result<String> {
        self.history.push(ConversationTurn::pending(query));

        let results = self
            .retriever
            .retrieve(query, &self.settings.retrieve)
            .await?;

        let prompt = assemble_prompt(&self.history, query, &results);
        let completion = self
            .completer
            .complete(&CompletionRequest {
                prompt,
                stop_sequences: self.settings.stop_sequences.clone(),
                model: self.settings.model.clone(),
                max_tokens_to_sample: self.settings.max_tokens_to_sample,
                temperature: self.settings.temperature,
            })
            .await?;

        let response = completion.text.trim().to_string();
        if let Some(turn) = self.history.last_mut() {
            turn.response = Some(response.clone());
        }

        info!(turn = self.history.len(), chars = response.len(), "completion received");
        info!("{}\nResponse:\n{}\n{}", "-".repeat(50), response, "-".repeat(50));
        debug!(raw = %completion.text, "raw completion");
        Ok(response)
    }

    /// Read queries from `input` until the exit sentinel or end of input,
    /// writing each answer to `output`. Returns the number of turns taken.
    pub async fn run<R, W>(&mut self, mut input: R, output: &mut W) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut line = String::new();
        loop {
            write!(output, "{}", INPUT_PROMPT)?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line).await? == 0 {
                writeln!(output)?;
                break;
            }
            let query = line.trim_end_matches(['\n', '\r']);
            if query == self.settings.exit_sentinel {
                break;
            }

            let response = self.ask(query).await?;
            writeln!(output, "{}\n", response)?;
        }
        Ok(self.history.len())
    }
}

/// Render every turn as `Query: ... \n Response: ...`, one per line.
pub fn render_history(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|t| {
            format!(
                "Query: {} \n Response: {}",
                t.query,
                t.response.as_deref().unwrap_or(ABSENT_RESPONSE)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The human turn carrying the retrieved results and the query.
pub fn search_prompt(query: &str, results: &str) -> String {
    format!(
        "{HUMAN_PROMPT}\nHere are a set of search results that might be helpful for answering \
         the user's query provided by the MudBlazor Agent:\n\n\
         <result>\n{results}\n</result>\n\n\
         Once again, here is the user's query:\n\n\
         <query>{query}</query>\n{AI_PROMPT}"
    )
}

/// System instructions, then history, then the search block.
pub fn assemble_prompt(turns: &[ConversationTurn], query: &str, results: &str) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        SYSTEM_PROMPT,
        render_history(turns),
        search_prompt(query, results)
    )
}

/// `mud chat`: ingest if needed, then run the interactive loop on stdio.
pub async fn run_chat(config: &Config, credentials: &Credentials) -> Result<()> {
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    let completer: Arc<dyn CompletionProvider> =
        Arc::new(AnthropicClient::new(&config.completion, credentials)?);

    let mut store = VectorStore::open(config.corpus.store_file())?;
    ingest::ensure_populated(&config.corpus, &mut store, embedder.as_ref()).await?;

    let retriever = Retriever::new(SEARCH_TOOL_DESCRIPTION, store, embedder, completer.clone());
    let settings = ChatSettings::from_config(config, credentials);
    let mut conversation = Conversation::new(retriever, completer, settings);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let turns = conversation.run(stdin, &mut stdout).await?;
    info!(turns, "conversation ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(query: &str, response: Option<&str>) -> ConversationTurn {
        ConversationTurn {
            query: query.to_string(),
            response: response.map(str::to_string),
        }
    }

    #[test]
    fn test_render_history() {
        let turns = vec![turn("q1", Some("a1")), turn("q2", None)];
        assert_eq!(
            render_history(&turns),
            "Query: q1 \n Response: a1\nQuery: q2 \n Response: None"
        );
        assert_eq!(render_history(&[]), "");
    }

    #[test]
    fn test_search_prompt_markers() {
        let p = search_prompt("How do I open a dialog?", "<search_results>\n</search_results>");
        assert!(p.starts_with(HUMAN_PROMPT));
        assert!(p.trim_end().ends_with(AI_PROMPT.trim_end()));
        assert!(p.contains("<result>\n<search_results>\n</search_results>\n</result>"));
        assert!(p.contains("<query>How do I open a dialog?</query>"));
    }

    #[test]
    fn test_assemble_prompt_order_is_stable() {
        let turns = vec![turn("first", Some("answer")), turn("second", None)];
        let a = assemble_prompt(&turns, "second", "R");
        let b = assemble_prompt(&turns, "second", "R");
        assert_eq!(a, b);

        let system = a.find("MudBlazor framework").unwrap();
        let history = a.find("Query: first").unwrap();
        let block = a.find("<result>").unwrap();
        assert!(system < history && history < block);
        assert!(a.contains("Query: second \n Response: None"));
    }
}
