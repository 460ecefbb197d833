//! The interactive loop driven from an in-memory input stream.

mod common;

use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::BufReader;

use common::{KeywordEmbedder, ScriptedCompleter};
use mud_agent::chat::{ChatSettings, Conversation, INPUT_PROMPT};
use mud_agent::completion::{CompletionProvider, HUMAN_PROMPT};
use mud_agent::config::{Config, Credentials};
use mud_agent::models::EmbeddingEntry;
use mud_agent::search::{Retriever, END_OF_SEARCH};
use mud_agent::store::VectorStore;

const DOCS: [(&str, &str); 3] = [
    ("Button.md", "MudButton is a button with variants."),
    ("Table.md", "MudTable renders a table with paging."),
    ("Dialog.md", "Use IDialogService to show a dialog."),
];

fn settings() -> ChatSettings {
    let credentials = Credentials {
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
    };
    ChatSettings::from_config(&Config::default(), &credentials)
}

fn conversation(tmp: &TempDir, completer: Arc<ScriptedCompleter>) -> Conversation {
    let mut store = VectorStore::open(tmp.path().join("store.jsonl")).unwrap();
    store
        .append(
            DOCS.iter()
                .map(|(id, text)| EmbeddingEntry {
                    identifier: id.to_string(),
                    vector: KeywordEmbedder::vector(text),
                    text: text.to_string(),
                })
                .collect(),
        )
        .unwrap();

    let completer: Arc<dyn CompletionProvider> = completer;
    let retriever = Retriever::new(
        "Searches test docs.",
        store,
        Arc::new(KeywordEmbedder::new()),
        completer.clone(),
    );
    Conversation::new(retriever, completer, settings())
}

/// Script one converged refinement round followed by the answer.
fn script_turn(completer: &ScriptedCompleter, answer: &str) {
    completer.push(" END_OF_SEARCH", Some(END_OF_SEARCH));
    completer.push(answer, Some(HUMAN_PROMPT));
}

#[tokio::test]
async fn test_exit_first_takes_no_turns() {
    let tmp = TempDir::new().unwrap();
    let completer = Arc::new(ScriptedCompleter::new());
    let mut convo = conversation(&tmp, completer.clone());

    let mut output = Vec::new();
    let turns = convo
        .run(BufReader::new(&b"exit\n"[..]), &mut output)
        .await
        .unwrap();

    assert_eq!(turns, 0);
    assert!(convo.history().is_empty());
    assert!(completer.requests().is_empty());
    assert_eq!(String::from_utf8(output).unwrap(), INPUT_PROMPT);
}

#[tokio::test]
async fn test_end_of_input_ends_session() {
    let tmp = TempDir::new().unwrap();
    let completer = Arc::new(ScriptedCompleter::new());
    script_turn(&completer, "Use MudTable.");
    let mut convo = conversation(&tmp, completer);

    let mut output = Vec::new();
    let turns = convo
        .run(BufReader::new(&b"paging a table"[..]), &mut output)
        .await
        .unwrap();

    assert_eq!(turns, 1);
    assert_eq!(
        convo.history()[0].response.as_deref(),
        Some("Use MudTable.")
    );
}

#[tokio::test]
async fn test_exit_must_match_exactly() {
    let tmp = TempDir::new().unwrap();
    let completer = Arc::new(ScriptedCompleter::new());
    script_turn(&completer, "Goodbye is not a command.");
    let mut convo = conversation(&tmp, completer);

    let mut output = Vec::new();
    let turns = convo
        .run(BufReader::new(&b"Exit\nexit\n"[..]), &mut output)
        .await
        .unwrap();

    assert_eq!(turns, 1);
    assert_eq!(convo.history()[0].query, "Exit");
}

#[tokio::test]
async fn test_two_turns_carry_history() {
    let tmp = TempDir::new().unwrap();
    let completer = Arc::new(ScriptedCompleter::new());
    script_turn(&completer, "  Use MudButton with Variant.Filled.  ");
    script_turn(&completer, "Call DialogService.Show.");
    let mut convo = conversation(&tmp, completer.clone());

    let mut output = Vec::new();
    let turns = convo
        .run(
            BufReader::new(&b"style a button\r\nopen a dialog\nexit\n"[..]),
            &mut output,
        )
        .await
        .unwrap();

    assert_eq!(turns, 2);
    let history = convo.history();
    assert_eq!(history[0].query, "style a button");
    assert_eq!(
        history[0].response.as_deref(),
        Some("Use MudButton with Variant.Filled.")
    );
    assert_eq!(history[1].response.as_deref(), Some("Call DialogService.Show."));

    let printed = String::from_utf8(output).unwrap();
    assert!(printed.contains("Use MudButton with Variant.Filled."));
    assert!(printed.contains("Call DialogService.Show."));
    assert_eq!(printed.matches(INPUT_PROMPT).count(), 3);

    // refine, answer, refine, answer
    let requests = completer.requests();
    assert_eq!(requests.len(), 4);

    let second_answer = &requests[3];
    assert!(second_answer
        .prompt
        .contains("Query: style a button \n Response: Use MudButton with Variant.Filled."));
    assert!(second_answer
        .prompt
        .contains("Query: open a dialog \n Response: None"));
    assert!(second_answer.prompt.contains("<source>Dialog.md</source>"));
    assert!(second_answer.prompt.contains("<query>open a dialog</query>"));
}

#[tokio::test]
async fn test_answer_request_parameters() {
    let tmp = TempDir::new().unwrap();
    let completer = Arc::new(ScriptedCompleter::new());
    script_turn(&completer, "Answer.");
    let mut convo = conversation(&tmp, completer.clone());

    convo.ask("table paging").await.unwrap();

    let requests = completer.requests();
    let refine = &requests[0];
    assert_eq!(refine.model, "test-model");
    assert!(refine.stop_sequences.contains(&HUMAN_PROMPT.to_string()));
    assert!(refine.stop_sequences.contains(&END_OF_SEARCH.to_string()));
    assert_eq!(refine.max_tokens_to_sample, 2000);

    let answer = &requests[1];
    assert_eq!(answer.model, "test-model");
    assert_eq!(answer.stop_sequences, vec![HUMAN_PROMPT.to_string()]);
    assert_eq!(answer.max_tokens_to_sample, 4000);
    assert!((answer.temperature - 0.8).abs() < f32::EPSILON);
    assert!(answer.prompt.contains("MudBlazor framework"));
}

#[tokio::test]
async fn test_provider_error_leaves_turn_unanswered() {
    let tmp = TempDir::new().unwrap();
    let completer = Arc::new(ScriptedCompleter::new());
    completer.push(" END_OF_SEARCH", Some(END_OF_SEARCH));
    completer.push_error("completion API returned 529");
    let mut convo = conversation(&tmp, completer);

    let mut output = Vec::new();
    let err = convo
        .run(BufReader::new(&b"style a button\nexit\n"[..]), &mut output)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("529"));
    assert_eq!(convo.history().len(), 1);
    assert_eq!(convo.history()[0].response, None);
}
