//! # Mud Agent
//!
//! Retrieval-augmented question answering over a local documentation corpus.
//!
//! A documentation tree is embedded once into a persistent local vector store;
//! each question is then answered by retrieving the closest documents and
//! folding them, together with the conversation so far, into a single
//! completion request.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌─────────────┐
//! │  Loader  │──▶│  Corpus  │──▶│  Ingest  │──▶│ VectorStore │
//! │ (walk)   │   │ (JSONL)  │   │ (embed)  │   │   (JSONL)   │
//! └──────────┘   └──────────┘   └──────────┘   └──────┬──────┘
//!                                                     │
//!                 ┌──────────────┐   ┌───────────┐    │
//!   stdin ──────▶ │ Conversation │──▶│ Retriever │◀───┘
//!                 └──────┬───────┘   └───────────┘
//!                        ▼
//!                 completion provider
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export ANTHROPIC_API_KEY=... ANTHROPIC_SEARCH_MODEL=claude-2
//! mud ingest                         # embed ./data/mud-blazor into the store
//! mud search "MudTable server paging"
//! mud chat                           # interactive loop, `exit` to quit
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`models`] | Core data types |
//! | [`extract`] | UTF encoding detection and decoding |
//! | [`loader`] | Corpus directory walker |
//! | [`corpus`] | Line-delimited corpus file |
//! | [`store`] | Persistent vector store |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`completion`] | Completion provider abstraction |
//! | [`ingest`] | Idempotent embedding ingestion |
//! | [`search`] | Ranking and query refinement |
//! | [`chat`] | Conversation loop and prompt assembly |
//! | [`stats`] | Store summary |

pub mod chat;
pub mod completion;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod extract;
mod http;
pub mod ingest;
pub mod loader;
pub mod models;
pub mod search;
pub mod stats;
pub mod store;
