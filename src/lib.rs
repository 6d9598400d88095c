//! # Docent
//!
//! A topic-routed, retrieval-augmented question answering assistant.
//!
//! Docent ingests a directory of documents per topic, builds a searchable
//! vector index, and answers natural-language queries by combining
//! retrieved passages with an LLM completion. One process serves many
//! independent topics, each bound to its own chat channels, persona
//! prompt, and owner.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//! │ docs_dir  │──▶│  Processor    │──▶│ Vector Index │
//! │ pdf/docx/ │   │ Extract+Chunk│   │ memory/sqlite│
//! │ txt/md    │   │ +Embed       │   └──────┬───────┘
//! └───────────┘   └──────────────┘          │
//!                                           ▼
//!      channel ──▶ Registry ──▶ Engine ──▶ top-K chunks ──▶ LLM ──▶ reply
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and load-time validation |
//! | [`extract`] | PDF/DOCX/text extraction |
//! | [`chunk`] | Recursive, overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Per-topic vector index backends |
//! | [`processor`] | Per-topic scan → extract → chunk → embed → index |
//! | [`llm`] | Chat completion provider abstraction |
//! | [`engine`] | Retrieval, prompt assembly, reply generation |
//! | [`registry`] | Topic construction and channel routing |
//! | [`knowledge`] | Owner-approved conversation summaries |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod extract;
pub mod index;
pub mod knowledge;
pub mod llm;
pub mod processor;
pub mod registry;
