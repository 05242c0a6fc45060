//! # docchat
//!
//! A retrieval-augmented chat core for document-scoped conversations.
//!
//! docchat ingests raw text into an embedded knowledge base (chunking,
//! embedding, SQLite storage) and answers questions grounded in both
//! curated company knowledge and the document the user is viewing, while
//! tracking per-session conversation transcripts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │  Ingest  │──▶│ Chunk+Embed  │──▶│  SQLite   │
//! │  (text)  │   │  (fan-out)   │   │ vec BLOBs │
//! └──────────┘   └──────────────┘   └─────┬─────┘
//!                                         │
//!                  ┌──────────────────────┤
//!                  ▼                      ▼
//!            ┌───────────┐         ┌─────────────┐
//!            │ Retriever │────────▶│ ChatEngine  │
//!            │ (cosine)  │ prompt  │ (complete)  │
//!            └───────────┘         └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`chunk`] | Sentence-aware text chunking |
//! | [`embedding`] | Embedding provider abstraction and batch fan-out |
//! | [`completion`] | Chat completion provider abstraction |
//! | [`store`] | Knowledge and conversation storage (SQLite, in-memory) |
//! | [`ingest`] | Write path: chunk, embed, replace |
//! | [`retrieve`] | Read path: scoped similarity search |
//! | [`prompt`] | Grounded prompt assembly |
//! | [`conversation`] | Per-session transcript tracking |
//! | [`chat`] | Full chat turn orchestration |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod db;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod store;

pub use error::{Error, Result};
