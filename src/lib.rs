//! # KB Context
//!
//! Knowledge-base retrieval and prompt context assembly for an agricultural
//! equipment support bot.
//!
//! A directory of `.txt` and `.pdf` manuals is chunked, embedded and
//! persisted as a single JSON index. Queries are answered with a hybrid
//! ranking (literal token hits first, cosine neighbours as filler), packed
//! into a bounded context block, and merged into a layered chat prompt. When
//! the knowledge base has nothing, a web search fallback supplies context
//! instead.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────┐   ┌────────────┐
//! │  loader  │──▶│  chunk  │──▶│ embedding│──▶│   index    │
//! │ txt/pdf  │   │ windows │   │ OpenAI / │   │ JSON, Arc  │
//! └──────────┘   └─────────┘   │ disabled │   │  snapshot  │
//!                              └──────────┘   └─────┬──────┘
//!                                                   ▼
//!      ┌──────┐   ┌────────┐   ┌─────────┐   ┌────────────┐
//!      │ chat │◀──│ prompt │◀──│ context │◀──│  retrieve  │
//!      └──────┘   └────────┘   │ KB/web/ │   │ + pack     │
//!                              │ plain   │   └────────────┘
//!                              └────┬────┘
//!                                   ▼
//!                               ┌───────┐
//!                               │  web  │
//!                               └───────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kbctx index                        # build or load kb/kb_index.json
//! kbctx search "antenna RTK"         # ranked chunks
//! kbctx context "antenna RTK"        # packed context and its source mode
//! kbctx ask "How do I calibrate the steering motor?"
//! kbctx stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Chunk, file record and index types |
//! | [`loader`] | KB directory scan and document loading |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Whitespace normalization and chunking |
//! | [`embedding`] | Embedding backends and cosine similarity |
//! | [`index`] | Index build, freshness check, persistence, live handle |
//! | [`retrieve`] | Hybrid literal + semantic retrieval |
//! | [`pack`] | Bounded context packing |
//! | [`web`] | Web search fallback |
//! | [`context`] | KB → web → plain context selection |
//! | [`prompt`] | Layered chat prompt assembly |
//! | [`chat`] | Chat model boundary and retry |
//! | [`stats`] | Index statistics |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod context;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod loader;
pub mod models;
pub mod pack;
pub mod prompt;
pub mod retrieve;
pub mod stats;
pub mod web;
