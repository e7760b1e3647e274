//! # project-rag
//!
//! Retrieval-augmented generation over a project knowledge base of
//! projects, stakeholders, documents, ideas, requirements and change
//! requests. The engine answers questions and drafts ideas, requirements
//! and change-impact analyses grounded in the records it retrieves.
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────────┐
//!                       │   Input text     │
//!                       └────────┬─────────┘
//!                                ▼
//!                     ┌─────────────────────┐
//!                     │  Query Expansion    │
//!                     │  one query per line │
//!                     │  keep len > 10      │
//!                     └──────────┬──────────┘
//!                                │ N queries (N may be 0)
//!              ┌─────────────────┼─────────────────┐
//!              ▼                 ▼                 ▼
//!       ┌────────────┐    ┌────────────┐    ┌────────────┐
//!       │  Retrieve  │    │  Retrieve  │    │  Retrieve  │
//!       │  q1        │    │  q2        │    │  qN        │
//!       └─────┬──────┘    └─────┬──────┘    └─────┬──────┘
//!             │  embed once, search 6 entity types concurrently,
//!             │  normalize distance → score, sort by score
//!             └─────────────────┼─────────────────┘
//!                               ▼
//!                  ┌─────────────────────────┐
//!                  │  Merge across queries   │
//!                  │  dedup by (type, id)    │
//!                  │  first occurrence wins  │
//!                  │  re-sort, cap 20 / 30   │
//!                  └────────────┬────────────┘
//!                               ▼
//!                  ┌─────────────────────────┐
//!                  │  Context formatting     │
//!                  │  fixed section order    │
//!                  │  5 per type, truncated  │
//!                  └────────────┬────────────┘
//!                               ▼
//!                  ┌─────────────────────────┐
//!                  │  Generation             │
//!                  │  free text or schema    │
//!                  └─────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for the server, data dir, LLM and retrieval depth
//! - [`error`] - Engine error taxonomy
//! - [`models`] - The six record types, their enums and legacy value tables, request/response types
//! - [`search::metric`] - Distance metrics and score normalization
//! - [`search::hit`] - Ranked hits and hit packing
//! - [`search::source`] - Similarity source traits
//! - [`search::store`] - In-memory knowledge store with JSON persistence
//! - [`search::retriever`] - Six-way concurrent retrieval for one query
//! - [`search::aggregate`] - Multi-query merge and deduplication
//! - [`llm`] - Embedding, text and structured generation via Ollama or OpenAI-compatible APIs
//! - [`llm::query_expand`] - Query expansion
//! - [`context`] - Context block rendering
//! - [`pipeline`] - The four generation pipelines and their typed drafts
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state with explicit open/close

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod state;
