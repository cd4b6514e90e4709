//! # decision-graph
//!
//! A server over a repository whose commit messages are architecture
//! decisions (Y-statements). It exposes the decision history, renders the
//! PlantUML decision diagram committed with each decision, and answers
//! questions about the decisions.
//!
//! ## Data flow
//!
//! ```text
//!   git log --all --graph ──► LogIngester ──► DecisionStore ◄── EmbeddingIndexer
//!                                                  │              (optional)
//!                                                  ▼
//!                                   QueryEngine (vector | lexical) ──► Summarizer
//!                                                                      (optional)
//!
//!   GET /diagram/{hash} ──► DiagramCache ──► git blob ──► PlantUML ──► diagram-<hash>.png
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, data dirs, renderer and LLM settings
//! - [`models`] - Shared data types: commits, decisions, evidence, request/response types
//! - [`git`] - History ingestion, clone/resolve, and reading diagram sources from commits
//! - [`store`] - Per-repository persistent decision store
//! - [`llm`] - Embedding and answer-synthesis clients for Ollama or OpenAI-compatible APIs
//! - [`search`] - Vector and lexical retrieval plus answer synthesis
//! - [`diagram`] - At-most-once diagram rendering with an on-disk cache
//! - [`workspace`] - Repository-scoped store + diagram cache
//! - [`api`] - Axum HTTP handlers
//! - [`error`] - HTTP error mapping
//! - [`state`] - Shared application state holding the active workspace

pub mod api;
pub mod config;
pub mod diagram;
pub mod error;
pub mod git;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
pub mod store;
pub mod workspace;
