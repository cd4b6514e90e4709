//! Hybrid retrieval over decisions: vector similarity when embeddings are
//! available, conjunctive lexical matching otherwise.

pub mod engine;
pub mod lexical;
pub mod vector;

pub use engine::{AskError, QueryEngine};
