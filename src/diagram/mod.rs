//! Per-commit diagram rendering with an on-disk artifact cache.

pub mod cache;
pub mod render;

pub use cache::{DiagramBytes, DiagramCache, DiagramError, DiagramJobs, DiagramStatus};
pub use render::{PlantUmlRenderer, RenderError, Renderer};
