//! Git access: history ingestion, repository resolution and blob export.

pub mod blob;
pub mod clone;
pub mod log;

pub use blob::{find_diagram_source, resolve_commit, CommitLookup, DiagramSource, SourceLookup};
pub use clone::{clone_repo, ensure_repository, resolve_location, RepoLocation};
pub use log::{parse_log, read_commits, IngestError};
