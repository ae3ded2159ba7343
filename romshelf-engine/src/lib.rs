//! Library reconciliation engine.
//!
//! Scans a directory tree for game files, derives a content identity for
//! each file, detects duplicates across paths and games, resolves unmatched
//! files against an external metadata catalog (through a TTL cache), and
//! commits accepted matches as a best-effort batch through the persistence
//! collaborator.
//!
//! The engine is runtime-agnostic async; the binary owns the tokio runtime.

pub mod cache;
pub mod dupe_index;
pub mod hash_pool;
pub mod identify;
pub mod reconciler;
pub mod resolver;
pub mod settings;
pub mod walker;

pub use cache::{CacheStats, MetadataCache};
pub use dupe_index::{DuplicateIndex, RegisterOutcome};
pub use hash_pool::HashPool;
pub use identify::identify;
pub use reconciler::{CancelFlag, Reconciler, ScanEvent, ScanStage};
pub use resolver::MetadataResolver;
pub use settings::{Settings, settings_path};
pub use walker::DirectoryWalker;
