//! Shared types and collaborator interfaces for the romshelf
//! reconciliation engine.
//!
//! The engine itself lives in `romshelf-engine`; this crate defines the
//! data model it operates on (content identities, file locations, duplicate
//! groups, metadata candidates, scan results), the error taxonomy, and the
//! traits the engine consumes from its two external collaborators: the
//! persistence store and the metadata catalog.

pub mod error;
pub mod identity;
pub mod result;
pub mod types;

use std::path::Path;

pub use error::{CatalogError, ResolveError, ScanError, StoreError};
pub use identity::{ContentIdentity, DuplicateGroup, FileDescriptor, FileLocation};
pub use result::{
    AppliedUpdate, CommitFailure, PendingMatch, ReconciliationResult, RegisteredFile,
    SkippedFile, UnresolvedFile,
};
pub use types::{CatalogEntry, GameId, GameRecord, MetadataCandidate};

/// Persistence collaborator: the slice of the collection store the
/// reconciliation engine consumes.
///
/// Implementations enforce their own referential integrity and locking
/// discipline; the engine treats each call as an independent unit.
pub trait GameStore: Send + Sync {
    /// Find the game (if any) that already owns this content identity.
    fn find_game_by_identity(
        &self,
        identity: &ContentIdentity,
    ) -> Result<Option<GameRecord>, StoreError>;

    /// All persisted file locations recorded for this identity.
    fn find_locations_by_identity(
        &self,
        identity: &ContentIdentity,
    ) -> Result<Vec<FileLocation>, StoreError>;

    /// Apply an accepted metadata candidate to an existing game.
    fn apply_metadata_update(
        &self,
        game_id: GameId,
        candidate: &MetadataCandidate,
    ) -> Result<(), StoreError>;

    /// Create a new game from an accepted candidate and record the file
    /// location that produced it. Returns the new game's id.
    fn create_game(
        &self,
        candidate: &MetadataCandidate,
        identity: &ContentIdentity,
        path: &Path,
    ) -> Result<GameId, StoreError>;
}

/// External metadata catalog collaborator.
///
/// Subject to network failure, timeouts, and rate limiting; callers treat
/// any error as "this file stays unresolved" rather than aborting a run.
#[allow(async_fn_in_trait)]
pub trait Catalog {
    /// Search the catalog by title, optionally narrowed by platform.
    ///
    /// Platform is a hint, not a filter — implementations should return
    /// cross-platform matches too and let the caller rank them.
    async fn search(
        &self,
        title: &str,
        platform: Option<&str>,
    ) -> Result<Vec<CatalogEntry>, CatalogError>;
}

// Both collaborators delegate through `Arc`, so a frontend can share one
// store or catalog instance across consecutive runs.

impl<T: GameStore + ?Sized> GameStore for std::sync::Arc<T> {
    fn find_game_by_identity(
        &self,
        identity: &ContentIdentity,
    ) -> Result<Option<GameRecord>, StoreError> {
        (**self).find_game_by_identity(identity)
    }

    fn find_locations_by_identity(
        &self,
        identity: &ContentIdentity,
    ) -> Result<Vec<FileLocation>, StoreError> {
        (**self).find_locations_by_identity(identity)
    }

    fn apply_metadata_update(
        &self,
        game_id: GameId,
        candidate: &MetadataCandidate,
    ) -> Result<(), StoreError> {
        (**self).apply_metadata_update(game_id, candidate)
    }

    fn create_game(
        &self,
        candidate: &MetadataCandidate,
        identity: &ContentIdentity,
        path: &Path,
    ) -> Result<GameId, StoreError> {
        (**self).create_game(candidate, identity, path)
    }
}

impl<T: Catalog + ?Sized> Catalog for std::sync::Arc<T> {
    async fn search(
        &self,
        title: &str,
        platform: Option<&str>,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        (**self).search(title, platform).await
    }
}
