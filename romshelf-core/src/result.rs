//! The per-run scan summary returned by the batch reconciler.

use std::path::PathBuf;

use serde::Serialize;

use crate::identity::{ContentIdentity, DuplicateGroup};
use crate::types::{GameId, MetadataCandidate};

/// A file whose identity was registered for the first time this run.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredFile {
    pub path: PathBuf,
    pub identity: ContentIdentity,
}

/// A file that could not be matched against the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedFile {
    pub path: PathBuf,
    /// Human-readable reason: no candidates, catalog error, timeout.
    pub reason: String,
}

/// A file with candidates below the auto-accept threshold, surfaced for
/// manual confirmation and not committed.
#[derive(Debug, Clone, Serialize)]
pub struct PendingMatch {
    pub path: PathBuf,
    /// Ranked candidates, best first.
    pub candidates: Vec<MetadataCandidate>,
}

/// A metadata update that was committed through the store.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedUpdate {
    pub game_id: GameId,
    pub path: PathBuf,
    pub title: String,
}

/// A file skipped because of a per-file I/O error.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: String,
}

/// A commit item the store rejected. Already-applied items stay applied —
/// the batch is best-effort, not a transaction.
#[derive(Debug, Clone, Serialize)]
pub struct CommitFailure {
    pub path: PathBuf,
    pub title: String,
    pub error: String,
}

/// Everything a single reconciliation run produced. Built once per
/// invocation and handed back whole — no partial result is ever silently
/// dropped.
///
/// Every file the walker yielded lands in exactly one of: `registered`,
/// a `duplicates` group, `unresolved`, or `skipped`. Files in `registered`
/// additionally show up in `applied` or `pending` when the resolver found
/// candidates for them.
#[derive(Debug, Default, Serialize)]
pub struct ReconciliationResult {
    pub registered: Vec<RegisteredFile>,
    pub duplicates: Vec<DuplicateGroup>,
    pub unresolved: Vec<UnresolvedFile>,
    pub pending: Vec<PendingMatch>,
    pub applied: Vec<AppliedUpdate>,
    pub skipped: Vec<SkippedFile>,
    pub commit_failures: Vec<CommitFailure>,
    /// Non-fatal warnings recorded during the walk (unreadable entries).
    pub warnings: Vec<String>,
    /// True when the run was cancelled before completing; all fields hold
    /// the outcomes recorded up to the cancellation point.
    pub cancelled: bool,
}

impl ReconciliationResult {
    /// Count of newly registered files.
    pub fn new_files(&self) -> usize {
        self.registered.len()
    }

    /// Count of duplicate groups found.
    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }

    /// Count of candidates awaiting manual confirmation.
    pub fn needs_confirmation(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing went wrong anywhere in the run.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.commit_failures.is_empty() && self.warnings.is_empty()
    }
}
