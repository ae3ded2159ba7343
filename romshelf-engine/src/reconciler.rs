//! Batch reconciliation: walk, identify, deduplicate, resolve, commit.
//!
//! One [`Reconciler::run`] call drives a full scan through the stages
//! `Walking → Identifying → Resolving → Committing → Done`, accumulating
//! everything into a single [`ReconciliationResult`]. Per-file errors are
//! recorded and skipped; only an invalid root aborts the run.
//!
//! Commits are a best-effort batch, not a transaction: each accepted match
//! is an independent game update, a failed item is reported per-item, and
//! already-applied items are never rolled back.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;

use romshelf_core::{
    AppliedUpdate, Catalog, CommitFailure, ContentIdentity, DuplicateGroup, FileDescriptor,
    FileLocation, GameId, GameStore, MetadataCandidate, PendingMatch, ReconciliationResult,
    RegisteredFile, ResolveError, ScanError, SkippedFile, UnresolvedFile,
};

use crate::cache::{CacheStats, MetadataCache};
use crate::dupe_index::{DuplicateIndex, RegisterOutcome};
use crate::hash_pool::HashPool;
use crate::resolver::MetadataResolver;
use crate::settings::Settings;
use crate::walker::DirectoryWalker;

/// Stages of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Idle,
    Walking,
    Identifying,
    Resolving,
    Committing,
    Done,
    /// Terminal stage for an unrecoverable error (invalid root).
    Failed,
}

/// Progress events emitted during a run, consumed by the CLI or any other
/// frontend. Delivery is best-effort; a dropped receiver never stalls the
/// scan.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    StageChanged(ScanStage),
    WalkComplete { total: usize },
    FileHashed { path: PathBuf },
    FileSkipped { path: PathBuf, error: String },
    DuplicateFound { path: PathBuf },
    FileResolved { path: PathBuf, candidates: usize },
    FileUnresolved { path: PathBuf, reason: String },
    UpdateApplied { path: PathBuf, game_id: GameId },
    CommitFailed { path: PathBuf, error: String },
    Cancelled,
    Done,
}

/// Shared cancellation signal, checked between files — an in-flight hash
/// runs to completion (a partial read must never look like new content)
/// but its outcome is discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Where an accepted candidate gets committed.
enum UpdateTarget {
    /// No game owns this content yet: create one.
    New,
    /// Refresh metadata on an existing game.
    Existing(GameId),
}

struct ResolveItem {
    desc: FileDescriptor,
    identity: ContentIdentity,
    target: UpdateTarget,
}

enum ResolveOutcome {
    Resolved(Result<Vec<MetadataCandidate>, ResolveError>),
    /// The cancel flag was already set when this item came up.
    CancelledSkip,
}

/// The reconciliation engine. Owns its cache and holds the two
/// collaborators for the lifetime of the instance — no ambient singletons;
/// the cache's sweeper dies with the reconciler.
pub struct Reconciler<S, C> {
    store: S,
    catalog: C,
    cache: MetadataCache<Vec<MetadataCandidate>>,
    settings: Settings,
}

impl<S: GameStore, C: Catalog> Reconciler<S, C> {
    /// Build a reconciler. Must be called inside a tokio runtime (the
    /// cache sweeper is spawned here).
    pub fn new(store: S, catalog: C, settings: Settings) -> Self {
        let cache = MetadataCache::new(settings.cache_ttl(), settings.sweep_interval());
        Self {
            store,
            catalog,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Snapshot of the metadata cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop all cached catalog lookups and reset the counters.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Run one full scan of `root`.
    ///
    /// Returns `Err` only for an invalid root, before any work starts.
    /// Everything else — unreadable files, catalog failures, rejected
    /// commits — lands inside the returned result.
    pub async fn run(
        &self,
        root: &Path,
        cancel: &CancelFlag,
        events: Option<mpsc::UnboundedSender<ScanEvent>>,
    ) -> Result<ReconciliationResult, ScanError> {
        let emit = |ev: ScanEvent| {
            if let Some(tx) = &events {
                let _ = tx.send(ev);
            }
        };

        let mut result = ReconciliationResult::default();
        let mut cancelled = false;

        // ── Walking ─────────────────────────────────────────────────────
        emit(ScanEvent::StageChanged(ScanStage::Walking));
        let walker = DirectoryWalker::new(root, &self.settings.extensions);
        let mut walk = match walker.iter() {
            Ok(w) => w,
            Err(e) => {
                emit(ScanEvent::StageChanged(ScanStage::Failed));
                return Err(e);
            }
        };

        let mut descriptors: Vec<FileDescriptor> = Vec::new();
        for desc in &mut walk {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            descriptors.push(desc);
        }
        result.warnings = walk.take_warnings();
        for w in &result.warnings {
            log::warn!("{w}");
        }
        emit(ScanEvent::WalkComplete {
            total: descriptors.len(),
        });

        // ── Identifying ─────────────────────────────────────────────────
        let index = DuplicateIndex::new();
        // Files whose identity registered cleanly, pending classification
        // once the full duplicate graph is known.
        let mut hashed: Vec<(FileDescriptor, ContentIdentity, Option<GameId>)> = Vec::new();

        if !cancelled && !descriptors.is_empty() {
            emit(ScanEvent::StageChanged(ScanStage::Identifying));
            let mut pool =
                HashPool::spawn(self.settings.hash_workers, descriptors, cancel.clone());

            while let Some((desc, outcome)) = pool.recv().await {
                if cancel.is_cancelled() {
                    // In-flight hash abandoned: its outcome is not recorded.
                    cancelled = true;
                    break;
                }
                match outcome {
                    Ok(identity) => {
                        self.register_file(&index, desc, identity, &mut hashed, &mut result, &emit);
                    }
                    Err(e) => {
                        let error = e.to_string();
                        emit(ScanEvent::FileSkipped {
                            path: desc.path.clone(),
                            error: error.clone(),
                        });
                        result.skipped.push(SkippedFile {
                            path: desc.path,
                            error,
                        });
                    }
                }
            }
        }

        // Classify: files in a duplicate group belong to the duplicate
        // bucket and are never queued for resolution.
        let dup_groups: Vec<DuplicateGroup> = index.duplicate_groups();
        let dup_identities: HashSet<ContentIdentity> =
            dup_groups.iter().map(|g| g.identity).collect();

        let mut to_resolve: Vec<ResolveItem> = Vec::new();
        for (desc, identity, existing_game) in hashed {
            if dup_identities.contains(&identity) {
                emit(ScanEvent::DuplicateFound {
                    path: desc.path.clone(),
                });
                continue;
            }
            result.registered.push(RegisteredFile {
                path: desc.path.clone(),
                identity,
            });
            match existing_game {
                None => to_resolve.push(ResolveItem {
                    desc,
                    identity,
                    target: UpdateTarget::New,
                }),
                Some(id) if self.settings.refresh_existing => to_resolve.push(ResolveItem {
                    desc,
                    identity,
                    target: UpdateTarget::Existing(id),
                }),
                Some(_) => {}
            }
        }
        result.duplicates = dup_groups;

        // ── Resolving ───────────────────────────────────────────────────
        let mut accepted: Vec<(ResolveItem, MetadataCandidate)> = Vec::new();
        if !cancelled && !to_resolve.is_empty() {
            emit(ScanEvent::StageChanged(ScanStage::Resolving));
            let resolver = MetadataResolver::new(
                &self.catalog,
                &self.cache,
                self.settings.catalog_timeout(),
            );
            let root_buf = root.to_path_buf();

            let outcomes: Vec<(ResolveItem, ResolveOutcome)> = stream::iter(to_resolve)
                .map(|item| {
                    let resolver = &resolver;
                    let root = &root_buf;
                    async move {
                        if cancel.is_cancelled() {
                            return (item, ResolveOutcome::CancelledSkip);
                        }
                        let guess = item.desc.title_guess();
                        let platform = platform_guess(root, &item.desc.path);
                        let res = resolver.resolve(&guess, platform.as_deref()).await;
                        (item, ResolveOutcome::Resolved(res))
                    }
                })
                .buffer_unordered(self.settings.resolver_workers.max(1))
                .collect()
                .await;

            let threshold = self.settings.confidence_threshold;
            for (item, outcome) in outcomes {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                let res = match outcome {
                    ResolveOutcome::Resolved(res) => res,
                    ResolveOutcome::CancelledSkip => {
                        cancelled = true;
                        continue;
                    }
                };
                match res {
                    Ok(candidates) if candidates.is_empty() => {
                        self.record_unresolved(&item, "no catalog match", &mut result, &emit);
                    }
                    Ok(candidates) => {
                        emit(ScanEvent::FileResolved {
                            path: item.desc.path.clone(),
                            candidates: candidates.len(),
                        });
                        if candidates[0].confidence >= threshold {
                            let top = candidates[0].clone();
                            accepted.push((item, top));
                        } else {
                            result.pending.push(PendingMatch {
                                path: item.desc.path.clone(),
                                candidates,
                            });
                        }
                    }
                    Err(e) => {
                        self.record_unresolved(&item, &e.to_string(), &mut result, &emit);
                    }
                }
            }
        }

        // ── Committing ──────────────────────────────────────────────────
        if !cancelled && !accepted.is_empty() {
            emit(ScanEvent::StageChanged(ScanStage::Committing));
            for (item, candidate) in accepted {
                if cancel.is_cancelled() {
                    // Already-committed items stay committed.
                    cancelled = true;
                    break;
                }
                let committed = match item.target {
                    UpdateTarget::New => {
                        self.store
                            .create_game(&candidate, &item.identity, &item.desc.path)
                    }
                    UpdateTarget::Existing(id) => self
                        .store
                        .apply_metadata_update(id, &candidate)
                        .map(|()| id),
                };
                match committed {
                    Ok(game_id) => {
                        emit(ScanEvent::UpdateApplied {
                            path: item.desc.path.clone(),
                            game_id,
                        });
                        result.applied.push(AppliedUpdate {
                            game_id,
                            path: item.desc.path,
                            title: candidate.title,
                        });
                    }
                    Err(e) => {
                        let error = e.to_string();
                        emit(ScanEvent::CommitFailed {
                            path: item.desc.path.clone(),
                            error: error.clone(),
                        });
                        result.commit_failures.push(CommitFailure {
                            path: item.desc.path,
                            title: candidate.title,
                            error,
                        });
                    }
                }
            }
        }

        result.cancelled = cancelled;
        if cancelled {
            emit(ScanEvent::Cancelled);
        }
        emit(ScanEvent::StageChanged(ScanStage::Done));
        emit(ScanEvent::Done);
        Ok(result)
    }

    /// Register one hashed file in the per-run index and fold persisted
    /// locations of the same content into the duplicate graph.
    fn register_file(
        &self,
        index: &DuplicateIndex,
        desc: FileDescriptor,
        identity: ContentIdentity,
        hashed: &mut Vec<(FileDescriptor, ContentIdentity, Option<GameId>)>,
        result: &mut ReconciliationResult,
        emit: &impl Fn(ScanEvent),
    ) {
        let existing_game = match self.store.find_game_by_identity(&identity) {
            Ok(g) => g.map(|g| g.id),
            Err(e) => {
                let error = format!("store lookup failed: {e}");
                emit(ScanEvent::FileSkipped {
                    path: desc.path.clone(),
                    error: error.clone(),
                });
                result.skipped.push(SkippedFile {
                    path: desc.path,
                    error,
                });
                return;
            }
        };

        let location = FileLocation {
            path: desc.path.clone(),
            game_id: existing_game,
        };
        let outcome = index.register(identity, location);
        emit(ScanEvent::FileHashed {
            path: desc.path.clone(),
        });

        if outcome == RegisterOutcome::NewLocation {
            // First sighting this run: persisted locations of the same
            // content at other paths still make it a duplicate.
            let persisted = self
                .store
                .find_locations_by_identity(&identity)
                .unwrap_or_else(|e| {
                    log::warn!("location lookup failed for {}: {e}", desc.path.display());
                    Vec::new()
                });
            for loc in persisted {
                if loc.path != desc.path {
                    index.register(identity, loc);
                }
            }
        }

        hashed.push((desc, identity, existing_game));
    }

    fn record_unresolved(
        &self,
        item: &ResolveItem,
        reason: &str,
        result: &mut ReconciliationResult,
        emit: &impl Fn(ScanEvent),
    ) {
        // Buckets are exclusive: an unresolved file leaves `registered`.
        result.registered.retain(|r| r.path != item.desc.path);
        emit(ScanEvent::FileUnresolved {
            path: item.desc.path.clone(),
            reason: reason.to_string(),
        });
        result.unresolved.push(UnresolvedFile {
            path: item.desc.path.clone(),
            reason: reason.to_string(),
        });
    }
}

/// Platform guess from the folder-per-platform layout: the file's parent
/// directory name, unless the file sits directly in the scan root.
fn platform_guess(root: &Path, path: &Path) -> Option<String> {
    let parent = path.parent()?;
    if parent == root {
        return None;
    }
    parent
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_guess_uses_parent_folder() {
        let root = Path::new("/library");
        assert_eq!(
            platform_guess(root, Path::new("/library/snes/game.sfc")),
            Some("snes".to_string())
        );
        assert_eq!(platform_guess(root, Path::new("/library/game.sfc")), None);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
