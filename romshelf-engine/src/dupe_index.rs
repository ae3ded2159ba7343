//! In-memory index of content identities seen during one scan run.
//!
//! The index is the arbiter of "have we seen this content before in this
//! run". It is shared by all hashing workers, so registration has to be a
//! single atomic check-and-insert — `DashMap`'s entry guard holds the shard
//! lock across the check and the push, so concurrent registrations of the
//! same identity cannot lose updates.

use dashmap::DashMap;

use romshelf_core::{ContentIdentity, DuplicateGroup, FileLocation};

/// Outcome of registering one (identity, location) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// First time this identity was seen this run.
    NewLocation,
    /// The identity is already registered to one or more other locations
    /// (possibly belonging to a different game). Carries the locations
    /// that were present before this registration.
    KnownDuplicate(Vec<FileLocation>),
}

/// Append-only (within a run) identity → locations index.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    map: DashMap<ContentIdentity, Vec<FileLocation>>,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a location for an identity. A given (identity, path) pair
    /// registers at most once; re-registering it reports the existing
    /// state without appending.
    pub fn register(&self, identity: ContentIdentity, location: FileLocation) -> RegisterOutcome {
        let mut entry = self.map.entry(identity).or_default();
        if entry.is_empty() {
            entry.push(location);
            return RegisterOutcome::NewLocation;
        }
        let existing = entry.clone();
        if !entry.iter().any(|l| l.path == location.path) {
            entry.push(location);
        }
        RegisterOutcome::KnownDuplicate(existing)
    }

    /// All locations currently registered for an identity.
    pub fn locations(&self, identity: &ContentIdentity) -> Vec<FileLocation> {
        self.map
            .get(identity)
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// The full duplicate graph for this run: every identity registered to
    /// more than one distinct path.
    pub fn duplicate_groups(&self) -> Vec<DuplicateGroup> {
        self.map
            .iter()
            .filter(|e| e.value().len() > 1)
            .map(|e| DuplicateGroup {
                identity: *e.key(),
                locations: e.value().clone(),
            })
            .collect()
    }

    /// Number of distinct identities registered.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn identity(n: u8) -> ContentIdentity {
        ContentIdentity::new([n; 32], n as u64)
    }

    #[test]
    fn test_first_registration_is_new() {
        let index = DuplicateIndex::new();
        let outcome = index.register(identity(1), FileLocation::new("/a/x.rom"));
        assert_eq!(outcome, RegisterOutcome::NewLocation);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_second_path_is_duplicate() {
        let index = DuplicateIndex::new();
        index.register(identity(1), FileLocation::new("/a/x.rom"));
        let outcome = index.register(identity(1), FileLocation::linked("/b/y.rom", 7));
        match outcome {
            RegisterOutcome::KnownDuplicate(existing) => {
                assert_eq!(existing.len(), 1);
                assert_eq!(existing[0].path.to_str(), Some("/a/x.rom"));
            }
            other => panic!("expected KnownDuplicate, got {other:?}"),
        }
        let groups = index.duplicate_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].locations.len(), 2);
    }

    #[test]
    fn test_same_pair_registers_once() {
        let index = DuplicateIndex::new();
        index.register(identity(1), FileLocation::new("/a/x.rom"));
        index.register(identity(1), FileLocation::new("/a/x.rom"));
        assert_eq!(index.locations(&identity(1)).len(), 1);
        assert!(index.duplicate_groups().is_empty());
    }

    #[test]
    fn test_concurrent_registration_loses_nothing() {
        // N workers registering M distinct identities: exactly M NewLocation
        // outcomes and every (identity, path) pair present afterwards.
        const WORKERS: usize = 8;
        const IDENTITIES: usize = 64;

        let index = Arc::new(DuplicateIndex::new());
        let mut handles = Vec::new();
        for w in 0..WORKERS {
            let index = index.clone();
            handles.push(std::thread::spawn(move || {
                let mut new_count = 0usize;
                for i in 0..IDENTITIES {
                    let loc = FileLocation::new(format!("/srv/{w}/{i}.rom"));
                    if index.register(identity(i as u8), loc) == RegisterOutcome::NewLocation {
                        new_count += 1;
                    }
                }
                new_count
            }));
        }

        let total_new: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total_new, IDENTITIES);
        assert_eq!(index.len(), IDENTITIES);
        for i in 0..IDENTITIES {
            assert_eq!(index.locations(&identity(i as u8)).len(), WORKERS);
        }
    }
}
