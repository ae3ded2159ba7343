//! Metadata resolution against the external catalog.
//!
//! Title guesses come from filenames, which carry region/version noise
//! in the `Game Name (USA) [v1.1]` naming convention. The resolver
//! normalizes the guess, consults the TTL cache, and only then queries
//! the catalog — the full ranked candidate list is cached under the same
//! key before returning so repeat lookups never hit the network.

use romshelf_core::{Catalog, CatalogEntry, MetadataCandidate, ResolveError};
use tokio::time::Duration;

use crate::cache::MetadataCache;

/// Ranking constants. Fixed tunables, not hidden heuristics: an exact
/// normalized-title match beats a prefix match beats a fuzzy token match,
/// and platform agreement is a tie-break bonus, never a filter (a
/// cross-platform remaster must still surface).
pub const CONFIDENCE_EXACT: f32 = 0.95;
pub const CONFIDENCE_PREFIX: f32 = 0.70;
pub const CONFIDENCE_FUZZY: f32 = 0.45;
pub const PLATFORM_AGREEMENT_BONUS: f32 = 0.05;

/// Resolves title guesses into ranked [`MetadataCandidate`] lists.
pub struct MetadataResolver<'a, C> {
    catalog: &'a C,
    cache: &'a MetadataCache<Vec<MetadataCandidate>>,
    timeout: Duration,
}

impl<'a, C: Catalog> MetadataResolver<'a, C> {
    pub fn new(
        catalog: &'a C,
        cache: &'a MetadataCache<Vec<MetadataCandidate>>,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            cache,
            timeout,
        }
    }

    /// Resolve a title/platform guess into candidates ordered by descending
    /// confidence. An unreachable or malformed catalog (or a timeout) is a
    /// per-file [`ResolveError`]; callers record the file as unresolved and
    /// continue the run.
    pub async fn resolve(
        &self,
        title_guess: &str,
        platform_guess: Option<&str>,
    ) -> Result<Vec<MetadataCandidate>, ResolveError> {
        let normalized = normalize_title(title_guess);
        let key = cache_key(&normalized, platform_guess);

        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let search = self.catalog.search(&normalized, platform_guess);
        let entries = match tokio::time::timeout(self.timeout, search).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ResolveError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let ranked = rank_candidates(&normalized, platform_guess, entries);
        self.cache.set(key, ranked.clone());
        Ok(ranked)
    }
}

/// Normalize a title guess: case-fold, strip `(Region)` and `[tag]`
/// groups, collapse whitespace.
pub fn normalize_title(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth_paren = 0usize;
    let mut depth_bracket = 0usize;

    for c in raw.chars() {
        match c {
            '(' => depth_paren += 1,
            ')' => depth_paren = depth_paren.saturating_sub(1),
            '[' => depth_bracket += 1,
            ']' => depth_bracket = depth_bracket.saturating_sub(1),
            _ if depth_paren == 0 && depth_bracket == 0 => {
                out.extend(c.to_lowercase());
            }
            _ => {}
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cache_key(normalized: &str, platform: Option<&str>) -> String {
    match platform {
        Some(p) => format!("{normalized}|{}", p.to_lowercase()),
        None => format!("{normalized}|-"),
    }
}

/// Score and sort raw catalog entries against the normalized guess.
/// Entries with no textual relation to the guess are dropped.
fn rank_candidates(
    normalized: &str,
    platform_guess: Option<&str>,
    entries: Vec<CatalogEntry>,
) -> Vec<MetadataCandidate> {
    let mut candidates: Vec<MetadataCandidate> = entries
        .into_iter()
        .filter_map(|entry| {
            let entry_title = normalize_title(&entry.title);
            let base = if entry_title == normalized {
                CONFIDENCE_EXACT
            } else if entry_title.starts_with(normalized) || normalized.starts_with(&entry_title) {
                CONFIDENCE_PREFIX
            } else if tokens_overlap(normalized, &entry_title) {
                CONFIDENCE_FUZZY
            } else {
                return None;
            };

            let platform_agrees = match (platform_guess, entry.platform.as_deref()) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            };
            let confidence = if platform_agrees {
                (base + PLATFORM_AGREEMENT_BONUS).min(1.0)
            } else {
                base
            };

            Some(MetadataCandidate {
                external_id: entry.id,
                title: entry.title,
                platform: entry.platform,
                confidence,
                artwork_urls: entry.artwork_urls,
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates
}

/// True when at least half of the guess's tokens appear in the entry title.
fn tokens_overlap(guess: &str, entry: &str) -> bool {
    let guess_tokens: Vec<&str> = guess.split_whitespace().collect();
    if guess_tokens.is_empty() {
        return false;
    }
    let matching = guess_tokens
        .iter()
        .filter(|t| entry.split_whitespace().any(|e| e == **t))
        .count();
    matching * 2 >= guess_tokens.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use romshelf_core::CatalogError;

    #[test]
    fn test_normalize_strips_region_and_version_tags() {
        assert_eq!(normalize_title("Super Game (USA)"), "super game");
        assert_eq!(normalize_title("Super Game (Europe) [v1.1]"), "super game");
        assert_eq!(normalize_title("Super Game (USA) (Rev A) [!]"), "super game");
        assert_eq!(normalize_title("  Mixed   Case THING "), "mixed case thing");
    }

    #[test]
    fn test_ranking_order_exact_prefix_fuzzy() {
        let entries = vec![
            entry("3", "Chrono Saga Remastered Deluxe"),
            entry("1", "Chrono Saga"),
            entry("2", "Chrono Saga II"),
            entry("4", "Totally Unrelated"),
        ];
        let ranked = rank_candidates("chrono saga", None, entries);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].external_id, "1");
        assert_eq!(ranked[0].confidence, CONFIDENCE_EXACT);
        assert!(ranked[1].confidence <= CONFIDENCE_PREFIX);
    }

    #[test]
    fn test_platform_agreement_is_tiebreak_not_filter() {
        let mut snes = entry("snes", "Chrono Saga");
        snes.platform = Some("SNES".to_string());
        let mut psx = entry("psx", "Chrono Saga");
        psx.platform = Some("PS1".to_string());

        let ranked = rank_candidates("chrono saga", Some("snes"), vec![psx, snes]);
        // Both surface; the platform match ranks first.
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].external_id, "snes");
        assert!(ranked[0].confidence > ranked[1].confidence);
    }

    struct CountingCatalog {
        calls: AtomicUsize,
    }

    impl Catalog for CountingCatalog {
        async fn search(
            &self,
            _title: &str,
            _platform: Option<&str>,
        ) -> Result<Vec<CatalogEntry>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![entry("1", "Chrono Saga")])
        }
    }

    fn entry(id: &str, title: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            title: title.to_string(),
            platform: None,
            artwork_urls: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_cache_shields_repeat_lookups() {
        let catalog = CountingCatalog {
            calls: AtomicUsize::new(0),
        };
        let cache = MetadataCache::with_ttl(Duration::from_secs(60));
        let resolver = MetadataResolver::new(&catalog, &cache, Duration::from_secs(5));

        let first = resolver.resolve("Chrono Saga (USA)", None).await.unwrap();
        let second = resolver.resolve("Chrono Saga (Japan)", None).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        // Different raw guesses normalize to one key: one catalog call.
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    struct FailingCatalog;

    impl Catalog for FailingCatalog {
        async fn search(
            &self,
            _title: &str,
            _platform: Option<&str>,
        ) -> Result<Vec<CatalogEntry>, CatalogError> {
            Err(CatalogError::Unreachable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_catalog_failure_is_resolve_error() {
        let cache = MetadataCache::with_ttl(Duration::from_secs(60));
        let resolver = MetadataResolver::new(&FailingCatalog, &cache, Duration::from_secs(5));
        let err = resolver.resolve("Anything", None).await.unwrap_err();
        assert!(matches!(err, ResolveError::Catalog(_)));
        // Failures are never cached.
        assert_eq!(cache.stats().entries, 0);
    }
}
