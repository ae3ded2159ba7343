//! Engine settings, shared by every frontend so tuning lives in one file:
//! `~/.config/romshelf/settings.toml`.
//!
//! The core consumes these knobs but does not own them — a missing or
//! unparsable file falls back to defaults with a logged warning rather
//! than failing a scan.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// Tunables consumed by the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds a cached catalog lookup stays fresh.
    pub cache_ttl_secs: u64,
    /// Seconds between background cache sweeps.
    pub sweep_interval_secs: u64,
    /// Candidates at or above this confidence are auto-accepted; below it
    /// they surface for manual confirmation.
    pub confidence_threshold: f32,
    /// Concurrent hashing workers. Bounded by disk I/O, not CPU.
    pub hash_workers: usize,
    /// Concurrent in-flight catalog lookups. Kept smaller than the hash
    /// pool because the catalog throttles on its side too.
    pub resolver_workers: usize,
    /// Per-request catalog timeout in seconds.
    pub catalog_timeout_secs: u64,
    /// Recognized file extensions (case-insensitive, no dot).
    pub extensions: Vec<String>,
    /// Also re-resolve files already linked to a game and fold fresher
    /// metadata into their records.
    pub refresh_existing: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 30 * 60,
            sweep_interval_secs: 5 * 60,
            confidence_threshold: 0.90,
            hash_workers: 4,
            resolver_workers: 2,
            catalog_timeout_secs: 5,
            extensions: [
                "nes", "sfc", "smc", "n64", "z64", "gb", "gbc", "gba", "md", "gg", "iso",
                "bin", "cue", "chd", "rom",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            refresh_existing: false,
        }
    }
}

impl Settings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    /// Load from the canonical settings file, falling back to defaults
    /// when the file is absent or malformed.
    pub fn load() -> Self {
        let path = settings_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("ignoring malformed {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist atomically (write to a temp file, then rename).
    pub fn save(&self) -> io::Result<()> {
        let path = settings_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(io::Error::other)?;
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &serialized)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Canonical path to the settings file: `~/.config/romshelf/settings.toml`.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("romshelf").join("settings.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.cache_ttl(), Duration::from_secs(1800));
        assert_eq!(s.sweep_interval(), Duration::from_secs(300));
        assert!(s.sweep_interval() < s.cache_ttl());
        assert!(s.resolver_workers <= s.hash_workers);
        assert!(s.confidence_threshold > 0.0 && s.confidence_threshold <= 1.0);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let s: Settings = toml::from_str("hash_workers = 8").unwrap();
        assert_eq!(s.hash_workers, 8);
        assert_eq!(s.cache_ttl_secs, 1800);
        assert!(!s.extensions.is_empty());
    }
}
