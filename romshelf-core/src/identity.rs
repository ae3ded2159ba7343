//! Content-addressed file identity and the location/duplicate model built
//! on top of it.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::GameId;

/// A content-addressed fingerprint for a file: SHA-256 digest plus byte
/// length. Two files with equal identity are the same content regardless
/// of where they live.
///
/// The size is carried alongside the digest as a cheap pre-filter — equal
/// digests with unequal sizes never happen for honest SHA-256 input, so a
/// size mismatch rules out equality without comparing digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentIdentity {
    /// SHA-256 digest of the file contents.
    pub digest: [u8; 32],
    /// File size in bytes.
    pub size: u64,
}

impl ContentIdentity {
    pub fn new(digest: [u8; 32], size: u64) -> Self {
        Self { digest, size }
    }

    /// Lowercase hex rendering of the digest, used as the persisted key.
    pub fn hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.digest {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }

    /// Parse a 64-char lowercase hex digest back into an identity.
    /// Returns `None` for malformed input.
    pub fn from_hex(hex: &str, size: u64) -> Option<Self> {
        if hex.len() != 64 {
            return None;
        }
        let mut digest = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let s = std::str::from_utf8(chunk).ok()?;
            digest[i] = u8::from_str_radix(s, 16).ok()?;
        }
        Some(Self { digest, size })
    }
}

impl fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hex(), self.size)
    }
}

/// A candidate file produced by the directory walker. Ephemeral — built
/// fresh each scan, never persisted.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// Size in bytes at walk time.
    pub size: u64,
    /// Modification time at walk time.
    pub modified: SystemTime,
    /// Lowercased file extension (without the dot).
    pub extension: String,
}

impl FileDescriptor {
    /// Filename for display, lossy on non-UTF-8 paths.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "?".to_string())
    }

    /// Filename stem used as the title guess for catalog resolution.
    pub fn title_guess(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One place a piece of content lives: a path, optionally already linked
/// to a game record. Many locations may reference one game (the same game
/// stored on multiple paths); one location references at most one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    pub path: PathBuf,
    pub game_id: Option<GameId>,
}

impl FileLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            game_id: None,
        }
    }

    pub fn linked(path: impl Into<PathBuf>, game_id: GameId) -> Self {
        Self {
            path: path.into(),
            game_id: Some(game_id),
        }
    }
}

/// A set of file locations sharing one content identity across more than
/// one game, or multiple unlinked paths for the same content.
///
/// Computed fresh per scan and reported as scan output; never persisted.
/// Duplicates require operator confirmation — the engine detects them but
/// never merges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub identity: ContentIdentity,
    pub locations: Vec<FileLocation>,
}

impl DuplicateGroup {
    /// Distinct game ids claiming this identity.
    pub fn game_ids(&self) -> Vec<GameId> {
        let mut ids: Vec<GameId> = self.locations.iter().filter_map(|l| l.game_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// True when more than one distinct game claims the same content.
    pub fn spans_games(&self) -> bool {
        self.game_ids().len() > 1
    }
}
