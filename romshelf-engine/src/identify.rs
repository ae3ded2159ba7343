//! Content identity computation.
//!
//! Streams a file through SHA-256 in fixed-size chunks so large disc
//! images never need to fit in memory. The digest plus the byte count
//! form the [`ContentIdentity`] used everywhere else in the engine.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use romshelf_core::{ContentIdentity, ScanError};

const CHUNK_SIZE: usize = 64 * 1024; // 64 KB

/// Compute the content identity of a file.
///
/// Read-only; no side effects beyond the read itself. Fails with
/// [`ScanError::Io`] if the file cannot be opened or a read fails
/// mid-stream — a partial hash is discarded, never returned or cached.
pub fn identify(path: &Path) -> Result<ContentIdentity, ScanError> {
    let mut file = File::open(path).map_err(|e| ScanError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut size: u64 = 0;

    loop {
        let n = file.read(&mut buf).map_err(|e| ScanError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }

    Ok(ContentIdentity::new(hasher.finalize().into(), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_identity_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "a.rom", b"some rom content");
        let first = identify(&path).unwrap();
        let second = identify(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.size, 16);
    }

    #[test]
    fn test_single_byte_change_changes_identity() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.rom", b"some rom content");
        let b = write_file(&dir, "b.rom", b"some rom contenT");
        let ida = identify(&a).unwrap();
        let idb = identify(&b).unwrap();
        assert_ne!(ida.digest, idb.digest);
        assert_eq!(ida.size, idb.size);
        assert_ne!(ida, idb);
    }

    #[test]
    fn test_identical_bytes_different_paths_match() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.rom", b"identical");
        let b = write_file(&dir, "sub.rom", b"identical");
        assert_eq!(identify(&a).unwrap(), identify(&b).unwrap());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = identify(&dir.path().join("nope.rom")).unwrap_err();
        assert!(matches!(err, ScanError::Io { .. }));
    }

    #[test]
    fn test_multi_chunk_file() {
        // Larger than one 64 KB chunk to exercise the streaming loop.
        let dir = tempfile::tempdir().unwrap();
        let data = vec![0x5au8; 150 * 1024];
        let path = write_file(&dir, "big.rom", &data);
        let id = identify(&path).unwrap();
        assert_eq!(id.size, 150 * 1024);
    }
}
