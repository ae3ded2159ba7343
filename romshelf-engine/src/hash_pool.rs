//! Bounded pool of hashing workers.
//!
//! N persistent tokio tasks pull [`FileDescriptor`]s from a bounded
//! `async-channel` queue — its `Receiver` is `Clone`, so each worker holds
//! its own handle and no mutex guards the queue. The bounded capacity
//! gives natural backpressure when every worker is busy, which keeps disk
//! I/O from being saturated by an unbounded fan-out.
//!
//! Workers stop pulling new files once the cancel flag is set; the file
//! being hashed runs to completion and its outcome is still delivered, so
//! the receiver decides what to discard.

use romshelf_core::{ContentIdentity, FileDescriptor, ScanError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::identify::identify;
use crate::reconciler::CancelFlag;

/// Last-resort per-file timeout. Hashing on a healthy disk takes seconds
/// at worst; a stall this long means a dead network mount, and the file is
/// reported as a per-file I/O error rather than hanging the scan.
const STALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcome of hashing one walked file.
pub type HashOutcome = (FileDescriptor, Result<ContentIdentity, ScanError>);

/// A pool of workers hashing files concurrently. Outcomes arrive in
/// completion order via [`recv`](Self::recv); `None` means the queue has
/// drained (or cancellation emptied it) and every worker has shut down.
pub struct HashPool {
    result_rx: mpsc::UnboundedReceiver<HashOutcome>,
    _handles: Vec<JoinHandle<()>>,
}

impl HashPool {
    /// Spawn `n` workers over `descriptors`. Submission runs in a
    /// background task so the caller can start receiving immediately.
    pub fn spawn(n: usize, descriptors: Vec<FileDescriptor>, cancel: CancelFlag) -> Self {
        let n = n.max(1);
        let (work_tx, work_rx) = async_channel::bounded::<FileDescriptor>(n);
        let (result_tx, result_rx) = mpsc::unbounded_channel::<HashOutcome>();

        let handles: Vec<JoinHandle<()>> = (0..n)
            .map(|_| {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    while let Ok(desc) = work_rx.recv().await {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let outcome = match tokio::time::timeout(STALL_TIMEOUT, hash_one(&desc))
                            .await
                        {
                            Ok(r) => r,
                            Err(_) => Err(ScanError::io(
                                &desc.path,
                                std::io::Error::new(
                                    std::io::ErrorKind::TimedOut,
                                    format!("hashing stalled past {}s", STALL_TIMEOUT.as_secs()),
                                ),
                            )),
                        };
                        if result_tx.send((desc, outcome)).is_err() {
                            break; // receiver dropped, stop working
                        }
                    }
                })
            })
            .collect();

        // Close the result channel once the last worker exits.
        drop(result_tx);

        tokio::spawn(async move {
            for desc in descriptors {
                if work_tx.send(desc).await.is_err() {
                    break;
                }
            }
            // work_tx drops here; workers drain the queue and stop.
        });

        Self {
            result_rx,
            _handles: handles,
        }
    }

    /// Next hash outcome, or `None` once the pool has drained.
    pub async fn recv(&mut self) -> Option<HashOutcome> {
        self.result_rx.recv().await
    }
}

/// Hash one file off the async threads.
async fn hash_one(desc: &FileDescriptor) -> Result<ContentIdentity, ScanError> {
    let path = desc.path.clone();
    match tokio::task::spawn_blocking(move || identify(&path)).await {
        Ok(result) => result,
        Err(join_err) => Err(ScanError::io(&desc.path, std::io::Error::other(join_err))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn descriptors(dir: &tempfile::TempDir, count: u8) -> Vec<FileDescriptor> {
        (0..count)
            .map(|i| {
                let path = dir.path().join(format!("{i}.rom"));
                fs::write(&path, [i; 16]).unwrap();
                FileDescriptor {
                    path,
                    size: 16,
                    modified: SystemTime::UNIX_EPOCH,
                    extension: "rom".to_string(),
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_every_file_gets_an_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let descs = descriptors(&dir, 12);
        let mut pool = HashPool::spawn(4, descs, CancelFlag::new());

        let mut hashed = 0;
        while let Some((_, outcome)) = pool.recv().await {
            assert!(outcome.is_ok());
            hashed += 1;
        }
        assert_eq!(hashed, 12);
    }

    #[tokio::test]
    async fn test_missing_file_is_per_file_error() {
        let missing = FileDescriptor {
            path: PathBuf::from("/nowhere/gone.rom"),
            size: 0,
            modified: SystemTime::UNIX_EPOCH,
            extension: "rom".to_string(),
        };
        let mut pool = HashPool::spawn(1, vec![missing], CancelFlag::new());
        let (desc, outcome) = pool.recv().await.unwrap();
        assert_eq!(desc.path, PathBuf::from("/nowhere/gone.rom"));
        assert!(matches!(outcome, Err(ScanError::Io { .. })));
        assert!(pool.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_pool_stops_pulling_work() {
        let dir = tempfile::tempdir().unwrap();
        let descs = descriptors(&dir, 8);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let mut pool = HashPool::spawn(2, descs, cancel);
        // Every worker sees the flag before hashing its first file.
        assert!(pool.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_zero_workers_clamps_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let descs = descriptors(&dir, 3);
        let mut pool = HashPool::spawn(0, descs, CancelFlag::new());
        let mut count = 0;
        while pool.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }
}
