//! Advisory run lock.
//!
//! A run only proceeds if it can take the lock within a short timeout;
//! otherwise it is skipped, not queued. The returned [`RunGuard`] releases
//! the lock when dropped, so early returns and errors release it too.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// How often a contended file lock is re-checked while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A lock file older than this is considered abandoned by a crashed run.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Lock file I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Non-blocking-ish mutual exclusion between runs.
#[async_trait]
pub trait RunLock: Send + Sync {
    /// Try to take the lock, waiting at most `timeout`. `Ok(None)` means
    /// someone else holds it.
    async fn try_acquire(&self, timeout: Duration) -> Result<Option<RunGuard>, LockError>;
}

/// Proof of holding the run lock. Dropping it releases the lock.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct RunGuard {
    inner: GuardInner,
}

enum GuardInner {
    File(PathBuf),
    Memory(#[allow(dead_code)] OwnedMutexGuard<()>),
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let GuardInner::File(path) = &self.inner {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Run lock released"),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove run lock file"
                ),
            }
        }
    }
}

// ============================================================================
// File Lock
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct LockRecord {
    pid: u32,
    acquired_at: i64,
}

/// Lock file created with `create_new`, so only one process can win the
/// race for it. A file left behind by a crashed run is taken over once it
/// is older than `stale_after`.
pub struct FileLock {
    path: PathBuf,
    stale_after: Duration,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    fn io_error(&self, source: std::io::Error) -> LockError {
        LockError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// One attempt. `Ok(false)` when the file exists and is not stale.
    fn try_create(&self) -> Result<bool, LockError> {
        if self.create_new()? {
            return Ok(true);
        }
        if !self.is_stale(chrono::Utc::now().timestamp()) {
            return Ok(false);
        }
        tracing::warn!(path = %self.path.display(), "Taking over stale run lock");
        self.take_over_stale()?;
        self.create_new()
    }

    fn create_new(&self) -> Result<bool, LockError> {
        use std::io::Write;

        let record = LockRecord {
            pid: std::process::id(),
            acquired_at: chrono::Utc::now().timestamp(),
        };
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                let json = serde_json::to_vec(&record)
                    .map_err(|e| self.io_error(std::io::Error::other(e)))?;
                file.write_all(&json).map_err(|e| self.io_error(e))?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Move the lock file aside with an atomic rename, so that of several
    /// contenders only one gets it. If what was moved turns out to be a
    /// fresh lock (another contender replaced the stale one first), it is
    /// linked back into place.
    fn take_over_stale(&self) -> Result<(), LockError> {
        let aside = self.path.with_extension(format!(
            "stale.{}.{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        match std::fs::rename(&self.path, &aside) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(self.io_error(e)),
        }

        let now = chrono::Utc::now().timestamp();
        let moved_is_stale = match read_record(&aside) {
            Some(record) => self.record_is_stale(&record, now),
            None => file_age(&aside).is_some_and(|age| age > self.stale_after),
        };
        if !moved_is_stale {
            match std::fs::hard_link(&aside, &self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tracing::warn!(path = %self.path.display(), "Run lock replaced during takeover");
                }
                Err(e) => {
                    let _ = std::fs::remove_file(&aside);
                    return Err(self.io_error(e));
                }
            }
        }
        std::fs::remove_file(&aside).map_err(|e| self.io_error(e))
    }

    fn record_is_stale(&self, record: &LockRecord, now: i64) -> bool {
        let age = now.saturating_sub(record.acquired_at);
        age >= 0 && age as u64 > self.stale_after.as_secs()
    }

    fn is_stale(&self, now: i64) -> bool {
        let Some(record) = read_record(&self.path) else {
            // Unreadable or half-written; only stale if the file itself is old
            return file_age(&self.path).is_some_and(|age| age > self.stale_after);
        };
        self.record_is_stale(&record, now)
    }
}

fn read_record(path: &Path) -> Option<LockRecord> {
    let bytes = std::fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn file_age(path: &Path) -> Option<Duration> {
    std::fs::metadata(path).ok()?.modified().ok()?.elapsed().ok()
}

#[async_trait]
impl RunLock for FileLock {
    async fn try_acquire(&self, timeout: Duration) -> Result<Option<RunGuard>, LockError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.try_create()? {
                tracing::debug!(path = %self.path.display(), "Run lock acquired");
                return Ok(Some(RunGuard {
                    inner: GuardInner::File(self.path.clone()),
                }));
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

// ============================================================================
// In-process Lock
// ============================================================================

/// Lock shared between tasks of one process.
#[derive(Clone, Default)]
pub struct MemoryLock {
    mutex: Arc<Mutex<()>>,
}

impl MemoryLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunLock for MemoryLock {
    async fn try_acquire(&self, timeout: Duration) -> Result<Option<RunGuard>, LockError> {
        match tokio::time::timeout(timeout, self.mutex.clone().lock_owned()).await {
            Ok(guard) => Ok(Some(RunGuard {
                inner: GuardInner::Memory(guard),
            })),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("showwatch_lock_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("run.lock");
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn test_file_lock_acquire_and_release() {
        let path = lock_path("release");
        let lock = FileLock::new(&path);

        let guard = lock.try_acquire(Duration::ZERO).await.unwrap();
        assert!(guard.is_some());
        assert!(path.exists());

        drop(guard);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_lock_contended_returns_none() {
        let path = lock_path("contended");
        let first = FileLock::new(&path);
        let second = FileLock::new(&path);

        let _held = first.try_acquire(Duration::ZERO).await.unwrap().unwrap();
        let attempt = second
            .try_acquire(Duration::from_millis(120))
            .await
            .unwrap();
        assert!(attempt.is_none());
    }

    #[tokio::test]
    async fn test_file_lock_reacquire_after_release() {
        let path = lock_path("reacquire");
        let lock = FileLock::new(&path);

        drop(lock.try_acquire(Duration::ZERO).await.unwrap());
        assert!(lock.try_acquire(Duration::ZERO).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_file_lock_taken_over() {
        let path = lock_path("stale");
        let old = LockRecord {
            pid: 1,
            acquired_at: chrono::Utc::now().timestamp() - 7200,
        };
        std::fs::write(&path, serde_json::to_vec(&old).unwrap()).unwrap();

        let lock = FileLock::new(&path).with_stale_after(Duration::from_secs(3600));
        let guard = lock.try_acquire(Duration::from_millis(200)).await.unwrap();
        assert!(guard.is_some());
    }

    #[tokio::test]
    async fn test_stale_takeover_with_zero_timeout() {
        let path = lock_path("stale_zero");
        let old = LockRecord {
            pid: 1,
            acquired_at: chrono::Utc::now().timestamp() - 7200,
        };
        std::fs::write(&path, serde_json::to_vec(&old).unwrap()).unwrap();

        let lock = FileLock::new(&path).with_stale_after(Duration::from_secs(3600));
        assert!(lock.try_acquire(Duration::ZERO).await.unwrap().is_some());
    }

    #[test]
    fn test_takeover_never_removes_fresh_lock() {
        // A contender that saw the stale file reaches the rename only after
        // another one already replaced it with a fresh lock.
        let path = lock_path("takeover_race");
        let fresh = LockRecord {
            pid: 42,
            acquired_at: chrono::Utc::now().timestamp(),
        };
        let bytes = serde_json::to_vec(&fresh).unwrap();
        std::fs::write(&path, &bytes).unwrap();

        let late = FileLock::new(&path).with_stale_after(Duration::from_secs(3600));
        late.take_over_stale().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        assert!(!late.create_new().unwrap());
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("stale."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_takeover_removes_stale_lock() {
        let path = lock_path("takeover_stale");
        let old = LockRecord {
            pid: 1,
            acquired_at: chrono::Utc::now().timestamp() - 7200,
        };
        std::fs::write(&path, serde_json::to_vec(&old).unwrap()).unwrap();

        let lock = FileLock::new(&path).with_stale_after(Duration::from_secs(3600));
        lock.take_over_stale().unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_fresh_foreign_lock_respected() {
        let path = lock_path("fresh");
        let record = LockRecord {
            pid: 1,
            acquired_at: chrono::Utc::now().timestamp(),
        };
        std::fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();

        let lock = FileLock::new(&path);
        assert!(lock.try_acquire(Duration::ZERO).await.unwrap().is_none());
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_missing_directory_is_io_error() {
        let lock = FileLock::new("/nonexistent-showwatch-dir/run.lock");
        assert!(matches!(
            lock.try_acquire(Duration::ZERO).await,
            Err(LockError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_lock_excludes_second_holder() {
        let lock = MemoryLock::new();
        let held = lock.try_acquire(Duration::ZERO).await.unwrap();
        assert!(held.is_some());

        let other = lock.clone();
        assert!(other
            .try_acquire(Duration::from_millis(10))
            .await
            .unwrap()
            .is_none());

        drop(held);
        assert!(other.try_acquire(Duration::ZERO).await.unwrap().is_some());
    }
}
