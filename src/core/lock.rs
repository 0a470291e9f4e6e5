//! core::lock
//!
//! Advisory file lock guarding a rule store.
//!
//! # Architecture
//!
//! The store pairs every data file with a dedicated lock file. Writers take
//! an exclusive lock on it, readers a shared one. The OS lock (via `fs2`)
//! coordinates separate processes and blocks until the lock is available.
//!
//! OS advisory locks are not reentrant, and within one process a second
//! descriptor on the same file would simply wait on the first forever. A
//! process-wide registry of held lock paths turns that case into an
//! immediate [`LockError::AlreadyHeld`] instead.
//!
//! # Invariants
//!
//! - At most one [`FileLock`] per canonical lock path exists in a process
//! - Lock is automatically released on drop (RAII pattern)
//! - Acquisition blocks across processes and fails fast within one
//!
//! # Example
//!
//! ```ignore
//! use tunnelrules::core::lock::FileLock;
//!
//! let lock = FileLock::acquire_exclusive(&paths.lock)?;
//!
//! // Write while holding the lock
//! // ...
//!
//! // Lock automatically released when dropped
//! drop(lock);
//! ```

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use fs2::FileExt;
use thiserror::Error;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// This process already holds a lock on the path.
    #[error("lock on {} is already held by this process", .0.display())]
    AlreadyHeld(PathBuf),

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// Lock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many readers may hold the lock at once.
    Shared,
    /// A single writer holds the lock.
    Exclusive,
}

/// Canonical paths of every lock currently held by this process.
fn held_locks() -> MutexGuard<'static, HashSet<PathBuf>> {
    static HELD: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    HELD.get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A held advisory lock on a lock file.
///
/// The lock is automatically released when this guard is dropped (RAII pattern).
/// This ensures the lock is always released, even if the operation panics.
#[derive(Debug)]
pub struct FileLock {
    /// Path to the lock file, as given by the caller.
    path: PathBuf,
    /// Canonical path, the key in the process registry.
    key: PathBuf,
    mode: LockMode,
    /// The open file handle with the lock held.
    /// When this is Some, we hold the lock.
    file: Option<File>,
}

impl FileLock {
    /// Acquire an exclusive lock, blocking until other processes release it.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyHeld`] if this process already holds any lock on `path`
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire_exclusive(path: &Path) -> Result<Self, LockError> {
        Self::acquire(path, LockMode::Exclusive)
    }

    /// Acquire a shared lock, blocking while another process holds it exclusively.
    ///
    /// # Errors
    ///
    /// Same as [`FileLock::acquire_exclusive`].
    pub fn acquire_shared(path: &Path) -> Result<Self, LockError> {
        Self::acquire(path, LockMode::Shared)
    }

    fn acquire(path: &Path, mode: LockMode) -> Result<Self, LockError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LockError::CreateFailed(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        // Open or create the lock file
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        let key = fs::canonicalize(path).map_err(|e| {
            LockError::CreateFailed(format!("cannot resolve {}: {}", path.display(), e))
        })?;

        if !held_locks().insert(key.clone()) {
            return Err(LockError::AlreadyHeld(path.to_path_buf()));
        }

        let locked = match mode {
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
            LockMode::Shared => FileExt::lock_shared(&file),
        };
        if let Err(e) = locked {
            held_locks().remove(&key);
            return Err(LockError::AcquireFailed(e.to_string()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            key,
            mode,
            file: Some(file),
        })
    }

    /// Check if the lock is currently held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the mode this lock was acquired in.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Release the lock explicitly.
    ///
    /// This is called automatically on drop, but can be called early
    /// if you need to release the lock before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            let unlocked = FileExt::unlock(&file);
            held_locks().remove(&self.key);
            unlocked.map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Best-effort release on drop - ignore errors since we're dropping
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
            held_locks().remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn lock_path(temp: &TempDir) -> PathBuf {
        temp.path().join("rules.lock")
    }

    #[test]
    fn exclusive_acquire_succeeds() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp);

        let lock = FileLock::acquire_exclusive(&path).expect("acquire lock");
        assert!(lock.is_held());
        assert_eq!(lock.mode(), LockMode::Exclusive);
        assert!(path.exists());
    }

    #[test]
    fn creates_parent_directory() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("nested").join("dir").join("rules.lock");

        let _lock = FileLock::acquire_shared(&path).expect("acquire lock");
        assert!(path.exists());
    }

    #[test]
    fn second_acquire_in_process_fails_fast() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp);

        let _lock = FileLock::acquire_exclusive(&path).expect("first acquire");

        assert!(matches!(
            FileLock::acquire_exclusive(&path),
            Err(LockError::AlreadyHeld(_))
        ));
        assert!(matches!(
            FileLock::acquire_shared(&path),
            Err(LockError::AlreadyHeld(_))
        ));
    }

    #[test]
    fn shared_locks_are_not_reentrant_either() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp);

        let _lock = FileLock::acquire_shared(&path).expect("first acquire");
        assert!(matches!(
            FileLock::acquire_shared(&path),
            Err(LockError::AlreadyHeld(_))
        ));
    }

    #[test]
    fn registry_uses_canonical_path() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp);
        let dotted = temp.path().join(".").join("rules.lock");

        let _lock = FileLock::acquire_exclusive(&path).expect("acquire");
        assert!(matches!(
            FileLock::acquire_exclusive(&dotted),
            Err(LockError::AlreadyHeld(_))
        ));
    }

    #[test]
    fn other_thread_fails_fast_instead_of_blocking() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp);
        let _lock = FileLock::acquire_exclusive(&path).expect("acquire");

        let (tx, rx) = mpsc::channel();
        let thread_path = path.clone();
        thread::spawn(move || {
            let result = FileLock::acquire_shared(&thread_path);
            tx.send(matches!(result, Err(LockError::AlreadyHeld(_))))
                .expect("send");
        });

        let already_held = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("second acquisition must not block");
        assert!(already_held);
    }

    #[test]
    fn released_on_drop() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp);

        {
            let lock = FileLock::acquire_exclusive(&path).expect("first acquire");
            assert!(lock.is_held());
            // lock dropped here
        }

        let lock = FileLock::acquire_exclusive(&path).expect("second acquire");
        assert!(lock.is_held());
    }

    #[test]
    fn released_explicitly() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp);

        let mut lock = FileLock::acquire_exclusive(&path).expect("acquire");
        lock.release().expect("release");
        assert!(!lock.is_held());

        let again = FileLock::acquire_shared(&path).expect("reacquire");
        assert!(again.is_held());
    }

    #[test]
    fn multiple_release_calls_are_safe() {
        let temp = TempDir::new().expect("create temp dir");
        let path = lock_path(&temp);

        let mut lock = FileLock::acquire_shared(&path).expect("acquire");
        lock.release().expect("first release");
        lock.release().expect("second release should be ok");
        assert!(!lock.is_held());
    }

    #[test]
    fn distinct_paths_lock_independently() {
        let temp = TempDir::new().expect("create temp dir");

        let a = FileLock::acquire_exclusive(&temp.path().join("a.lock")).expect("lock a");
        let b = FileLock::acquire_exclusive(&temp.path().join("b.lock")).expect("lock b");
        assert!(a.is_held() && b.is_held());
    }

    #[test]
    fn unwritable_location_reports_create_failure() {
        let temp = TempDir::new().expect("create temp dir");
        let blocker = temp.path().join("file");
        fs::write(&blocker, b"x").expect("write");

        let result = FileLock::acquire_exclusive(&blocker.join("rules.lock"));
        assert!(matches!(result, Err(LockError::CreateFailed(_))));
    }

    #[test]
    fn error_display_formatting() {
        let err = LockError::AlreadyHeld(PathBuf::from("/tmp/x.lock"));
        assert!(err.to_string().contains("already held"));

        let err = LockError::CreateFailed("test".into());
        assert!(err.to_string().contains("create"));

        let err = LockError::AcquireFailed("test".into());
        assert!(err.to_string().contains("acquire"));

        let err = LockError::ReleaseFailed("test".into());
        assert!(err.to_string().contains("release"));
    }
}
