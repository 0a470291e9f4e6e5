//! core::store
//!
//! Crash-consistent, lock-guarded persistence of a single value.
//!
//! # Architecture
//!
//! A [`LockedStore`] owns three paths ([`StorePaths`]):
//!
//! - `lock` - dedicated advisory lock file
//! - `temp` - scratch file for the write in progress
//! - `target` - the last fully committed value
//!
//! The value type is opaque to the store. Callers supply an encoder, a
//! decoder and a default-value provider, so the write discipline is the
//! same for every document shape.
//!
//! # Write discipline
//!
//! 1. Take the exclusive lock (fail fast if this process already holds it)
//! 2. Encode, write the temp file, `sync_all`
//! 3. Rename temp over target, then sync the target's directory
//! 4. Remove any leftover temp file
//! 5. Release the lock on every exit path (RAII)
//!
//! Readers take the shared lock and read the target only.
//!
//! # Invariants
//!
//! - `target`, whenever it exists, holds a complete previously-saved value
//! - [`LockedStore::save`] and [`LockedStore::load`] never return errors;
//!   failures are logged and degrade to "unchanged" and "default" respectively
//!
//! # Example
//!
//! ```
//! use tunnelrules::core::store::{LockedStore, StorePaths};
//! use tempfile::TempDir;
//!
//! let dir = TempDir::new().unwrap();
//! let store: LockedStore<Vec<String>> = LockedStore::json(StorePaths::in_dir(dir.path(), "names"));
//!
//! assert!(store.load().is_empty());
//! assert!(store.save(&vec!["a".to_string()]).is_committed());
//! assert_eq!(store.load(), vec!["a".to_string()]);
//! ```

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::lock::{FileLock, LockError};

/// Errors from encode/decode strategies.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("cannot encode value: {0}")]
    Encode(String),

    #[error("cannot decode value: {0}")]
    Decode(String),
}

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The lock could not be taken (includes in-process contention).
    #[error(transparent)]
    Lock(#[from] LockError),

    /// A filesystem operation failed.
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    /// The value could not be encoded or the stored bytes decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl StoreError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// True if this is the in-process double-acquisition case.
    pub fn is_lock_contention(&self) -> bool {
        matches!(self, StoreError::Lock(LockError::AlreadyHeld(_)))
    }
}

/// Result of a [`LockedStore::save`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum SaveOutcome {
    /// The target now holds the new value.
    Committed,
    /// Nothing changed; the reason was logged.
    Skipped,
}

impl SaveOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, SaveOutcome::Committed)
    }
}

/// The lock, temp and target paths for one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub lock: PathBuf,
    pub temp: PathBuf,
    pub target: PathBuf,
}

impl StorePaths {
    /// Create paths from explicit locations.
    pub fn new(lock: impl Into<PathBuf>, temp: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            lock: lock.into(),
            temp: temp.into(),
            target: target.into(),
        }
    }

    /// Derive all three paths from a directory and a base name:
    /// `<stem>.lock`, `<stem>_temp.json`, `<stem>.json`.
    pub fn in_dir(dir: &Path, stem: &str) -> Self {
        Self::new(
            dir.join(format!("{}.lock", stem)),
            dir.join(format!("{}_temp.json", stem)),
            dir.join(format!("{}.json", stem)),
        )
    }
}

type EncodeFn<T> = Box<dyn Fn(&T) -> Result<Vec<u8>, CodecError> + Send + Sync>;
type DecodeFn<T> = Box<dyn Fn(&[u8]) -> Result<T, CodecError> + Send + Sync>;
type DefaultFn<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Atomic, lock-guarded persistence of one value of type `T`.
pub struct LockedStore<T> {
    paths: StorePaths,
    encode: EncodeFn<T>,
    decode: DecodeFn<T>,
    default_value: DefaultFn<T>,
}

impl<T> fmt::Debug for LockedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedStore")
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl<T> LockedStore<T> {
    /// Create a store with caller-supplied codec and default provider.
    pub fn new<E, D, F>(paths: StorePaths, encode: E, decode: D, default_value: F) -> Self
    where
        E: Fn(&T) -> Result<Vec<u8>, CodecError> + Send + Sync + 'static,
        D: Fn(&[u8]) -> Result<T, CodecError> + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            paths,
            encode: Box::new(encode),
            decode: Box::new(decode),
            default_value: Box::new(default_value),
        }
    }

    /// Get the store's paths.
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// The value returned when nothing usable is stored.
    pub fn default_value(&self) -> T {
        (self.default_value)()
    }

    /// Persist `value`, replacing the previous one atomically.
    ///
    /// Never fails: on any error the target is left untouched, the error
    /// is logged and [`SaveOutcome::Skipped`] is returned.
    pub fn save(&self, value: &T) -> SaveOutcome {
        match self.try_save(value) {
            Ok(()) => SaveOutcome::Committed,
            Err(e) if e.is_lock_contention() => {
                error!(path = %self.paths.lock.display(), "save skipped: {}", e);
                SaveOutcome::Skipped
            }
            Err(e) => {
                error!(path = %self.paths.target.display(), "failed to save: {}", e);
                SaveOutcome::Skipped
            }
        }
    }

    /// Load the stored value.
    ///
    /// Never fails: a missing target, a lock that cannot be taken, an I/O
    /// error or undecodable content all yield [`LockedStore::default_value`].
    pub fn load(&self) -> T {
        match self.try_load() {
            Ok(Some(value)) => value,
            Ok(None) => self.default_value(),
            Err(e) => {
                warn!(path = %self.paths.target.display(), "using default value: {}", e);
                self.default_value()
            }
        }
    }

    /// Persist `value`, reporting why it failed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Lock`] if the exclusive lock cannot be taken
    /// - [`StoreError::Codec`] if `value` cannot be encoded
    /// - [`StoreError::Io`] if writing, syncing or renaming fails
    pub fn try_save(&self, value: &T) -> Result<(), StoreError> {
        let _lock = FileLock::acquire_exclusive(&self.paths.lock)?;

        let result = self.write_and_replace(value);

        // Covers both the success path (rename consumed it) and
        // a failure before the rename.
        if self.paths.temp.exists() {
            if let Err(e) = fs::remove_file(&self.paths.temp) {
                warn!(path = %self.paths.temp.display(), "cannot remove temp file: {}", e);
            }
        }

        if result.is_ok() {
            debug!(path = %self.paths.target.display(), "value committed");
        }
        result
    }

    fn write_and_replace(&self, value: &T) -> Result<(), StoreError> {
        let bytes = (self.encode)(value)?;
        let temp = &self.paths.temp;

        if let Some(parent) = temp.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io("cannot create", parent, e))?;
        }

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(temp)
                .map_err(|e| StoreError::io("cannot create", temp, e))?;

            file.write_all(&bytes)
                .map_err(|e| StoreError::io("cannot write", temp, e))?;

            // Sync to disk before the rename makes it visible
            file.sync_all()
                .map_err(|e| StoreError::io("cannot sync", temp, e))?;
        }

        let target = &self.paths.target;
        fs::rename(temp, target).map_err(|e| StoreError::io("cannot replace", target, e))?;

        // The value is committed once renamed; a failed directory sync
        // only weakens durability across power loss.
        if let Some(dir) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = sync_dir(dir) {
                warn!(path = %dir.display(), "cannot sync directory: {}", e);
            }
        }
        Ok(())
    }

    /// Load the stored value, reporting why it failed.
    ///
    /// Returns `Ok(None)` if nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Lock`] if the shared lock cannot be taken
    /// - [`StoreError::Io`] if the target exists but cannot be read
    /// - [`StoreError::Codec`] if the content cannot be decoded
    pub fn try_load(&self) -> Result<Option<T>, StoreError> {
        let _lock = FileLock::acquire_shared(&self.paths.lock)?;

        let target = &self.paths.target;
        if !target.exists() {
            return Ok(None);
        }

        let bytes = fs::read(target).map_err(|e| StoreError::io("cannot read", target, e))?;
        let value = (self.decode)(&bytes)?;
        Ok(Some(value))
    }
}

impl<T> LockedStore<T>
where
    T: Serialize + DeserializeOwned + Default + 'static,
{
    /// A store that encodes `T` as JSON and defaults to `T::default()`.
    pub fn json(paths: StorePaths) -> Self {
        Self::new(
            paths,
            |value: &T| serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string())),
            |bytes: &[u8]| {
                serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
            },
            T::default,
        )
    }
}

/// Flush a directory entry update (such as a rename) to stable storage.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
