use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::{ChatError, Result};

/// The single critical section shared by every mutating board operation.
pub trait Gate: Send + Sync {
    /// Block until the gate is held. The gate is released when the guard drops.
    fn acquire(&self) -> Result<GateGuard<'_>>;
}

/// Proof that the gate is held.
pub struct GateGuard<'a> {
    inner: GuardInner<'a>,
}

enum GuardInner<'a> {
    File { file: File, path: &'a Path },
    Memory(#[allow(dead_code)] MutexGuard<'a, ()>),
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if let GuardInner::File { file, path } = &self.inner {
            if let Err(e) = FileExt::unlock(file) {
                warn!(path = %path.display(), error = %e, "failed to release board lock");
            } else {
                debug!(path = %path.display(), "board lock released");
            }
        }
    }
}

/// Run `operation` while holding the gate.
///
/// The gate is released on success, on an error result, and while unwinding
/// from a panic. If the gate cannot be acquired `operation` is not invoked.
pub fn with_exclusive_access<T>(
    gate: &dyn Gate,
    operation: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let _guard = gate.acquire()?;
    operation()
}

/// Cross-process gate: an exclusive advisory lock on a dedicated lock file.
#[derive(Debug, Clone)]
pub struct FileGate {
    path: PathBuf,
}

impl FileGate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Gate for FileGate {
    fn acquire(&self) -> Result<GateGuard<'_>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| ChatError::ConcurrencyFailure(format!("{}: {e}", self.path.display())))?;

        // No acquisition timeout: a stuck holder stalls every writer.
        file.lock_exclusive()
            .map_err(|e| ChatError::ConcurrencyFailure(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "board lock acquired");

        Ok(GateGuard {
            inner: GuardInner::File {
                file,
                path: &self.path,
            },
        })
    }
}

/// In-process gate for boards backed by a `MemoryDocumentStore`.
#[derive(Debug, Default)]
pub struct MemoryGate {
    mutex: Mutex<()>,
}

impl MemoryGate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Gate for MemoryGate {
    fn acquire(&self) -> Result<GateGuard<'_>> {
        // The mutex guards no data, so a poisoned lock is still usable.
        let guard = self
            .mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(GateGuard {
            inner: GuardInner::Memory(guard),
        })
    }
}
