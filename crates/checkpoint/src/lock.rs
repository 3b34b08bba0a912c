//! OS-level exclusive file locks guarding the checkpoint DB path and the
//! per-scraper `processing.lock` file, per the shared-resource policy: two
//! scraper/replayer instances must never race on `INSERT`.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fd_lock::{RwLock, RwLockWriteGuard};

use crate::error::CheckpointError;

/// Holds an exclusive `flock`-style lock on a file for as long as it lives.
/// The guard borrows the boxed `RwLock` with a lifetime extended to `'static`
/// since both live in the same heap allocation and the guard (declared
/// first, so it drops first) never outlives it.
pub struct FileLock {
    guard: Option<RwLockWriteGuard<'static, File>>,
    lock: Box<RwLock<File>>,
}

/// Acquire an exclusive, non-blocking lock on `path` (created if absent).
/// Returns `Err(LockHeld)` immediately if another process already holds it —
/// callers are expected to abort silently rather than block, per §4.3 step 1
/// ("abort silently if another instance holds it").
pub fn try_acquire(path: impl AsRef<Path>) -> Result<FileLock, CheckpointError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)?;

    let mut lock = Box::new(RwLock::new(file));
    let lock_ref: &'static mut RwLock<File> =
        unsafe { &mut *(lock.as_mut() as *mut RwLock<File>) };
    let guard = lock_ref
        .try_write()
        .map_err(|_| CheckpointError::LockHeld(path.display().to_string()))?;

    Ok(FileLock {
        guard: Some(guard),
        lock,
    })
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Explicit for readability: the guard must go before the box it
        // borrows from, which field declaration order already guarantees.
        self.guard.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_on_same_path_fails_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processing.lock");
        let _first = try_acquire(&path).expect("first lock should succeed");
        assert!(try_acquire(&path).is_err());
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processing.lock");
        {
            let _first = try_acquire(&path).expect("first lock should succeed");
        }
        assert!(try_acquire(&path).is_ok());
    }
}
