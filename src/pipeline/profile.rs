//! Exclusive converter profile directories.
//!
//! An office-suite process locks and rewrites its user profile while it
//! runs, so two concurrent invocations must never share one. The pool holds
//! exactly one directory per worker and hands each in-flight conversion an
//! exclusive [`ProfileLease`]; the directory returns to the pool when the
//! lease is dropped. With `workers` leases and at most `workers` conversions
//! in flight, acquiring never waits in practice, but exclusivity holds even
//! if a caller drives more futures than that.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A fixed set of profile directories, leased one at a time.
#[derive(Debug)]
pub struct ProfilePool {
    free: Mutex<Vec<(usize, PathBuf)>>,
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// Exclusive use of one profile directory until dropped.
#[derive(Debug)]
pub struct ProfileLease {
    pool: Arc<ProfilePool>,
    slot: usize,
    dir: PathBuf,
    _permit: OwnedSemaphorePermit,
}

impl ProfilePool {
    /// Pool over `dirs`; slot ids are their positions.
    pub fn new(dirs: Vec<PathBuf>) -> Arc<Self> {
        let n = dirs.len();
        // Popped from the back, so reverse to hand out slot 0 first.
        let free = dirs.into_iter().enumerate().rev().collect();
        Arc::new(Self {
            free: Mutex::new(free),
            permits: Arc::new(Semaphore::new(n)),
            capacity: n,
        })
    }

    /// Wait for a free profile and take it.
    ///
    /// Returns `None` for a pool built without directories.
    pub async fn acquire(self: &Arc<Self>) -> Option<ProfileLease> {
        if self.capacity == 0 {
            return None;
        }
        let permit = Arc::clone(&self.permits).acquire_owned().await.ok()?;
        let (slot, dir) = self.free.lock().ok()?.pop()?;
        Some(ProfileLease {
            pool: Arc::clone(self),
            slot,
            dir,
            _permit: permit,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl ProfileLease {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for ProfileLease {
    fn drop(&mut self) {
        if let Ok(mut free) = self.pool.free.lock() {
            free.push((self.slot, std::mem::take(&mut self.dir)));
        }
        // `_permit` is released after the directory is back in the pool.
    }
}
