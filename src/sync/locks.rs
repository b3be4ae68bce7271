//! Advisory path locks and cooperative cancellation.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use tracing::debug;

use crate::error::{ArchitectumError, Result};

/// Set of paths currently owned by running syncs.
///
/// A sync acquires every path it may touch in one step, so two syncs over
/// overlapping path sets serialize while disjoint ones run side by side.
#[derive(Debug, Default)]
pub struct PathLockTable {
    held: Mutex<HashSet<String>>,
    released: Condvar,
    /// Acquirers currently blocked on an overlapping set.
    waiting: AtomicUsize,
}

impl PathLockTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Block until none of `paths` is held, then hold all of them.
    pub fn acquire<I>(self: &Arc<Self>, paths: I) -> Result<PathLockGuard>
    where
        I: IntoIterator<Item = String>,
    {
        let wanted: BTreeSet<String> = paths.into_iter().collect();
        let mut held = self
            .held
            .lock()
            .map_err(|_| ArchitectumError::poisoned("path locks"))?;
        let mut blocked = false;
        while wanted.iter().any(|path| held.contains(path)) {
            if !blocked {
                debug!(paths = wanted.len(), "waiting for overlapping sync");
                self.waiting.fetch_add(1, Ordering::SeqCst);
                blocked = true;
            }
            held = match self.released.wait(held) {
                Ok(held) => held,
                Err(_) => {
                    self.waiting.fetch_sub(1, Ordering::SeqCst);
                    return Err(ArchitectumError::poisoned("path locks"));
                }
            };
        }
        if blocked {
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
        held.extend(wanted.iter().cloned());
        Ok(PathLockGuard {
            table: Arc::clone(self),
            paths: wanted.into_iter().collect(),
        })
    }

    /// Like [`acquire`](Self::acquire) but returns `None` instead of waiting.
    pub fn try_acquire<I>(self: &Arc<Self>, paths: I) -> Result<Option<PathLockGuard>>
    where
        I: IntoIterator<Item = String>,
    {
        let wanted: BTreeSet<String> = paths.into_iter().collect();
        let mut held = self
            .held
            .lock()
            .map_err(|_| ArchitectumError::poisoned("path locks"))?;
        if wanted.iter().any(|path| held.contains(path)) {
            return Ok(None);
        }
        held.extend(wanted.iter().cloned());
        Ok(Some(PathLockGuard {
            table: Arc::clone(self),
            paths: wanted.into_iter().collect(),
        }))
    }

    /// Number of acquirers blocked right now.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn is_locked(&self, path: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(path))
            .unwrap_or(false)
    }
}

/// Releases its paths on drop.
#[derive(Debug)]
pub struct PathLockGuard {
    table: Arc<PathLockTable>,
    paths: Vec<String>,
}

impl PathLockGuard {
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

impl Drop for PathLockGuard {
    fn drop(&mut self) {
        let mut held = self
            .table
            .held
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for path in &self.paths {
            held.remove(path);
        }
        drop(held);
        self.table.released.notify_all();
    }
}

/// Cloneable cancellation flag checked between per-file units.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Underlying flag, for signal handlers.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn paths(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_disjoint_sets_do_not_block() {
        let table = PathLockTable::new();
        let first = table.acquire(paths(&["a.py", "b.py"])).unwrap();
        let second = table.try_acquire(paths(&["c.py"])).unwrap();
        assert!(second.is_some());
        assert!(table.try_acquire(paths(&["b.py", "d.py"])).unwrap().is_none());
        assert_eq!(first.paths(), &["a.py".to_string(), "b.py".to_string()]);
    }

    #[test]
    fn test_release_on_drop_wakes_waiter() {
        let table = PathLockTable::new();
        let guard = table.acquire(paths(&["a.py"])).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter_table = Arc::clone(&table);
        let waiter = thread::spawn(move || {
            let _guard = waiter_table.acquire(paths(&["a.py"])).unwrap();
            tx.send(()).unwrap();
        });

        while table.waiting() == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(rx.try_recv().is_err());
        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
        assert!(!table.is_locked("a.py"));
        assert_eq!(table.waiting(), 0);
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(token.flag().load(Ordering::SeqCst));
    }
}
