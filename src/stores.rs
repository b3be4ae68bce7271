//! The graph and the mirror behind one reader/writer lock.
//!
//! Per-file sync commits take the write side for both stores at once, so a
//! reader holding the read side observes every file either before or after
//! its commit, never in between.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{ArchitectumError, Result};
use crate::graph::GraphStore;
use crate::mirror::MirrorStore;

#[derive(Debug)]
pub struct Stores {
    pub graph: GraphStore,
    pub mirrors: MirrorStore,
}

/// Cloneable handle to [`Stores`].
#[derive(Debug, Clone)]
pub struct SharedStores(Arc<RwLock<Stores>>);

impl SharedStores {
    pub fn new(graph: GraphStore, mirrors: MirrorStore) -> Self {
        SharedStores(Arc::new(RwLock::new(Stores { graph, mirrors })))
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, Stores>> {
        self.0.read().map_err(|_| ArchitectumError::poisoned("stores"))
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Stores>> {
        self.0.write().map_err(|_| ArchitectumError::poisoned("stores"))
    }
}
