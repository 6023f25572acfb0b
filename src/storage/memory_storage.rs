//! In-memory storage for testing

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    core::{
        directory::DirectorySnapshot,
        error::{StorageError, StorageResult},
    },
    storage::DirectoryStorage,
};

#[derive(Debug, Default)]
struct MemoryState {
    snapshot: Option<DirectorySnapshot>,
    saves: usize,
    should_fail_save: bool,
}

/// In-memory directory storage
///
/// Clones share the same state, so a test can keep a handle and reopen a
/// directory from it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure saves to fail
    pub async fn set_save_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_save = should_fail;
    }

    /// Number of successful saves
    pub async fn save_count(&self) -> usize {
        self.inner.lock().await.saves
    }

    /// Last saved snapshot
    pub async fn stored(&self) -> Option<DirectorySnapshot> {
        self.inner.lock().await.snapshot.clone()
    }
}

impl DirectoryStorage for MemoryStorage {
    async fn load(&self) -> StorageResult<Option<DirectorySnapshot>> {
        Ok(self.inner.lock().await.snapshot.clone())
    }

    async fn save(&self, snapshot: &DirectorySnapshot) -> StorageResult<()> {
        let mut state = self.inner.lock().await;
        if state.should_fail_save {
            return Err(StorageError::Unavailable("Mock save failure".into()));
        }
        state.snapshot = Some(snapshot.clone());
        state.saves += 1;
        Ok(())
    }
}
