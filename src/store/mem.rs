//! In-memory store backed by DashMap. All data is lost on process exit.

use dashmap::DashMap;

use super::{Durable, StoreResult};

#[derive(Debug, Default)]
pub struct MemStore {
    data: DashMap<Vec<u8>, Vec<u8>>,
    /// Serializes batch commits so readers never see half a batch.
    commit_lock: std::sync::Mutex<()>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Durable for MemStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).map(|v| v.value().clone()))
    }

    fn commit(&self, batch: &[(&[u8], &[u8])]) -> StoreResult<()> {
        let _guard = self
            .commit_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (key, value) in batch {
            self.data.insert(key.to_vec(), value.to_vec());
        }
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
