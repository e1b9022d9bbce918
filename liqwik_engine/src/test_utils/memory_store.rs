use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    db_types::DocumentType,
    traits::{DocumentStore, DocumentStoreError},
};

/// A [`DocumentStore`] that keeps documents in memory, using the same path layout as the file system store.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    counter: Arc<Mutex<u64>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths = self.files.lock().map(|f| f.keys().cloned().collect::<Vec<_>>()).unwrap_or_default();
        paths.sort();
        paths
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn save(
        &self,
        asset_id: i64,
        doc_type: DocumentType,
        extension: &str,
        data: &[u8],
    ) -> Result<String, DocumentStoreError> {
        let n = {
            let mut counter = self.counter.lock().map_err(|e| DocumentStoreError::WriteFailed(e.to_string()))?;
            *counter += 1;
            *counter
        };
        let path = format!("uploads/assets/{asset_id}/{}_{n}.{extension}", doc_type.file_prefix());
        let mut files = self.files.lock().map_err(|e| DocumentStoreError::WriteFailed(e.to_string()))?;
        files.insert(path.clone(), data.to_vec());
        Ok(path)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, DocumentStoreError> {
        let files = self.files.lock().map_err(|e| DocumentStoreError::ReadFailed(e.to_string()))?;
        files.get(path).cloned().ok_or(DocumentStoreError::NotFound)
    }

    async fn remove(&self, path: &str) -> Result<(), DocumentStoreError> {
        let mut files = self.files.lock().map_err(|e| DocumentStoreError::WriteFailed(e.to_string()))?;
        files.remove(path);
        Ok(())
    }
}
