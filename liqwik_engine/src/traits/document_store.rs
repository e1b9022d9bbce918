use thiserror::Error;

use crate::db_types::DocumentType;

#[derive(Debug, Clone, Error)]
pub enum DocumentStoreError {
    #[error("Could not store document: {0}")]
    WriteFailed(String),
    #[error("Document not found")]
    NotFound,
    #[error("Could not read document: {0}")]
    ReadFailed(String),
}

/// Storage for the documents attached to assets.
///
/// Stores hand out a path for every saved document. The path is what gets recorded on the asset, and it is the only
/// handle used to read or remove the document later.
#[allow(async_fn_in_trait)]
pub trait DocumentStore: Clone {
    /// Saves `data` for the given asset and returns the path it was stored under. `extension` has no leading dot.
    async fn save(
        &self,
        asset_id: i64,
        doc_type: DocumentType,
        extension: &str,
        data: &[u8],
    ) -> Result<String, DocumentStoreError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, DocumentStoreError>;

    async fn remove(&self, path: &str) -> Result<(), DocumentStoreError>;
}
