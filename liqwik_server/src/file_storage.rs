//! Asset documents on the local filesystem.
//!
//! Files live at `{upload_dir}/assets/{assetId}/{fileType}_{unix millis}.{ext}`. The path handed back to the engine
//! (and recorded on the asset) starts at the upload directory's own name, e.g. `uploads/assets/3/invoice_17..pdf`, so
//! it is resolved against the upload directory's parent.
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use liqwik_engine::{
    db_types::DocumentType,
    traits::{DocumentStore, DocumentStoreError},
};
use log::*;
use tokio::fs;

#[derive(Clone, Debug)]
pub struct FileDocumentStore {
    base: PathBuf,
    root_name: String,
}

impl FileDocumentStore {
    pub fn new<P: AsRef<Path>>(upload_dir: P) -> Self {
        let upload_dir = upload_dir.as_ref();
        let root_name =
            upload_dir.file_name().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "uploads".to_string());
        let base = upload_dir.parent().map(Path::to_path_buf).unwrap_or_default();
        Self { base, root_name }
    }

    /// Maps a stored path onto the filesystem. Paths that could escape the upload directory are refused.
    fn resolve(&self, path: &str) -> Result<PathBuf, DocumentStoreError> {
        let relative = Path::new(path);
        let mut components = relative.components();
        let inside_root = matches!(components.next(), Some(Component::Normal(c)) if c == self.root_name.as_str());
        let clean = components.all(|c| matches!(c, Component::Normal(_)));
        if !inside_root || !clean {
            warn!("🗂️ Refusing to resolve document path {path}");
            return Err(DocumentStoreError::NotFound);
        }
        Ok(self.base.join(relative))
    }
}

impl DocumentStore for FileDocumentStore {
    async fn save(
        &self,
        asset_id: i64,
        doc_type: DocumentType,
        extension: &str,
        data: &[u8],
    ) -> Result<String, DocumentStoreError> {
        let file_name = format!("{}_{}.{extension}", doc_type.file_prefix(), Utc::now().timestamp_millis());
        let path = format!("{}/assets/{asset_id}/{file_name}", self.root_name);
        let full_path = self.base.join(&path);
        if let Some(dir) = full_path.parent() {
            fs::create_dir_all(dir).await.map_err(|e| DocumentStoreError::WriteFailed(e.to_string()))?;
        }
        fs::write(&full_path, data).await.map_err(|e| DocumentStoreError::WriteFailed(e.to_string()))?;
        debug!("🗂️ Stored {} bytes at {}", data.len(), full_path.display());
        Ok(path)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, DocumentStoreError> {
        let full_path = self.resolve(path)?;
        fs::read(&full_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DocumentStoreError::NotFound,
            _ => DocumentStoreError::ReadFailed(e.to_string()),
        })
    }

    async fn remove(&self, path: &str) -> Result<(), DocumentStoreError> {
        let full_path = self.resolve(path)?;
        fs::remove_file(&full_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DocumentStoreError::NotFound,
            _ => DocumentStoreError::WriteFailed(e.to_string()),
        })?;
        debug!("🗂️ Removed {}", full_path.display());
        Ok(())
    }
}
