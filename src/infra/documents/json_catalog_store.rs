use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::documents::{CatalogError, CatalogStore, NoteMetadata};

/// Notes catalog kept as a pretty-printed JSON array.
pub struct JsonCatalogStore {
    path: PathBuf,
}

impl JsonCatalogStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CatalogStore for JsonCatalogStore {
    async fn load(&self) -> Result<Vec<NoteMetadata>, CatalogError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| CatalogError::Read(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&text).map_err(|e| CatalogError::Read(e.to_string()))
    }

    async fn save(&self, notes: &[NoteMetadata]) -> Result<(), CatalogError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CatalogError::Write(e.to_string()))?;
        }

        let text =
            serde_json::to_string_pretty(notes).map_err(|e| CatalogError::Write(e.to_string()))?;
        fs::write(&self.path, text)
            .await
            .map_err(|e| CatalogError::Write(e.to_string()))
    }
}
