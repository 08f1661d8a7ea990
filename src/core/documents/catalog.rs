// Notes catalog - a local list of known notes (id, name, link).
//
// The catalog only stores metadata. Document bytes are always fetched from the
// document store on demand.

use super::document_models::{DocumentHit, NoteMetadata};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read notes catalog: {0}")]
    Read(String),

    #[error("Failed to write notes catalog: {0}")]
    Write(String),
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns an empty list when no catalog has been saved yet.
    async fn load(&self) -> Result<Vec<NoteMetadata>, CatalogError>;

    async fn save(&self, notes: &[NoteMetadata]) -> Result<(), CatalogError>;
}

pub struct CatalogService<C: CatalogStore> {
    store: C,
}

impl<C: CatalogStore> CatalogService<C> {
    pub fn new(store: C) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<NoteMetadata>, CatalogError> {
        self.store.load().await
    }

    /// Adds a note unless one with the same id is already cataloged.
    /// Returns whether the catalog changed.
    pub async fn append_if_missing(&self, note: NoteMetadata) -> Result<bool, CatalogError> {
        let mut notes = self.store.load().await?;
        if notes.iter().any(|n| n.id == note.id) {
            return Ok(false);
        }
        notes.push(note);
        self.store.save(&notes).await?;
        Ok(true)
    }

    /// Overwrites the catalog with the given search hits. Returns how many were kept.
    pub async fn replace_with_hits(&self, hits: &[DocumentHit]) -> Result<usize, CatalogError> {
        let notes: Vec<NoteMetadata> = hits.iter().filter_map(NoteMetadata::from_hit).collect();
        self.store.save(&notes).await?;
        info!(notes = notes.len(), "Notes catalog replaced");
        Ok(notes.len())
    }
}
