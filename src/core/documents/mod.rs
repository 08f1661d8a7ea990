pub mod catalog;
pub mod document_models;
pub mod document_service;

pub use catalog::{CatalogError, CatalogService, CatalogStore};
pub use document_models::{DocumentHit, DriveItem, NoteMetadata};
pub use document_service::{DocumentError, DocumentService, DocumentStore};
