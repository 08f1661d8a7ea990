use super::document_models::{DocumentHit, DriveItem};
use crate::core::auth::{AuthError, TokenSource};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Document store error: {0}")]
    Api(String),

    #[error("Failed to retrieve document content: {status} {body}")]
    Download { status: u16, body: String },
}

/// Remote document store (search + raw content download).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn search(&self, access_token: &str, query: &str) -> Result<Vec<DriveItem>, DocumentError>;

    async fn download(&self, access_token: &str, item_id: &str) -> Result<Vec<u8>, DocumentError>;
}

pub struct DocumentService<D: DocumentStore, T: TokenSource> {
    store: D,
    tokens: T,
}

impl<D: DocumentStore, T: TokenSource> DocumentService<D, T> {
    pub fn new(store: D, tokens: T) -> Self {
        Self { store, tokens }
    }

    /// Searches the user's documents. A blank query returns nothing without
    /// touching auth or the network.
    pub async fn search(&self, query: &str) -> Result<Vec<DocumentHit>, DocumentError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let token = self.tokens.access_token().await?;
        let items = self.store.search(&token, query).await?;
        info!(query, hits = items.len(), "Document search finished");
        Ok(items.into_iter().map(DocumentHit::from).collect())
    }

    pub async fn fetch_content(&self, item_id: &str) -> Result<Vec<u8>, DocumentError> {
        let token = self.tokens.access_token().await?;
        let bytes = self.store.download(&token, item_id).await?;
        debug!(item_id, bytes = bytes.len(), "Downloaded document");
        Ok(bytes)
    }

    /// Downloads several documents in order, failing on the first error.
    pub async fn fetch_all(&self, item_ids: &[String]) -> Result<Vec<Vec<u8>>, DocumentError> {
        let mut contents = Vec::with_capacity(item_ids.len());
        for id in item_ids {
            contents.push(self.fetch_content(id).await?);
        }
        Ok(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedToken {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TokenSource for FixedToken {
        async fn access_token(&self) -> Result<String, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("token".to_string())
        }
    }

    struct NeedsSignIn;

    #[async_trait]
    impl TokenSource for NeedsSignIn {
        async fn access_token(&self) -> Result<String, AuthError> {
            Err(AuthError::InteractionRequired {
                verification_uri: "https://example/activate".to_string(),
                user_code: "ABC123".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct MockStore {
        files: DashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl DocumentStore for MockStore {
        async fn search(&self, access_token: &str, query: &str) -> Result<Vec<DriveItem>, DocumentError> {
            assert_eq!(access_token, "token");
            Ok(self
                .files
                .iter()
                .filter(|entry| entry.key().contains(query))
                .map(|entry| DriveItem {
                    id: Some(entry.key().clone()),
                    name: Some(format!("{}.docx", entry.key())),
                    web_url: None,
                })
                .collect())
        }

        async fn download(&self, _access_token: &str, item_id: &str) -> Result<Vec<u8>, DocumentError> {
            self.files
                .get(item_id)
                .map(|bytes| bytes.clone())
                .ok_or_else(|| DocumentError::Download {
                    status: 404,
                    body: "itemNotFound".to_string(),
                })
        }
    }

    fn service() -> (DocumentService<MockStore, FixedToken>, Arc<AtomicUsize>) {
        let store = MockStore::default();
        store.files.insert("spark-notes".to_string(), b"spark".to_vec());
        store.files.insert("rust-notes".to_string(), b"rust".to_vec());
        let calls = Arc::new(AtomicUsize::new(0));
        let tokens = FixedToken {
            calls: calls.clone(),
        };
        (DocumentService::new(store, tokens), calls)
    }

    #[tokio::test]
    async fn test_blank_query_skips_auth() {
        let (service, calls) = service();

        assert!(service.search("   ").await.unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_maps_hits() {
        let (service, _) = service();

        let hits = service.search("spark").await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "spark-notes.docx");
        assert_eq!(hits[0].url, "#");
    }

    #[tokio::test]
    async fn test_fetch_all_stops_at_missing_document() {
        let (service, _) = service();
        let ids = vec!["rust-notes".to_string(), "gone".to_string()];

        let err = service.fetch_all(&ids).await.unwrap_err();
        assert!(matches!(err, DocumentError::Download { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_sign_in_requirement_is_surfaced() {
        let service = DocumentService::new(MockStore::default(), NeedsSignIn);

        let err = service.search("spark").await.unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Auth(AuthError::InteractionRequired { .. })
        ));
    }
}
