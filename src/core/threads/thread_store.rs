use super::thread_models::{ConversationTurn, Thread};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error("Thread not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Stores a new thread and returns its id.
    async fn create(&self, turns: Vec<ConversationTurn>) -> Result<String, ThreadError>;
    async fn get(&self, id: &str) -> Result<Option<Thread>, ThreadError>;
    async fn append(&self, id: &str, turn: ConversationTurn) -> Result<(), ThreadError>;
    async fn replace(&self, id: &str, turns: Vec<ConversationTurn>) -> Result<(), ThreadError>;
    async fn delete(&self, id: &str) -> Result<(), ThreadError>;
    /// All threads, most recently updated first.
    async fn list(&self) -> Result<Vec<Thread>, ThreadError>;
}

#[async_trait]
impl ThreadStore for Box<dyn ThreadStore> {
    async fn create(&self, turns: Vec<ConversationTurn>) -> Result<String, ThreadError> {
        (**self).create(turns).await
    }

    async fn get(&self, id: &str) -> Result<Option<Thread>, ThreadError> {
        (**self).get(id).await
    }

    async fn append(&self, id: &str, turn: ConversationTurn) -> Result<(), ThreadError> {
        (**self).append(id, turn).await
    }

    async fn replace(&self, id: &str, turns: Vec<ConversationTurn>) -> Result<(), ThreadError> {
        (**self).replace(id, turns).await
    }

    async fn delete(&self, id: &str) -> Result<(), ThreadError> {
        (**self).delete(id).await
    }

    async fn list(&self) -> Result<Vec<Thread>, ThreadError> {
        (**self).list().await
    }
}
