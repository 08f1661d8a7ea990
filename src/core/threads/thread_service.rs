use super::thread_models::{ConversationTurn, Thread};
use super::thread_store::{ThreadError, ThreadStore};
use tracing::debug;

pub struct ThreadService<S: ThreadStore> {
    store: S,
}

impl<S: ThreadStore> ThreadService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Records a turn, creating the thread on the first one.
    /// Returns the id of the thread the turn was written to.
    pub async fn record(
        &self,
        thread_id: Option<&str>,
        turn: ConversationTurn,
    ) -> Result<String, ThreadError> {
        match thread_id {
            Some(id) => {
                self.store.append(id, turn).await?;
                Ok(id.to_string())
            }
            None => {
                let id = self.store.create(vec![turn]).await?;
                debug!(thread_id = %id, "Started conversation thread");
                Ok(id)
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<Thread, ThreadError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ThreadError::NotFound(id.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Thread>, ThreadError> {
        self.store.list().await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ThreadError> {
        // Ensure it exists first
        if self.store.get(id).await?.is_none() {
            return Err(ThreadError::NotFound(id.to_string()));
        }
        self.store.delete(id).await
    }
}
