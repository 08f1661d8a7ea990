// In-memory thread store, for tests and for runs without a database.

use crate::core::threads::thread_models::new_thread_id;
use crate::core::threads::{ConversationTurn, Thread, ThreadError, ThreadStore};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

#[derive(Default)]
pub struct InMemoryThreadStore {
    threads: DashMap<String, Thread>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn create(&self, turns: Vec<ConversationTurn>) -> Result<String, ThreadError> {
        let id = new_thread_id();
        let now = Utc::now();
        self.threads.insert(
            id.clone(),
            Thread {
                id: id.clone(),
                turns,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Thread>, ThreadError> {
        Ok(self.threads.get(id).map(|entry| entry.value().clone()))
    }

    async fn append(&self, id: &str, turn: ConversationTurn) -> Result<(), ThreadError> {
        let mut thread = self
            .threads
            .get_mut(id)
            .ok_or_else(|| ThreadError::NotFound(id.to_string()))?;
        thread.turns.push(turn);
        thread.updated_at = Utc::now();
        Ok(())
    }

    async fn replace(&self, id: &str, turns: Vec<ConversationTurn>) -> Result<(), ThreadError> {
        let mut thread = self
            .threads
            .get_mut(id)
            .ok_or_else(|| ThreadError::NotFound(id.to_string()))?;
        thread.turns = turns;
        thread.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ThreadError> {
        self.threads.remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Thread>, ThreadError> {
        let mut threads: Vec<Thread> = self
            .threads
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_updates_timestamp() {
        let store = InMemoryThreadStore::new();
        let id = store.create(vec![ConversationTurn::new("hi", "hello")]).await.unwrap();
        let before = store.get(&id).await.unwrap().unwrap().updated_at;

        store.append(&id, ConversationTurn::new("bye", "goodbye")).await.unwrap();

        let thread = store.get(&id).await.unwrap().unwrap();
        assert_eq!(thread.turns.len(), 2);
        assert!(thread.updated_at >= before);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryThreadStore::new();
        let id = store.create(Vec::new()).await.unwrap();

        store.delete(&id).await.unwrap();
        store.delete(&id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
