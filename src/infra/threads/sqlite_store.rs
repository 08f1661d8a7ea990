use crate::core::threads::{ConversationTurn, Thread, ThreadError, ThreadStore};
use crate::core::threads::thread_models::new_thread_id;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

/// Conversation threads, one row per thread with the turns as a JSON array.
pub struct SqliteThreadStore {
    pool: Pool<Sqlite>,
}

impl SqliteThreadStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:");

        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !in_memory && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        // Every connection to ":memory:" is its own database.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&conn_str)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS threads (
                id TEXT PRIMARY KEY,
                turns TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn write_turns(&self, id: &str, turns: &[ConversationTurn]) -> Result<(), ThreadError> {
        let result = sqlx::query("UPDATE threads SET turns = ?, updated_at = ? WHERE id = ?")
            .bind(encode_turns(turns)?)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(ThreadError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn storage(e: impl std::fmt::Display) -> ThreadError {
    ThreadError::Storage(e.to_string())
}

fn encode_turns(turns: &[ConversationTurn]) -> Result<String, ThreadError> {
    serde_json::to_string(turns).map_err(storage)
}

fn row_to_thread(row: &SqliteRow) -> Result<Thread, ThreadError> {
    let turns: String = row.try_get("turns").map_err(storage)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(storage)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(storage)?;

    Ok(Thread {
        id: row.try_get("id").map_err(storage)?,
        turns: serde_json::from_str(&turns).map_err(storage)?,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl ThreadStore for SqliteThreadStore {
    async fn create(&self, turns: Vec<ConversationTurn>) -> Result<String, ThreadError> {
        let id = new_thread_id();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO threads (id, turns, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(encode_turns(&turns)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Thread>, ThreadError> {
        let row = sqlx::query("SELECT * FROM threads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(row_to_thread).transpose()
    }

    async fn append(&self, id: &str, turn: ConversationTurn) -> Result<(), ThreadError> {
        let mut thread = self
            .get(id)
            .await?
            .ok_or_else(|| ThreadError::NotFound(id.to_string()))?;
        thread.turns.push(turn);
        self.write_turns(id, &thread.turns).await
    }

    async fn replace(&self, id: &str, turns: Vec<ConversationTurn>) -> Result<(), ThreadError> {
        self.write_turns(id, &turns).await
    }

    async fn delete(&self, id: &str) -> Result<(), ThreadError> {
        sqlx::query("DELETE FROM threads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Thread>, ThreadError> {
        let rows = sqlx::query("SELECT * FROM threads ORDER BY updated_at DESC, id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.iter().map(row_to_thread).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::threads::ThreadService;
    use std::time::Duration;

    async fn store() -> SqliteThreadStore {
        SqliteThreadStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_get_append() {
        let store = store().await;

        let id = store
            .create(vec![ConversationTurn::new("Hello", "Hi there.")])
            .await
            .unwrap();
        store
            .append(&id, ConversationTurn::new("I feel tired", "Why do you feel tired?"))
            .await
            .unwrap();

        let thread = store.get(&id).await.unwrap().unwrap();
        assert_eq!(thread.id, id);
        assert_eq!(thread.turns.len(), 2);
        assert_eq!(thread.turns[1].bot, "Why do you feel tired?");
        assert!(thread.updated_at >= thread.created_at);
    }

    #[tokio::test]
    async fn test_missing_thread() {
        let store = store().await;

        assert!(store.get("0123456789abcdef01234567").await.unwrap().is_none());
        assert!(matches!(
            store.append("missing", ConversationTurn::new("a", "b")).await,
            Err(ThreadError::NotFound(_))
        ));
        assert!(matches!(
            store.replace("missing", Vec::new()).await,
            Err(ThreadError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_and_delete() {
        let store = store().await;
        let id = store
            .create(vec![ConversationTurn::new("a", "b")])
            .await
            .unwrap();

        store
            .replace(&id, vec![ConversationTurn::new("c", "d"), ConversationTurn::new("e", "f")])
            .await
            .unwrap();
        assert_eq!(store.get(&id).await.unwrap().unwrap().turns[0].user, "c");

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first() {
        let service = ThreadService::new(store().await);

        let older = service
            .record(None, ConversationTurn::new("one", "1"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let newer = service
            .record(None, ConversationTurn::new("two", "2"))
            .await
            .unwrap();

        let ids: Vec<String> = service.list().await.unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![newer.clone(), older.clone()]);

        tokio::time::sleep(Duration::from_millis(10)).await;
        service
            .record(Some(&older), ConversationTurn::new("again", "3"))
            .await
            .unwrap();

        let ids: Vec<String> = service.list().await.unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![older, newer]);
    }
}
