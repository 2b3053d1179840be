use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct TopicStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Topic {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub author_email: String,
    pub created_at: String,
}

impl TopicStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a topic. Returns the topic ID.
    pub async fn create(
        &self,
        title: &str,
        content: &str,
        user_id: i64,
        author_email: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO topics (title, content, user_id, author_email) VALUES (?, ?, ?, ?)",
        )
        .bind(title)
        .bind(content)
        .bind(user_id)
        .bind(author_email)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Topic>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, title, content, user_id, author_email, created_at FROM topics WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List all topics, newest first.
    pub async fn list(&self) -> Result<Vec<Topic>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, title, content, user_id, author_email, created_at FROM topics ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Author of a topic, `None` if the topic does not exist.
    pub async fn author_id(&self, id: i64) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM topics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    /// Delete a topic and, by cascade, its comments.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM topics WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
