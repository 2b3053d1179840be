use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub topic_id: i64,
    pub user_id: i64,
    pub author_email: String,
    pub content: String,
    pub created_at: String,
}

impl CommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        topic_id: i64,
        user_id: i64,
        author_email: &str,
        content: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO comments (topic_id, user_id, author_email, content) VALUES (?, ?, ?, ?)",
        )
        .bind(topic_id)
        .bind(user_id)
        .bind(author_email)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Comments of a topic in posting order.
    pub async fn list_by_topic(&self, topic_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, topic_id, user_id, author_email, content, created_at FROM comments
             WHERE topic_id = ? ORDER BY id",
        )
        .bind(topic_id)
        .fetch_all(&self.pool)
        .await
    }

    /// A comment, only if it belongs to `topic_id`.
    pub async fn get(&self, id: i64, topic_id: i64) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, topic_id, user_id, author_email, content, created_at FROM comments
             WHERE id = ? AND topic_id = ?",
        )
        .bind(id)
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Author of a comment within a topic, `None` if there is no such comment.
    pub async fn author_id(&self, id: i64, topic_id: i64) -> Result<Option<i64>, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT user_id FROM comments WHERE id = ? AND topic_id = ?")
                .bind(id)
                .bind(topic_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(user_id,)| user_id))
    }

    pub async fn delete(&self, id: i64, topic_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ? AND topic_id = ?")
            .bind(id)
            .bind(topic_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
