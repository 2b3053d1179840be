//! Client applications and their signing secrets.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct AppStore {
    pool: SqlitePool,
}

/// A client application. Its secret signs every token issued for it.
#[derive(Clone, sqlx::FromRow)]
pub struct App {
    pub id: i32,
    pub name: String,
    pub secret: String,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl AppStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register an application with an explicit ID.
    pub async fn create(&self, id: i32, name: &str, secret: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO apps (id, name, secret) VALUES (?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(secret)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: i32) -> Result<Option<App>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, secret FROM apps WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// IDs of all registered applications.
    pub async fn list_ids(&self) -> Result<Vec<i32>, sqlx::Error> {
        let rows: Vec<(i32,)> = sqlx::query_as("SELECT id FROM apps ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
