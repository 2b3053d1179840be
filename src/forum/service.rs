use tracing::{error, info};

use super::authz::authorize_delete;
use super::error::ForumError;
use crate::db::{Comment, Database, Topic};
use crate::gateway::IdentityGateway;
use crate::identity::AuthenticatedUser;

/// Topics and comments, with deletes guarded by ownership or admin rights.
#[derive(Clone)]
pub struct ForumService {
    db: Database,
    gateway: IdentityGateway,
}

fn storage(op: &str, e: sqlx::Error) -> ForumError {
    error!("Failed to {}: {}", op, e);
    ForumError::Internal(format!("failed to {}", op))
}

impl ForumService {
    pub fn new(db: Database, gateway: IdentityGateway) -> Self {
        Self { db, gateway }
    }

    pub async fn create_topic(
        &self,
        title: &str,
        content: &str,
        author: &AuthenticatedUser,
    ) -> Result<i64, ForumError> {
        if title.trim().is_empty() || content.trim().is_empty() {
            return Err(ForumError::Validation("title or content is empty"));
        }

        let id = self
            .db
            .topics()
            .create(title, content, author.user_id, &author.email)
            .await
            .map_err(|e| storage("create topic", e))?;

        info!(topic_id = id, user_id = author.user_id, "Topic created");
        Ok(id)
    }

    pub async fn list_topics(&self) -> Result<Vec<Topic>, ForumError> {
        self.db
            .topics()
            .list()
            .await
            .map_err(|e| storage("list topics", e))
    }

    pub async fn topic(&self, id: i64) -> Result<Topic, ForumError> {
        self.db
            .topics()
            .get(id)
            .await
            .map_err(|e| storage("get topic", e))?
            .ok_or(ForumError::NotFound("topic"))
    }

    pub async fn delete_topic(&self, id: i64, caller_id: i64) -> Result<(), ForumError> {
        let author = self.db.topics().author_id(id).await;
        authorize_delete(&self.gateway, "topic", author, caller_id).await?;

        if !self
            .db
            .topics()
            .delete(id)
            .await
            .map_err(|e| storage("delete topic", e))?
        {
            return Err(ForumError::NotFound("topic"));
        }

        info!(topic_id = id, user_id = caller_id, "Topic deleted");
        Ok(())
    }

    pub async fn create_comment(
        &self,
        topic_id: i64,
        content: &str,
        author: &AuthenticatedUser,
    ) -> Result<i64, ForumError> {
        if content.trim().is_empty() {
            return Err(ForumError::Validation("content is empty"));
        }
        self.topic(topic_id).await?;

        let id = self
            .db
            .comments()
            .create(topic_id, author.user_id, &author.email, content)
            .await
            .map_err(|e| storage("create comment", e))?;

        info!(comment_id = id, topic_id, user_id = author.user_id, "Comment created");
        Ok(id)
    }

    pub async fn comments(&self, topic_id: i64) -> Result<Vec<Comment>, ForumError> {
        self.topic(topic_id).await?;
        self.db
            .comments()
            .list_by_topic(topic_id)
            .await
            .map_err(|e| storage("list comments", e))
    }

    pub async fn comment(&self, id: i64, topic_id: i64) -> Result<Comment, ForumError> {
        self.db
            .comments()
            .get(id, topic_id)
            .await
            .map_err(|e| storage("get comment", e))?
            .ok_or(ForumError::NotFound("comment"))
    }

    pub async fn delete_comment(
        &self,
        id: i64,
        topic_id: i64,
        caller_id: i64,
    ) -> Result<(), ForumError> {
        let author = self.db.comments().author_id(id, topic_id).await;
        authorize_delete(&self.gateway, "comment", author, caller_id).await?;

        if !self
            .db
            .comments()
            .delete(id, topic_id)
            .await
            .map_err(|e| storage("delete comment", e))?
        {
            return Err(ForumError::NotFound("comment"));
        }

        info!(comment_id = id, topic_id, user_id = caller_id, "Comment deleted");
        Ok(())
    }
}
