//! Topics and comments API.
//!
//! Reads are public. Writes require an identity resolved by the gateway.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

use super::ForumState;
use super::error::ApiError;
use crate::db::{Comment, Topic};
use crate::gateway::CurrentUser;

pub fn public_routes() -> Router<ForumState> {
    Router::new()
        .route("/api/forum/topics", get(list_topics))
        .route("/api/forum/topics/{id}", get(get_topic))
        .route("/api/forum/topics/{id}/comments", get(list_comments))
        .route(
            "/api/forum/topics/{id}/comments/{comment_id}",
            get(get_comment),
        )
}

pub fn protected_routes() -> Router<ForumState> {
    Router::new()
        .route("/api/forum/topics", post(create_topic))
        .route("/api/forum/topics/{id}", delete(delete_topic))
        .route("/api/forum/topics/{id}/comments", post(create_comment))
        .route(
            "/api/forum/topics/{id}/comments/{comment_id}",
            delete(delete_comment),
        )
}

#[derive(Deserialize)]
struct CreateTopicRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct CreateCommentRequest {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct CreatedResponse {
    id: i64,
}

async fn list_topics(State(state): State<ForumState>) -> Result<Json<Vec<Topic>>, ApiError> {
    Ok(Json(state.forum.list_topics().await?))
}

async fn get_topic(
    State(state): State<ForumState>,
    Path(id): Path<i64>,
) -> Result<Json<Topic>, ApiError> {
    Ok(Json(state.forum.topic(id).await?))
}

async fn list_comments(
    State(state): State<ForumState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    Ok(Json(state.forum.comments(id).await?))
}

async fn get_comment(
    State(state): State<ForumState>,
    Path((topic_id, comment_id)): Path<(i64, i64)>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.forum.comment(comment_id, topic_id).await?))
}

async fn create_topic(
    State(state): State<ForumState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state
        .forum
        .create_topic(&req.title, &req.content, &user)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn delete_topic(
    State(state): State<ForumState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.forum.delete_topic(id, user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_comment(
    State(state): State<ForumState>,
    CurrentUser(user): CurrentUser,
    Path(topic_id): Path<i64>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state
        .forum
        .create_comment(topic_id, &req.content, &user)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn delete_comment(
    State(state): State<ForumState>,
    CurrentUser(user): CurrentUser,
    Path((topic_id, comment_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state
        .forum
        .delete_comment(comment_id, topic_id, user.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
