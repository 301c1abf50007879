//! Comment API endpoints
//!
//! Any signed-in user may comment and react. Only the author or an editor
//! may change the text or delete. Comments under undisplayed articles are
//! hidden from everyone but editors.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::ArticleScopedQuery;
use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser, OptionalUser};
use crate::api::responses::{CommentResponse, PagedResponse};
use crate::models::Reaction;
use crate::services::can_modify;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub article_id: i64,
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCommentRequest {
    pub text: Option<String>,
    /// `like` or `dislike`
    pub command: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_comments).post(create_comment))
        .route(
            "/{id}",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
}

async fn list_comments(
    State(state): State<AppState>,
    user: OptionalUser,
    Query(query): Query<ArticleScopedQuery>,
) -> Result<Json<PagedResponse<CommentResponse>>, ApiError> {
    let page = state
        .comment_service
        .list(query.article_id, user.is_editor(), &query.params())
        .await?;
    Ok(Json(PagedResponse::from_paged(page, CommentResponse::from)))
}

async fn create_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let comment = state
        .comment_service
        .create(body.article_id, user.id(), user.is_editor(), &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

async fn get_comment(
    State(state): State<AppState>,
    user: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<CommentResponse>, ApiError> {
    let comment = state.comment_service.get_visible(id, user.is_editor()).await?;
    Ok(Json(comment.into()))
}

/// PUT applies a text edit, a like/dislike command, or both
async fn update_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let mut comment = state.comment_service.get_visible(id, user.is_editor()).await?;
    let may_modify = can_modify(&comment, user.id(), user.is_editor());

    if body.text.is_none() && body.command.is_none() {
        return Err(ApiError::validation_error("Nothing to update"));
    }
    let reaction = match body.command.as_deref().map(str::parse::<Reaction>) {
        None => None,
        Some(Ok(reaction)) => Some(reaction),
        Some(Err(_)) if may_modify => {
            return Err(ApiError::validation_error("Command must be like or dislike"));
        }
        Some(Err(_)) => {
            return Err(ApiError::forbidden("Readers may only like or dislike comments"));
        }
    };
    if body.text.is_some() && !may_modify {
        return Err(ApiError::forbidden(
            "Only the author or an editor may edit this comment",
        ));
    }

    if let Some(text) = body.text.as_deref() {
        comment = state
            .comment_service
            .update_text(id, user.id(), user.is_editor(), text)
            .await?;
    }
    if let Some(reaction) = reaction {
        comment = state
            .comment_service
            .react(id, user.id(), user.is_editor(), reaction)
            .await?;
    }
    Ok(Json(comment.into()))
}

async fn delete_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .comment_service
        .delete(id, user.id(), user.is_editor())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
