//! Paragraph API endpoints. Reads are public, writes need an editor.
//!
//! Paragraphs of undisplayed articles are only readable by editors.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::common::ArticleScopedQuery;
use crate::api::middleware::{
    require_editor, ApiError, ApiJson, AppState, AuthenticatedUser, OptionalUser,
};
use crate::api::responses::PagedResponse;
use crate::models::{CreateParagraphInput, Paragraph, UpdateParagraphInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_paragraphs).post(create_paragraph))
        .route(
            "/{id}",
            get(get_paragraph).put(update_paragraph).delete(delete_paragraph),
        )
}

/// GET /api/v1/paragraphs?article_id=
async fn list_paragraphs(
    State(state): State<AppState>,
    user: OptionalUser,
    Query(query): Query<ArticleScopedQuery>,
) -> Result<Json<PagedResponse<Paragraph>>, ApiError> {
    let page = state
        .paragraph_service
        .list(query.article_id, user.is_editor(), &query.params())
        .await?;
    Ok(Json(page.into()))
}

async fn create_paragraph(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<CreateParagraphInput>,
) -> Result<(StatusCode, Json<Paragraph>), ApiError> {
    require_editor(&user)?;
    let paragraph = state.paragraph_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(paragraph)))
}

async fn get_paragraph(
    State(state): State<AppState>,
    user: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<Paragraph>, ApiError> {
    Ok(Json(state.paragraph_service.get_visible(id, user.is_editor()).await?))
}

async fn update_paragraph(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateParagraphInput>,
) -> Result<Json<Paragraph>, ApiError> {
    require_editor(&user)?;
    Ok(Json(state.paragraph_service.update(id, body).await?))
}

async fn delete_paragraph(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_editor(&user)?;
    state.paragraph_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
