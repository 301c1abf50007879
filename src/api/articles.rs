//! Article API endpoints
//!
//! - GET    /api/v1/articles       list (displayed articles only, unless editor)
//! - POST   /api/v1/articles       create (editor)
//! - GET    /api/v1/articles/{id}
//! - PUT    /api/v1/articles/{id}  update (editor) or `{"command":"like"|"dislike"}`
//! - DELETE /api/v1/articles/{id}  (editor)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::ArticleQuery;
use crate::api::middleware::{
    require_editor, ApiError, ApiJson, AppState, AuthenticatedUser, OptionalUser,
};
use crate::api::responses::{ArticleResponse, PagedResponse};
use crate::models::{CreateArticleInput, Reaction, UpdateArticleInput};

/// Body of `PUT /articles/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub for_display: Option<bool>,
    /// `like` or `dislike`
    pub command: Option<String>,
}

impl UpdateArticleRequest {
    fn edits_fields(&self) -> bool {
        self.title.is_some() || self.for_display.is_some()
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_articles).post(create_article))
        .route(
            "/{id}",
            get(get_article).put(update_article).delete(delete_article),
        )
}

async fn list_articles(
    State(state): State<AppState>,
    user: OptionalUser,
    Query(query): Query<ArticleQuery>,
) -> Result<Json<PagedResponse<ArticleResponse>>, ApiError> {
    let filter = query.filter(!user.is_editor());
    let page = state.article_service.list(&filter, &query.params()).await?;

    let mut items = Vec::with_capacity(page.items.len());
    for article in &page.items {
        let detail = state.article_service.detail(article.id).await?;
        items.push(ArticleResponse::from(detail));
    }

    Ok(Json(PagedResponse {
        total_pages: page.total_pages(),
        items,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
    }))
}

async fn create_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<CreateArticleInput>,
) -> Result<(StatusCode, Json<ArticleResponse>), ApiError> {
    require_editor(&user)?;
    let article = state.article_service.create(body, Some(user.id())).await?;
    let detail = state.article_service.detail(article.id).await?;
    Ok((StatusCode::CREATED, Json(detail.into())))
}

async fn get_article(
    State(state): State<AppState>,
    user: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<ArticleResponse>, ApiError> {
    state.article_service.ensure_visible(id, user.is_editor()).await?;
    let detail = state.article_service.detail(id).await?;
    Ok(Json(detail.into()))
}

/// Editors may change anything. Other signed-in users may only send a
/// like/dislike command, and only to displayed articles.
async fn update_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateArticleRequest>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let reaction = match body.command.as_deref().map(str::parse::<Reaction>) {
        None => None,
        Some(Ok(reaction)) => Some(reaction),
        Some(Err(_)) if user.is_editor() => {
            return Err(ApiError::validation_error("Command must be like or dislike"));
        }
        Some(Err(_)) => None,
    };
    if !user.is_editor() && (body.edits_fields() || reaction.is_none()) {
        return Err(ApiError::forbidden("Readers may only like or dislike articles"));
    }
    state.article_service.ensure_visible(id, user.is_editor()).await?;

    if body.edits_fields() {
        state
            .article_service
            .update(
                id,
                UpdateArticleInput {
                    title: body.title,
                    for_display: body.for_display,
                },
            )
            .await?;
    }

    match reaction {
        Some(Reaction::Like) => {
            state.article_service.like(id, user.id()).await?;
        }
        Some(Reaction::Dislike) => {
            state.article_service.dislike(id, user.id()).await?;
        }
        None => {}
    }

    let detail = state.article_service.detail(id).await?;
    Ok(Json(detail.into()))
}

async fn delete_article(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_editor(&user)?;
    state.article_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
