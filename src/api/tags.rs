//! Tag API endpoints. Reads are public, writes need an editor.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{require_editor, ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::api::responses::{ImageResponse, PagedResponse};
use crate::models::{PagedResult, Tag, TagWithCount};

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    #[serde(default)]
    pub major: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    pub major: Option<bool>,
}

/// A tag with what it labels
#[derive(Debug, Serialize)]
pub struct TagDetailResponse {
    #[serde(flatten)]
    pub tag: Tag,
    /// URLs of displayed articles with this tag
    pub articles: Vec<String>,
    pub images: Vec<ImageResponse>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags).post(create_tag))
        .route("/{id}", get(get_tag).put(update_tag).delete(delete_tag))
}

async fn list_tags(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResponse<TagWithCount>>, ApiError> {
    let params = query.params();
    let all = state.tag_service.list_with_counts().await?;
    let total = all.len() as i64;
    let items = all
        .into_iter()
        .skip(params.offset() as usize)
        .take(params.limit() as usize)
        .collect();
    Ok(Json(PagedResult::new(items, total, &params).into()))
}

/// Creating an existing name returns the existing tag
async fn create_tag(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(body): ApiJson<CreateTagRequest>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    require_editor(&user)?;
    let tag = state.tag_service.create_or_get(&body.name, body.major).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TagDetailResponse>, ApiError> {
    let tag = state.tag_service.get_by_id(id).await?;
    let articles = state
        .article_service
        .list_by_tag(id, true)
        .await?
        .into_iter()
        .map(|a| format!("/articles/{}", a.id))
        .collect();
    let images = state
        .image_service
        .list_by_tag(id)
        .await?
        .into_iter()
        .map(ImageResponse::from)
        .collect();

    Ok(Json(TagDetailResponse { tag, articles, images }))
}

async fn update_tag(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateTagRequest>,
) -> Result<Json<Tag>, ApiError> {
    require_editor(&user)?;
    let tag = state
        .tag_service
        .update(id, body.name.as_deref(), body.major)
        .await?;
    Ok(Json(tag))
}

async fn delete_tag(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_editor(&user)?;
    state.tag_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
