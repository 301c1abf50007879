//! Image API endpoints. Reads are public, writes need an editor.
//!
//! Uploads are multipart: a `photo` file field and an optional `name`.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::ImageQuery;
use crate::api::middleware::{require_editor, ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::api::responses::{ImageResponse, PagedResponse};
use crate::api::upload::read_image_upload;

#[derive(Debug, Deserialize)]
pub struct UpdateImageRequest {
    #[serde(default)]
    pub name: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_images).post(upload_image))
        .route("/{id}", get(get_image).put(update_image).delete(delete_image))
}

async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Json<PagedResponse<ImageResponse>>, ApiError> {
    let page = state
        .image_service
        .list(&query.filter(), &query.params())
        .await?;
    Ok(Json(PagedResponse::from_paged(page, ImageResponse::from)))
}

async fn upload_image(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ImageResponse>), ApiError> {
    require_editor(&user)?;
    let upload = read_image_upload(&mut multipart)
        .await
        .map_err(ApiError::validation_error)?;

    let image = state
        .image_service
        .upload(&upload.data, &upload.content_type, upload.name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(image.into())))
}

async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ImageResponse>, ApiError> {
    let image = state.image_service.get(id).await?;
    let tags = state.tag_service.for_image(id).await?;
    Ok(Json(ImageResponse::from(image).with_tags(tags)))
}

/// Rename; a blank name restores the generated one
async fn update_image(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateImageRequest>,
) -> Result<Json<ImageResponse>, ApiError> {
    require_editor(&user)?;
    let image = state.image_service.rename(id, &body.name).await?;
    Ok(Json(image.into()))
}

async fn delete_image(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_editor(&user)?;
    state.image_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
