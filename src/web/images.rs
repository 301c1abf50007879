//! Image library pages
//!
//! Browsing is public. Upload, rename, assignment, tagging and deletion
//! are editor pages.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::Response,
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::{
    checked, filter_query, found, page_context, period_options, render, render_invalid, safe_next,
    Editor, Pager, WebError,
};
use crate::api::common::ImageQuery;
use crate::api::middleware::{AppState, CurrentUser, OptionalUser};
use crate::api::upload::read_image_upload;
use crate::models::{ArticleFilter, ListParams};
use crate::services::{ArticleServiceError, ImageServiceError, TagServiceError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images", get(image_list))
        .route("/images/upload", get(upload_form).post(upload))
        .route("/images/{id}", get(image_detail))
        .route("/images/{id}/rename", get(rename_form).post(rename))
        .route("/images/{id}/assign", get(assign_form).post(assign))
        .route("/images/{id}/delete", get(delete_form).post(delete))
        .route("/images/{id}/tags", post(add_tag))
        .route("/images/{id}/tags/{tag_id}/delete", post(remove_tag))
}

#[derive(Debug, Default, Deserialize)]
pub struct RenameForm {
    #[serde(default)]
    pub name: String,
}

/// Submitted with `action` set to `ASSIGN` or `UNASSIGN`
#[derive(Debug, Default, Deserialize)]
pub struct AssignForm {
    #[serde(default)]
    pub article_id: String,
    pub lead: Option<String>,
    #[serde(default)]
    pub action: String,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagForm {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignQuery {
    pub article_id: Option<i64>,
}

/// The "Image selector"
async fn image_list(
    State(state): State<AppState>,
    user: OptionalUser,
    Query(query): Query<ImageQuery>,
) -> Result<Response, WebError> {
    let images = state
        .image_service
        .list(&query.filter(), &query.params())
        .await?;
    let categories = state.tag_service.categories().await?;

    let filters = filter_query(&[
        ("search", query.search.as_deref()),
        ("category", query.category.as_deref()),
        ("pub_period", query.pub_period.as_deref()),
    ]);
    let mut context = page_context(user.get());
    context.insert("pager", &Pager::new(&images, filters));
    context.insert("images", &images.items);
    context.insert("query", &query);
    context.insert("categories", &categories);
    context.insert("periods", &period_options());
    Ok(render(&state, "image_list.html", &context))
}

async fn image_detail(
    State(state): State<AppState>,
    user: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let mut context = page_context(user.get());
    image_context(&state, user.get(), id, &mut context).await?;
    Ok(render(&state, "image_detail.html", &context))
}

async fn image_context(
    state: &AppState,
    user: Option<&CurrentUser>,
    id: i64,
    context: &mut TeraContext,
) -> Result<(), WebError> {
    let image = state.image_service.get(id).await?;
    let tags = state.tag_service.for_image(id).await?;
    let is_editor = user.is_some_and(CurrentUser::is_editor);
    let articles: Vec<_> = state
        .image_service
        .articles_using(id)
        .await?
        .into_iter()
        .filter(|a| a.for_display || is_editor)
        .collect();

    context.insert("image", &image);
    context.insert("image_url", &image.url());
    context.insert("tags", &tags);
    context.insert("articles", &articles);
    Ok(())
}

async fn upload_form(State(state): State<AppState>, Editor(user): Editor) -> Response {
    let mut context = page_context(Some(&user));
    context.insert("allowed_types", &state.image_service.upload_config().allowed_types);
    render(&state, "image_upload.html", &context)
}

async fn upload(
    State(state): State<AppState>,
    Editor(user): Editor,
    mut multipart: Multipart,
) -> Result<Response, WebError> {
    let mut context = page_context(Some(&user));
    context.insert("allowed_types", &state.image_service.upload_config().allowed_types);

    let upload = match read_image_upload(&mut multipart).await {
        Ok(upload) => upload,
        Err(message) => return Ok(render_invalid(&state, "image_upload.html", &mut context, &message)),
    };
    match state
        .image_service
        .upload(&upload.data, &upload.content_type, upload.name.as_deref())
        .await
    {
        Ok(image) => Ok(found(format!("/images/{}", image.id))),
        Err(ImageServiceError::ValidationError(message)) => {
            context.insert("name", &upload.name);
            Ok(render_invalid(&state, "image_upload.html", &mut context, &message))
        }
        Err(e) => Err(e.into()),
    }
}

async fn rename_form(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let image = state.image_service.get(id).await?;
    let mut context = page_context(Some(&user));
    context.insert("image", &image);
    context.insert("image_url", &image.url());
    Ok(render(&state, "image_rename.html", &context))
}

/// A blank name resets the image to its generated name
async fn rename(
    State(state): State<AppState>,
    Editor(_user): Editor,
    Path(id): Path<i64>,
    Form(form): Form<RenameForm>,
) -> Result<Response, WebError> {
    state.image_service.rename(id, &form.name).await?;
    Ok(found(format!("/images/{}", id)))
}

async fn assign_context(
    state: &AppState,
    user: &CurrentUser,
    id: i64,
    selected: Option<i64>,
) -> Result<TeraContext, WebError> {
    let mut context = page_context(Some(user));
    image_context(state, Some(user), id, &mut context).await?;

    let filter = ArticleFilter::default();
    let candidates = state
        .article_service
        .list(&filter, &ListParams::new(1, 100))
        .await?;
    context.insert("candidates", &candidates.items);
    context.insert("selected", &selected);
    Ok(context)
}

async fn assign_form(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
    Query(query): Query<AssignQuery>,
) -> Result<Response, WebError> {
    let context = assign_context(&state, &user, id, query.article_id).await?;
    Ok(render(&state, "image_assign.html", &context))
}

async fn assign(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
    Form(form): Form<AssignForm>,
) -> Result<Response, WebError> {
    let Ok(article_id) = form.article_id.trim().parse::<i64>() else {
        let mut context = assign_context(&state, &user, id, None).await?;
        return Ok(render_invalid(&state, "image_assign.html", &mut context, "Choose an article"));
    };
    match state.article_service.get(article_id).await {
        Ok(_) => {}
        Err(ArticleServiceError::NotFound(message)) => {
            let mut context = assign_context(&state, &user, id, None).await?;
            return Ok(render_invalid(&state, "image_assign.html", &mut context, &message));
        }
        Err(e) => return Err(e.into()),
    }

    let result = match form.action.as_str() {
        "ASSIGN" => {
            state
                .image_service
                .assign(id, article_id, checked(&form.lead))
                .await
        }
        "UNASSIGN" => state.image_service.unassign(id, article_id).await,
        other => {
            let mut context = assign_context(&state, &user, id, Some(article_id)).await?;
            let message = format!("Unknown action '{}'", other);
            return Ok(render_invalid(&state, "image_assign.html", &mut context, &message));
        }
    };

    result?;

    let next = form
        .next
        .as_deref()
        .map(|next| safe_next(Some(next)))
        .unwrap_or_else(|| format!("/images/{}", id));
    Ok(found(next))
}

async fn delete_form(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let image = state.image_service.get(id).await?;
    let mut context = page_context(Some(&user));
    context.insert("object_kind", "image");
    context.insert("object_name", &image.name);
    context.insert("cancel_url", &format!("/images/{}", id));
    Ok(render(&state, "confirm_delete.html", &context))
}

async fn delete(
    State(state): State<AppState>,
    Editor(_user): Editor,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    state.image_service.delete(id).await?;
    Ok(found("/images"))
}

async fn add_tag(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
    Form(form): Form<TagForm>,
) -> Result<Response, WebError> {
    state.image_service.get(id).await?;
    match state.tag_service.attach_to_image(id, &form.name).await {
        Ok(_) => Ok(found(format!("/images/{}", id))),
        Err(TagServiceError::ValidationError(message)) => {
            let mut context = page_context(Some(&user));
            image_context(&state, Some(&user), id, &mut context).await?;
            Ok(render_invalid(&state, "image_detail.html", &mut context, &message))
        }
        Err(e) => Err(e.into()),
    }
}

async fn remove_tag(
    State(state): State<AppState>,
    Editor(_user): Editor,
    Path((id, tag_id)): Path<(i64, i64)>,
) -> Result<Response, WebError> {
    state.tag_service.detach_from_image(id, tag_id).await?;
    Ok(found(format!("/images/{}", id)))
}
