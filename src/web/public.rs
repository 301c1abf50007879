//! Front page, info pages and tags

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Router,
};

use super::{page_context, render, Pager, WebError};
use crate::api::common::PaginationQuery;
use crate::api::middleware::{AppState, OptionalUser};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/info", get(info))
        .route("/info/api", get(api_info))
        .route("/tags", get(tag_list))
        .route("/tags/{id}", get(tag_detail))
}

async fn home(
    State(state): State<AppState>,
    user: OptionalUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Response, WebError> {
    let cards = state.article_service.home(&query.params()).await?;

    let mut context = page_context(user.get());
    context.insert("pager", &Pager::new(&cards, String::new()));
    context.insert("cards", &cards.items);
    Ok(render(&state, "home.html", &context))
}

async fn info(State(state): State<AppState>, user: OptionalUser) -> Response {
    render(&state, "info.html", &page_context(user.get()))
}

async fn api_info(State(state): State<AppState>, user: OptionalUser) -> Response {
    render(&state, "api_info.html", &page_context(user.get()))
}

async fn tag_list(State(state): State<AppState>, user: OptionalUser) -> Result<Response, WebError> {
    let tags = state.tag_service.list_with_counts().await?;
    let mut context = page_context(user.get());
    context.insert("tags", &tags);
    Ok(render(&state, "tag_list.html", &context))
}

/// Articles and images carrying the tag. Hidden articles are listed for editors only.
async fn tag_detail(
    State(state): State<AppState>,
    user: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let tag = state.tag_service.get_by_id(id).await?;
    let articles = state.article_service.list_by_tag(id, !user.is_editor()).await?;
    let images = state.image_service.list_by_tag(id).await?;

    let mut context = page_context(user.get());
    context.insert("tag", &tag);
    context.insert("articles", &articles);
    context.insert("images", &images);
    Ok(render(&state, "tag_detail.html", &context))
}
