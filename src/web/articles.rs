//! Public article pages, comments and reactions

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use super::{filter_query, found, page_context, period_options, render, render_invalid, Pager, SignedIn, WebError};
use crate::api::common::ArticleQuery;
use crate::api::middleware::{AppState, CurrentUser, OptionalUser};
use crate::models::{Comment, Paragraph, Reaction};
use crate::services::{can_modify, CommentServiceError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/articles", get(article_list))
        .route("/articles/{id}", get(article_detail))
        .route("/articles/{id}/comments", post(add_comment))
        .route("/articles/{id}/like", post(toggle_like))
        .route("/comments/{id}/like", post(like_comment))
        .route("/comments/{id}/dislike", post(dislike_comment))
        .route("/comments/{id}/delete", post(delete_comment))
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
struct CommentView {
    #[serde(flatten)]
    comment: Comment,
    can_modify: bool,
}

/// The "Article selector": displayed articles with search and filters
async fn article_list(
    State(state): State<AppState>,
    user: OptionalUser,
    Query(query): Query<ArticleQuery>,
) -> Result<Response, WebError> {
    let mut context = page_context(user.get());
    article_selector_context(&state, &query, true, &mut context).await?;
    Ok(render(&state, "article_list.html", &context))
}

/// Shared by the public selector and the editor's article list
pub(super) async fn article_selector_context(
    state: &AppState,
    query: &ArticleQuery,
    only_displayed: bool,
    context: &mut TeraContext,
) -> Result<(), WebError> {
    let articles = state
        .article_service
        .list(&query.filter(only_displayed), &query.params())
        .await?;
    let categories = state.tag_service.categories().await?;

    let filters = filter_query(&[
        ("search", query.search.as_deref()),
        ("category", query.category.as_deref()),
        ("author", query.author.as_deref()),
        ("pub_period", query.pub_period.as_deref()),
    ]);
    context.insert("pager", &Pager::new(&articles, filters));
    context.insert("articles", &articles.items);
    context.insert("query", query);
    context.insert("categories", &categories);
    context.insert("periods", &period_options());
    Ok(())
}

async fn article_detail(
    State(state): State<AppState>,
    user: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let mut context = page_context(user.get());
    detail_context(&state, user.get(), id, &mut context).await?;
    state.article_service.record_view(id, user.id()).await?;
    Ok(render(&state, "article_detail.html", &context))
}

async fn detail_context(
    state: &AppState,
    user: Option<&CurrentUser>,
    id: i64,
    context: &mut TeraContext,
) -> Result<(), WebError> {
    let is_editor = user.is_some_and(CurrentUser::is_editor);
    state.article_service.ensure_visible(id, is_editor).await?;
    let detail = state.article_service.detail(id).await?;

    let is_fan = match user {
        Some(user) => state.article_service.is_fan(id, user.id()).await?,
        None => false,
    };
    let comments: Vec<CommentView> = detail
        .comments
        .iter()
        .cloned()
        .map(|comment| CommentView {
            can_modify: user.is_some_and(|u| can_modify(&comment, u.id(), u.is_editor())),
            comment,
        })
        .collect();
    let body: Vec<&Paragraph> = detail.body().collect();

    context.insert("article", &detail.article);
    context.insert("lead", &detail.lead_paragraph());
    context.insert("body", &body);
    context.insert("lead_image", &detail.lead_image());
    context.insert("images", &detail.images);
    context.insert("tags", &detail.tags);
    context.insert("comments", &comments);
    context.insert("is_fan", &is_fan);
    Ok(())
}

async fn add_comment(
    State(state): State<AppState>,
    SignedIn(user): SignedIn,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Response, WebError> {
    match state
        .comment_service
        .create(id, user.id(), user.is_editor(), &form.text)
        .await {
        Ok(_) => Ok(found(format!("/articles/{}#comments", id))),
        Err(CommentServiceError::ValidationError(message)) => {
            let mut context = page_context(Some(&user));
            detail_context(&state, Some(&user), id, &mut context).await?;
            context.insert("comment_text", &form.text);
            Ok(render_invalid(&state, "article_detail.html", &mut context, &message))
        }
        Err(e) => Err(e.into()),
    }
}

/// Like, or take the like back when already a fan
async fn toggle_like(
    State(state): State<AppState>,
    SignedIn(user): SignedIn,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    state.article_service.ensure_visible(id, user.is_editor()).await?;

    if state.article_service.is_fan(id, user.id()).await? {
        state.article_service.dislike(id, user.id()).await?;
    } else {
        state.article_service.like(id, user.id()).await?;
    }
    Ok(found(format!("/articles/{}", id)))
}

async fn react(state: &AppState, user: &CurrentUser, id: i64, reaction: Reaction) -> Result<Response, WebError> {
    let comment = state
        .comment_service
        .react(id, user.id(), user.is_editor(), reaction)
        .await?;
    Ok(found(format!("/articles/{}#comment-{}", comment.article_id, comment.id)))
}

async fn like_comment(
    State(state): State<AppState>,
    SignedIn(user): SignedIn,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    react(&state, &user, id, Reaction::Like).await
}

async fn dislike_comment(
    State(state): State<AppState>,
    SignedIn(user): SignedIn,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    react(&state, &user, id, Reaction::Dislike).await
}

async fn delete_comment(
    State(state): State<AppState>,
    SignedIn(user): SignedIn,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let comment = state.comment_service.get_visible(id, user.is_editor()).await?;
    state
        .comment_service
        .delete(id, user.id(), user.is_editor())
        .await?;
    Ok(found(format!("/articles/{}#comments", comment.article_id)))
}
