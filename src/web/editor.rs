//! Editor panel
//!
//! Every handler takes the [`Editor`] extractor, so other users are
//! redirected to the front page before anything runs.

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::articles::article_selector_context;
use super::{
    checked, filter_query, found, page_context, render, render_invalid, Chief, Editor, Pager, WebError,
};
use crate::api::common::{ArticleQuery, ImageQuery};
use crate::api::middleware::{AppState, CurrentUser};
use crate::models::{
    ArticleFilter, CreateArticleInput, CreateParagraphInput, ListParams, Paragraph, UpdateArticleInput,
    UpdateParagraphInput,
};
use crate::services::{GeneratorError, ParagraphServiceError, TagServiceError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/editor", get(panel))
        .route("/editor/articles", get(article_select))
        .route("/editor/articles/new", get(new_article_form).post(create_article))
        .route("/editor/articles/generate", get(generate_form).post(generate))
        .route("/editor/articles/{id}/edit", get(edit_article_form).post(update_article))
        .route("/editor/articles/{id}/delete", get(delete_article_form).post(delete_article))
        .route("/editor/articles/{id}/tags", post(add_article_tag))
        .route("/editor/articles/{id}/tags/{tag_id}/delete", post(remove_article_tag))
        .route(
            "/editor/articles/{id}/paragraphs",
            get(new_paragraph_form).post(create_paragraph),
        )
        .route("/editor/articles/{id}/images", get(article_images))
        .route(
            "/editor/paragraphs/{id}/edit",
            get(edit_paragraph_form).post(update_paragraph),
        )
        .route(
            "/editor/paragraphs/{id}/delete",
            get(delete_paragraph_form).post(delete_paragraph),
        )
        .route("/editor/staff", get(staff))
        .route("/editor/staff/{user_id}", post(update_staff))
}

#[derive(Debug, Default, Deserialize)]
pub struct ArticleForm {
    #[serde(default)]
    pub title: String,
    pub for_display: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ParagraphForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    pub is_lead: Option<String>,
    pub position: Option<String>,
}

impl ParagraphForm {
    fn position(&self) -> Result<Option<i64>, String> {
        match self.position.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| format!("'{}' is not a valid position", value)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TagForm {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub topic: String,
}

/// `action` is `promote` or `demote`
#[derive(Debug, Default, Deserialize)]
pub struct StaffForm {
    #[serde(default)]
    pub action: String,
}

async fn panel(State(state): State<AppState>, Editor(user): Editor) -> Result<Response, WebError> {
    let recent = state
        .article_service
        .list(&ArticleFilter::default(), &ListParams::new(1, 5))
        .await?;

    let mut context = page_context(Some(&user));
    context.insert("recent", &recent.items);
    context.insert("article_count", &recent.total);
    context.insert("generator_enabled", &state.generator.is_enabled());
    Ok(render(&state, "editor_panel.html", &context))
}

/// Every article, hidden ones included, with the public selector's filters
async fn article_select(
    State(state): State<AppState>,
    Editor(user): Editor,
    Query(query): Query<ArticleQuery>,
) -> Result<Response, WebError> {
    let mut context = page_context(Some(&user));
    article_selector_context(&state, &query, false, &mut context).await?;
    Ok(render(&state, "editor_articles.html", &context))
}

async fn new_article_form(State(state): State<AppState>, Editor(user): Editor) -> Response {
    let mut context = page_context(Some(&user));
    context.insert("title", "");
    context.insert("for_display", &false);
    render(&state, "article_form.html", &context)
}

async fn create_article(
    State(state): State<AppState>,
    Editor(user): Editor,
    Form(form): Form<ArticleForm>,
) -> Result<Response, WebError> {
    let input = CreateArticleInput {
        title: Some(form.title),
        for_display: checked(&form.for_display),
    };
    let article = state.article_service.create(input, Some(user.id())).await?;
    Ok(found(format!("/editor/articles/{}/edit", article.id)))
}

async fn generate_form(State(state): State<AppState>, Editor(user): Editor) -> Response {
    let mut context = page_context(Some(&user));
    context.insert("topic", "");
    context.insert("generator_enabled", &state.generator.is_enabled());
    render(&state, "generate.html", &context)
}

/// Generate from the topic and save the result as a hidden draft
async fn generate(
    State(state): State<AppState>,
    Editor(user): Editor,
    Form(form): Form<GenerateForm>,
) -> Result<Response, WebError> {
    let generated = match state.generator.generate(&form.topic).await {
        Ok(generated) => generated,
        Err(GeneratorError::Disabled) => {
            let mut context = page_context(Some(&user));
            context.insert("topic", &form.topic);
            context.insert("generator_enabled", &false);
            let message = GeneratorError::Disabled.to_string();
            return Ok(render_invalid(&state, "generate.html", &mut context, &message));
        }
        Err(e) => return Err(e.into()),
    };

    let detail = state
        .article_service
        .create_generated(&generated, Some(user.id()))
        .await?;
    tracing::info!(
        "Generated article {} '{}' with {} paragraphs",
        detail.article.id,
        detail.article.title,
        detail.paragraphs.len()
    );
    Ok(found(format!("/editor/articles/{}/edit", detail.article.id)))
}

async fn edit_context(state: &AppState, user: &CurrentUser, id: i64) -> Result<TeraContext, WebError> {
    let detail = state.article_service.detail(id).await?;
    let mut context = page_context(Some(user));
    context.insert("article", &detail.article);
    context.insert("title", &detail.article.title);
    context.insert("for_display", &detail.article.for_display);
    context.insert("paragraphs", &detail.paragraphs);
    context.insert("images", &detail.images);
    context.insert("tags", &detail.tags);
    Ok(context)
}

async fn edit_article_form(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let context = edit_context(&state, &user, id).await?;
    Ok(render(&state, "article_edit.html", &context))
}

async fn update_article(
    State(state): State<AppState>,
    Editor(_user): Editor,
    Path(id): Path<i64>,
    Form(form): Form<ArticleForm>,
) -> Result<Response, WebError> {
    let input = UpdateArticleInput {
        title: Some(form.title),
        for_display: Some(checked(&form.for_display)),
    };
    state.article_service.update(id, input).await?;
    Ok(found(format!("/editor/articles/{}/edit", id)))
}

async fn delete_article_form(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let article = state.article_service.get(id).await?;
    let mut context = page_context(Some(&user));
    context.insert("object_kind", "article");
    context.insert("object_name", &article.title);
    context.insert("cancel_url", &format!("/editor/articles/{}/edit", id));
    Ok(render(&state, "confirm_delete.html", &context))
}

async fn delete_article(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let article = state.article_service.delete(id).await?;
    tracing::info!("'{}' deleted article {} '{}'", user.user.username, id, article.title);
    Ok(found("/editor/articles"))
}

async fn add_article_tag(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
    Form(form): Form<TagForm>,
) -> Result<Response, WebError> {
    state.article_service.get(id).await?;
    match state.tag_service.attach_to_article(id, &form.name).await {
        Ok(_) => Ok(found(format!("/editor/articles/{}/edit", id))),
        Err(TagServiceError::ValidationError(message)) => {
            let mut context = edit_context(&state, &user, id).await?;
            context.insert("tag_name", &form.name);
            Ok(render_invalid(&state, "article_edit.html", &mut context, &message))
        }
        Err(e) => Err(e.into()),
    }
}

async fn remove_article_tag(
    State(state): State<AppState>,
    Editor(_user): Editor,
    Path((id, tag_id)): Path<(i64, i64)>,
) -> Result<Response, WebError> {
    state.tag_service.detach_from_article(id, tag_id).await?;
    Ok(found(format!("/editor/articles/{}/edit", id)))
}

fn paragraph_context(user: &CurrentUser, article_id: i64, paragraph: Option<&Paragraph>, form: &ParagraphForm) -> TeraContext {
    let mut context = page_context(Some(user));
    context.insert("article_id", &article_id);
    context.insert("paragraph", &paragraph);
    context.insert("title", &form.title);
    context.insert("text", &form.text);
    context.insert("is_lead", &checked(&form.is_lead));
    context.insert("position", &form.position.as_deref().unwrap_or_default());
    context
}

async fn new_paragraph_form(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    state.article_service.get(id).await?;
    let context = paragraph_context(&user, id, None, &ParagraphForm::default());
    Ok(render(&state, "paragraph_form.html", &context))
}

async fn create_paragraph(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
    Form(form): Form<ParagraphForm>,
) -> Result<Response, WebError> {
    let input = CreateParagraphInput {
        article_id: id,
        title: Some(form.title.clone()),
        text: Some(form.text.clone()),
        is_lead: checked(&form.is_lead),
    };
    match state.paragraph_service.create(input).await {
        Ok(_) => Ok(found(format!("/editor/articles/{}/edit", id))),
        Err(ParagraphServiceError::ValidationError(message)) => {
            let mut context = paragraph_context(&user, id, None, &form);
            Ok(render_invalid(&state, "paragraph_form.html", &mut context, &message))
        }
        Err(e) => Err(e.into()),
    }
}

async fn edit_paragraph_form(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let paragraph = state.paragraph_service.get(id).await?;
    let form = ParagraphForm {
        title: paragraph.title.clone(),
        text: paragraph.text.clone(),
        is_lead: paragraph.is_lead.then(|| "on".to_string()),
        position: Some(paragraph.position.to_string()),
    };
    let context = paragraph_context(&user, paragraph.article_id, Some(&paragraph), &form);
    Ok(render(&state, "paragraph_form.html", &context))
}

async fn update_paragraph(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
    Form(form): Form<ParagraphForm>,
) -> Result<Response, WebError> {
    let paragraph = state.paragraph_service.get(id).await?;
    let position = match form.position() {
        Ok(position) => position,
        Err(message) => {
            let mut context = paragraph_context(&user, paragraph.article_id, Some(&paragraph), &form);
            return Ok(render_invalid(&state, "paragraph_form.html", &mut context, &message));
        }
    };

    let input = UpdateParagraphInput {
        title: Some(form.title.clone()),
        text: Some(form.text.clone()),
        is_lead: Some(checked(&form.is_lead)),
        position,
    };
    match state.paragraph_service.update(id, input).await {
        Ok(updated) => Ok(found(format!("/editor/articles/{}/edit", updated.article_id))),
        Err(ParagraphServiceError::ValidationError(message)) => {
            let mut context = paragraph_context(&user, paragraph.article_id, Some(&paragraph), &form);
            Ok(render_invalid(&state, "paragraph_form.html", &mut context, &message))
        }
        Err(e) => Err(e.into()),
    }
}

async fn delete_paragraph_form(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let paragraph = state.paragraph_service.get(id).await?;
    let mut context = page_context(Some(&user));
    context.insert("object_kind", "paragraph");
    context.insert("object_name", &paragraph.title);
    context.insert("cancel_url", &format!("/editor/articles/{}/edit", paragraph.article_id));
    Ok(render(&state, "confirm_delete.html", &context))
}

async fn delete_paragraph(
    State(state): State<AppState>,
    Editor(_user): Editor,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let paragraph = state.paragraph_service.delete(id).await?;
    Ok(found(format!("/editor/articles/{}/edit", paragraph.article_id)))
}

/// Images attached to the article, plus the library to pick from
async fn article_images(
    State(state): State<AppState>,
    Editor(user): Editor,
    Path(id): Path<i64>,
    Query(query): Query<ImageQuery>,
) -> Result<Response, WebError> {
    let article = state.article_service.get(id).await?;
    let attached = state.image_service.for_article(id).await?;
    let library = state
        .image_service
        .list(&query.filter(), &query.params())
        .await?;

    let filters = filter_query(&[("search", query.search.as_deref())]);
    let mut context = page_context(Some(&user));
    context.insert("article", &article);
    context.insert("attached", &attached);
    context.insert("library", &library.items);
    context.insert("pager", &Pager::new(&library, filters));
    context.insert("query", &query);
    Ok(render(&state, "article_images.html", &context))
}

async fn staff(State(state): State<AppState>, Chief(user): Chief) -> Result<Response, WebError> {
    let profiles = state.user_service.list_profiles().await?;
    let mut context = page_context(Some(&user));
    context.insert("profiles", &profiles);
    Ok(render(&state, "staff.html", &context))
}

async fn update_staff(
    State(state): State<AppState>,
    Chief(user): Chief,
    Path(user_id): Path<i64>,
    Form(form): Form<StaffForm>,
) -> Result<Response, WebError> {
    let editor = match form.action.as_str() {
        "promote" => true,
        "demote" => false,
        other => return Err(WebError::BadRequest(format!("Unknown action '{}'", other))),
    };
    let profile = state.user_service.set_editor(user_id, editor).await?;
    tracing::info!(
        "'{}' set editor={} for '{}'",
        user.user.username,
        editor,
        profile.username
    );
    Ok(found("/editor/staff"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_form_position() {
        let mut form = ParagraphForm::default();
        assert_eq!(form.position(), Ok(None));
        form.position = Some(" 3 ".to_string());
        assert_eq!(form.position(), Ok(Some(3)));
        form.position = Some("third".to_string());
        assert!(form.position().is_err());
    }
}
