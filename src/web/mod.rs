//! HTML pages
//!
//! Handlers render Tera templates through [`TemplateEngine`]. Errors carry
//! an [`ErrorPage`] extension that [`render_error_pages`] turns into the
//! themed error page.
//!
//! [`TemplateEngine`]: crate::templates::TemplateEngine

pub mod accounts;
pub mod articles;
pub mod editor;
pub mod images;
pub mod public;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    Router,
};
use chrono::{Datelike, Utc};
use serde::Serialize;
use tera::Context as TeraContext;

use crate::api::middleware::{AppState, CurrentUser, OptionalUser};
use crate::models::{PagedResult, PubPeriod};
use crate::services::{
    ArticleServiceError, CommentServiceError, GeneratorError, ImageServiceError,
    ParagraphServiceError, TagServiceError, UserServiceError,
};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(public::router())
        .merge(articles::router())
        .merge(images::router())
        .merge(accounts::router())
        .merge(editor::router())
        .layer(middleware::from_fn_with_state(state, render_error_pages))
}

/// The signed-in user as templates see it
#[derive(Debug, Clone, Serialize)]
pub struct PageUser {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub profile_id: i64,
    pub is_editor: bool,
    pub is_editor_in_chief: bool,
}

impl From<&CurrentUser> for PageUser {
    fn from(current: &CurrentUser) -> Self {
        Self {
            id: current.user.id,
            username: current.user.username.clone(),
            full_name: current.user.full_name(),
            email: current.user.email.clone(),
            profile_id: current.profile.id,
            is_editor: current.is_editor(),
            is_editor_in_chief: current.is_editor_in_chief(),
        }
    }
}

/// Base context every page template expects
pub fn page_context(user: Option<&CurrentUser>) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("current_user", &user.map(PageUser::from));
    context.insert("year", &Utc::now().year());
    context
}

/// Pagination links. `query` holds the other filters, already encoded.
#[derive(Debug, Clone, Serialize)]
pub struct Pager {
    pub page: u32,
    pub total_pages: u32,
    pub total: i64,
    pub has_prev: bool,
    pub has_next: bool,
    pub query: String,
}

impl Pager {
    pub fn new<T>(result: &PagedResult<T>, query: String) -> Self {
        Self {
            page: result.page,
            total_pages: result.total_pages(),
            total: result.total,
            has_prev: result.has_prev(),
            has_next: result.has_next(),
            query,
        }
    }
}

/// `&key=value` pairs for the non-empty filters, to append after `page=N`
pub fn filter_query(pairs: &[(&str, Option<&str>)]) -> String {
    pairs
        .iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .map(|(key, value)| format!("&{}={}", key, urlencoding::encode(value)))
        .collect()
}

/// Options for the publication period selects
pub fn period_options() -> Vec<(&'static str, &'static str)> {
    [
        (PubPeriod::Today, "Today"),
        (PubPeriod::Day, "Last 24 hours"),
        (PubPeriod::Week, "Last week"),
        (PubPeriod::Month, "Last month"),
    ]
    .into_iter()
    .map(|(period, label)| (period.as_str(), label))
    .collect()
}

pub fn render(state: &AppState, template: &str, context: &TeraContext) -> Response {
    Html(state.templates.render_with_fallback(template, context)).into_response()
}

/// Render a form again with its validation message
pub fn render_invalid(state: &AppState, template: &str, context: &mut TeraContext, message: &str) -> Response {
    context.insert("error_message", message);
    (StatusCode::BAD_REQUEST, render(state, template, context)).into_response()
}

/// 302 redirect
pub fn found(location: impl Into<String>) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.into())]).into_response()
}

/// Marks a response whose body should become the error page
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Permission denied; answered with a redirect to the front page
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WebError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            WebError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            WebError::Forbidden(message) => {
                tracing::debug!("Redirecting forbidden request: {}", message);
                return found("/");
            }
            WebError::Internal(e) => {
                tracing::error!("Page failed: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let mut response = (
            status,
            Html(crate::templates::simple_error_page(&message)),
        )
            .into_response();
        response.extensions_mut().insert(ErrorPage { message });
        response
    }
}

macro_rules! web_error_from {
    ($($error:ident),* $(,)?) => {
        $(
            impl From<$error> for WebError {
                fn from(e: $error) -> Self {
                    match e {
                        $error::NotFound(msg) => WebError::NotFound(msg),
                        $error::ValidationError(msg) => WebError::BadRequest(msg),
                        $error::InternalError(e) => WebError::Internal(e),
                    }
                }
            }
        )*
    };
}

web_error_from!(ArticleServiceError, ParagraphServiceError, ImageServiceError, TagServiceError);

impl From<CommentServiceError> for WebError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::NotFound(msg) => WebError::NotFound(msg),
            CommentServiceError::ValidationError(msg) => WebError::BadRequest(msg),
            CommentServiceError::Forbidden(msg) => WebError::Forbidden(msg),
            CommentServiceError::InternalError(e) => WebError::Internal(e),
        }
    }
}

impl From<UserServiceError> for WebError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::NotFound(msg) => WebError::NotFound(msg),
            UserServiceError::AuthenticationError(msg) | UserServiceError::ValidationError(msg) => {
                WebError::BadRequest(msg)
            }
            UserServiceError::UserExists(_) => {
                WebError::BadRequest("A user with that username already exists".to_string())
            }
            UserServiceError::RateLimited => WebError::BadRequest(e.to_string()),
            UserServiceError::InternalError(e) => WebError::Internal(e),
        }
    }
}

impl From<GeneratorError> for WebError {
    fn from(e: GeneratorError) -> Self {
        match e {
            GeneratorError::Disabled => WebError::BadRequest(e.to_string()),
            GeneratorError::InternalError(e) => WebError::Internal(e),
        }
    }
}

/// Replace bare error bodies with the rendered `error.html`
async fn render_error_pages(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(page) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };

    let status = response.status();
    let mut context = page_context(None);
    context.insert("error_message", &page.message);
    context.insert("status", &status.as_u16());
    (status, Html(state.templates.render_with_fallback("error.html", &context))).into_response()
}

async fn current_user(parts: &mut Parts, state: &AppState) -> Option<CurrentUser> {
    OptionalUser::from_request_parts(parts, state)
        .await
        .map(|user| user.0)
        .unwrap_or(None)
}

/// Any signed-in user; others are sent to the login page
#[derive(Debug, Clone)]
pub struct SignedIn(pub CurrentUser);

impl FromRequestParts<AppState> for SignedIn {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match current_user(parts, state).await {
            Some(user) => Ok(SignedIn(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| "/".to_string());
                Err(found(format!("/login?next={}", urlencoding::encode(&next))))
            }
        }
    }
}

/// An editor; everyone else is redirected to the front page
#[derive(Debug, Clone)]
pub struct Editor(pub CurrentUser);

impl FromRequestParts<AppState> for Editor {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match current_user(parts, state).await {
            Some(user) if user.is_editor() => Ok(Editor(user)),
            _ => Err(found("/")),
        }
    }
}

/// The Editor in Chief; everyone else is redirected to the front page
#[derive(Debug, Clone)]
pub struct Chief(pub CurrentUser);

impl FromRequestParts<AppState> for Chief {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match current_user(parts, state).await {
            Some(user) if user.is_editor_in_chief() => Ok(Chief(user)),
            _ => Err(found("/")),
        }
    }
}

/// Only relative paths are followed after login
pub fn safe_next(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => "/".to_string(),
    }
}

/// HTML checkboxes are present when ticked and absent otherwise
pub fn checked(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty() && v != "false" && v != "off")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListParams;

    #[test]
    fn test_filter_query_skips_empty_and_encodes() {
        let query = filter_query(&[("search", Some("big ships")), ("category", None), ("author", Some("a&b"))]);
        assert_eq!(query, "&search=big%20ships&author=a%26b");
    }

    #[test]
    fn test_pager() {
        let result = PagedResult::new(vec![1, 2], 25, &ListParams::new(2, 10));
        let pager = Pager::new(&result, String::new());
        assert_eq!(pager.total_pages, 3);
        assert!(pager.has_prev);
        assert!(pager.has_next);
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/editor")), "/editor");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn test_checked() {
        assert!(checked(&Some("on".to_string())));
        assert!(!checked(&Some("false".to_string())));
        assert!(!checked(&None));
    }

    #[test]
    fn test_forbidden_redirects_home() {
        let response = WebError::Forbidden("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/");
    }

    #[test]
    fn test_not_found_marks_error_page() {
        let response = WebError::NotFound("Article 7 not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let page = response.extensions().get::<ErrorPage>().unwrap();
        assert_eq!(page.message, "Article 7 not found");
    }
}
