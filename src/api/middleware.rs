//! Shared request plumbing
//!
//! Application state, session extraction and the JSON error type used by
//! every API handler.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use crate::cache::MemoryCache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxArticleRepository, SqlxCommentRepository, SqlxImageRepository, SqlxParagraphRepository,
    SqlxSessionRepository, SqlxTagRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{Profile, User};
use crate::services::{
    ArticleGenerator, ArticleService, ArticleServiceError, CommentService, CommentServiceError,
    GeneratorError, ImageService, ImageServiceError, ParagraphService, ParagraphServiceError,
    TagService, TagServiceError, UserService, UserServiceError,
};
use crate::templates::TemplateEngine;

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub article_service: Arc<ArticleService>,
    pub paragraph_service: Arc<ParagraphService>,
    pub image_service: Arc<ImageService>,
    pub tag_service: Arc<TagService>,
    pub comment_service: Arc<CommentService>,
    pub generator: Arc<ArticleGenerator>,
    pub templates: Arc<TemplateEngine>,
}

impl AppState {
    /// Wire repositories, services and templates over one pool and cache
    pub fn new(config: Config, pool: DynDatabasePool, cache: Arc<MemoryCache>) -> anyhow::Result<Self> {
        let article_repo = SqlxArticleRepository::boxed(pool.clone());
        let paragraph_repo = SqlxParagraphRepository::boxed(pool.clone());
        let image_repo = SqlxImageRepository::boxed(pool.clone());
        let tag_repo = SqlxTagRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());

        let user_service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        );
        let article_service = ArticleService::new(
            article_repo.clone(),
            paragraph_repo.clone(),
            image_repo.clone(),
            tag_repo.clone(),
            comment_repo.clone(),
            cache.clone(),
        );
        let paragraph_service = ParagraphService::new(paragraph_repo, article_repo.clone(), cache.clone());
        let image_service = ImageService::new(
            image_repo,
            article_repo.clone(),
            config.upload.clone(),
            cache.clone(),
        );
        let tag_service = TagService::new(tag_repo, cache);
        let comment_service = CommentService::new(comment_repo, article_repo);

        let generator = ArticleGenerator::new(config.generator.clone())?;
        let templates = TemplateEngine::new(config.templates.path.as_deref())
            .context("Failed to load templates")?;

        Ok(Self {
            config: Arc::new(config),
            user_service: Arc::new(user_service),
            article_service: Arc::new(article_service),
            paragraph_service: Arc::new(paragraph_service),
            image_service: Arc::new(image_service),
            tag_service: Arc::new(tag_service),
            comment_service: Arc::new(comment_service),
            generator: Arc::new(generator),
            templates: Arc::new(templates),
        })
    }
}

/// Signed-in user with the profile that carries the role flags
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub user: User,
    pub profile: Profile,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn is_editor(&self) -> bool {
        self.profile.is_editor || self.profile.is_editor_in_chief
    }

    pub fn is_editor_in_chief(&self) -> bool {
        self.profile.is_editor_in_chief
    }
}

/// Extractor that rejects requests without a valid session
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub CurrentUser);

/// Extractor that never rejects; `None` for anonymous requests
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<CurrentUser>);

impl OptionalUser {
    pub fn get(&self) -> Option<&CurrentUser> {
        self.0.as_ref()
    }

    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(CurrentUser::id)
    }

    pub fn is_editor(&self) -> bool {
        self.0.as_ref().is_some_and(CurrentUser::is_editor)
    }

    pub fn is_editor_in_chief(&self) -> bool {
        self.0.as_ref().is_some_and(CurrentUser::is_editor_in_chief)
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        resolve_user(state, &token)
            .await?
            .map(AuthenticatedUser)
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))
    }
}

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_session_token(&parts.headers) else {
            return Ok(OptionalUser(None));
        };
        match resolve_user(state, &token).await {
            Ok(user) => Ok(OptionalUser(user)),
            Err(e) => {
                tracing::warn!("Session lookup failed: {}", e.error.message);
                Ok(OptionalUser(None))
            }
        }
    }
}

async fn resolve_user(state: &AppState, token: &str) -> Result<Option<CurrentUser>, ApiError> {
    let Some(user) = state.user_service.validate_session(token).await? else {
        return Ok(None);
    };
    let profile = state.user_service.get_profile_by_user(user.id).await?;
    Ok(Some(CurrentUser { user, profile }))
}

/// Session token from a `Bearer` header, else from the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .find_map(|cookie| cookie.trim().strip_prefix("session="))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// `Set-Cookie` value for a new session
pub fn session_cookie(token: &str) -> String {
    format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token,
        crate::models::SESSION_DAYS * 24 * 60 * 60
    )
}

pub const CLEAR_SESSION_COOKIE: &str = "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMITED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            "SERVICE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log the cause and hide it from the client
    fn internal(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", error);
        Self::internal_error("Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// JSON body extractor whose rejections use the API error shape
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::RateLimited => ApiError::rate_limited(e.to_string()),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::with_details(
                "VALIDATION_ERROR",
                format!("User already exists: {}", msg),
                serde_json::json!({ "field": "username" }),
            ),
            UserServiceError::NotFound(msg) => ApiError::not_found(msg),
            UserServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<ArticleServiceError> for ApiError {
    fn from(e: ArticleServiceError) -> Self {
        match e {
            ArticleServiceError::NotFound(msg) => ApiError::not_found(msg),
            ArticleServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ArticleServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<ParagraphServiceError> for ApiError {
    fn from(e: ParagraphServiceError) -> Self {
        match e {
            ParagraphServiceError::NotFound(msg) => ApiError::not_found(msg),
            ParagraphServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ParagraphServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<ImageServiceError> for ApiError {
    fn from(e: ImageServiceError) -> Self {
        match e {
            ImageServiceError::NotFound(msg) => ApiError::not_found(msg),
            ImageServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ImageServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(e: TagServiceError) -> Self {
        match e {
            TagServiceError::NotFound(msg) => ApiError::not_found(msg),
            TagServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            TagServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::NotFound(msg) => ApiError::not_found(msg),
            CommentServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CommentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            CommentServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<GeneratorError> for ApiError {
    fn from(e: GeneratorError) -> Self {
        match e {
            GeneratorError::Disabled => ApiError::new("SERVICE_UNAVAILABLE", e.to_string()),
            GeneratorError::InternalError(e) => ApiError::internal(e),
        }
    }
}

/// Reject with 403 unless the user is an editor
pub fn require_editor(user: &CurrentUser) -> Result<(), ApiError> {
    if user.is_editor() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Editor privileges required"))
    }
}

/// Log method, path and status of every API call at debug level
pub async fn log_api_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    tracing::debug!("{} {} -> {}", method, path, response.status());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let h = headers(&[(header::AUTHORIZATION, "Bearer test-token-123")]);
        assert_eq!(extract_session_token(&h), Some("test-token-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let h = headers(&[(header::COOKIE, "theme=dark; session=test-token-456")]);
        assert_eq!(extract_session_token(&h), Some("test-token-456".to_string()));
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let h = headers(&[
            (header::AUTHORIZATION, "Bearer bearer-token"),
            (header::COOKIE, "session=cookie-token"),
        ]);
        assert_eq!(extract_session_token(&h), Some("bearer-token".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_json_body_is_a_validation_error() {
        let request = axum::http::Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from("{\"title\": "))
            .unwrap();
        let rejection = ApiJson::<serde_json::Value>::from_request(request, &())
            .await
            .unwrap_err();
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rejection.error.code, "VALIDATION_ERROR");

        let request = axum::http::Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from("{\"article_id\": \"seven\"}"))
            .unwrap();
        let rejection = ApiJson::<crate::models::CreateParagraphInput>::from_request(request, &())
            .await
            .unwrap_err();
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_extract_session_token_none() {
        assert!(extract_session_token(&HeaderMap::new()).is_none());
        let basic = headers(&[(header::AUTHORIZATION, "Basic invalid")]);
        assert!(extract_session_token(&basic).is_none());
        let cleared = headers(&[(header::COOKIE, "session=")]);
        assert!(extract_session_token(&cleared).is_none());
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::internal_error("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_service_errors_map_to_codes() {
        let e: ApiError = CommentServiceError::Forbidden("no".into()).into();
        assert_eq!(e.error.code, "FORBIDDEN");

        let e: ApiError = ParagraphServiceError::ValidationError("lead".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);

        let e: ApiError = ArticleServiceError::InternalError(anyhow::anyhow!("db down")).into();
        assert_eq!(e.error.message, "Internal server error");

        let e: ApiError = UserServiceError::UserExists("bob".into()).into();
        assert_eq!(e.error.details, Some(serde_json::json!({ "field": "username" })));
    }

    #[test]
    fn test_session_cookie_lifetime() {
        assert_eq!(
            session_cookie("abc"),
            "session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=604800"
        );
    }
}
