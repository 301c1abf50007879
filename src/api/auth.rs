//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register
//! - POST /api/v1/auth/login
//! - POST /api/v1/auth/logout
//! - GET /api/v1/auth/me

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{
    extract_session_token, session_cookie, ApiError, ApiJson, AppState, AuthenticatedUser, CurrentUser,
    CLEAR_SESSION_COOKIE,
};
use crate::api::responses::UserResponse;
use crate::models::CreateUserInput;
use crate::services::LoginInput;

/// Response for a successful login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

/// The first account registered becomes Editor in Chief
async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateUserInput>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state.user_service.register(body).await?;
    let profile = state.user_service.get_profile_by_user(user.id).await?;
    tracing::info!("Registered user '{}'", user.username);
    Ok((
        StatusCode::CREATED,
        Json(CurrentUser { user, profile }.into()),
    ))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.user_service.login(body).await?;
    let user = state
        .user_service
        .get_by_id(session.user_id)
        .await?
        .ok_or_else(|| ApiError::internal_error("Session user disappeared"))?;
    let profile = state.user_service.get_profile_by_user(user.id).await?;

    let mut headers = HeaderMap::new();
    let cookie = HeaderValue::from_str(&session_cookie(&session.id))
        .map_err(|_| ApiError::internal_error("Invalid session token"))?;
    headers.insert(header::SET_COOKIE, cookie);

    Ok((
        headers,
        Json(AuthResponse {
            user: CurrentUser { user, profile }.into(),
            token: session.id,
        }),
    ))
}

/// Ends the session named by the request, if any, and clears the cookie
async fn logout(
    State(state): State<AppState>,
    request_headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&request_headers) {
        state.user_service.logout(&token).await?;
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static(CLEAR_SESSION_COOKIE),
    );
    Ok((StatusCode::NO_CONTENT, headers))
}

async fn get_current_user(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserResponse> {
    Json(user.into())
}
