//! Sign-in, registration and profile pages

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::Response,
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::{found, page_context, render, render_invalid, safe_next, Chief, SignedIn, WebError};
use crate::api::middleware::{
    extract_session_token, session_cookie, AppState, CurrentUser, OptionalUser, CLEAR_SESSION_COOKIE,
};
use crate::models::{CreateUserInput, UpdateUserInput};
use crate::services::{LoginInput, UserServiceError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout).post(logout))
        .route("/register", get(register_form).post(register))
        .route("/register/editor", get(register_editor_form).post(register_editor))
        .route("/profile/{id}", get(profile))
        .route("/profile/{id}/edit", get(profile_edit_form).post(profile_edit))
        .route("/password", get(password_form).post(change_password))
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub new_password_confirm: String,
}

/// Redirect that also sets the session cookie
fn signed_in_redirect(location: String, token: &str) -> Result<Response, WebError> {
    let mut response = found(location);
    let cookie = HeaderValue::from_str(&session_cookie(token))
        .map_err(|e| WebError::Internal(anyhow::anyhow!("Invalid session cookie: {}", e)))?;
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

async fn login_form(
    State(state): State<AppState>,
    user: OptionalUser,
    Query(query): Query<NextQuery>,
) -> Response {
    let mut context = page_context(user.get());
    context.insert("next", &safe_next(query.next.as_deref()));
    render(&state, "login.html", &context)
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Result<Response, WebError> {
    let next = safe_next(form.next.as_deref());
    match state
        .user_service
        .login(LoginInput::new(&form.username, &form.password))
        .await
    {
        Ok(session) => signed_in_redirect(next, &session.id),
        Err(UserServiceError::InternalError(e)) => Err(e.into()),
        Err(e) => {
            let mut context = page_context(None);
            context.insert("next", &next);
            context.insert("username", &form.username);
            let message = match e {
                UserServiceError::AuthenticationError(message) => message,
                other => other.to_string(),
            };
            Ok(render_invalid(&state, "login.html", &mut context, &message))
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, WebError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    let mut response = found("/");
    response
        .headers_mut()
        .insert(header::SET_COOKIE, HeaderValue::from_static(CLEAR_SESSION_COOKIE));
    Ok(response)
}

fn register_context(user: Option<&CurrentUser>, form: &RegisterForm, editor: bool) -> TeraContext {
    let mut context = page_context(user);
    context.insert("username", &form.username);
    context.insert("email", &form.email);
    context.insert("editor_form", &editor);
    context
}

/// Passwords must match before the account service sees them
fn check_confirmation(password: &str, confirm: &str) -> Result<(), String> {
    if password == confirm {
        Ok(())
    } else {
        Err("The two password fields didn't match".to_string())
    }
}

async fn register_form(State(state): State<AppState>, user: OptionalUser) -> Response {
    let context = register_context(user.get(), &RegisterForm::default(), false);
    render(&state, "register.html", &context)
}

/// Register and sign straight in
async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Result<Response, WebError> {
    let mut context = register_context(None, &form, false);
    if let Err(message) = check_confirmation(&form.password, &form.password_confirm) {
        return Ok(render_invalid(&state, "register.html", &mut context, &message));
    }

    let input = CreateUserInput {
        username: form.username.clone(),
        email: form.email.clone(),
        password: form.password.clone(),
    };
    let user = match state.user_service.register(input).await {
        Ok(user) => user,
        Err(UserServiceError::InternalError(e)) => return Err(e.into()),
        Err(e) => {
            let message = WebError::from(e).to_string();
            return Ok(render_invalid(&state, "register.html", &mut context, &message));
        }
    };

    let session = state
        .user_service
        .login(LoginInput::new(&user.username, &form.password))
        .await?;
    signed_in_redirect("/".to_string(), &session.id)
}

async fn register_editor_form(State(state): State<AppState>, Chief(user): Chief) -> Response {
    let context = register_context(Some(&user), &RegisterForm::default(), true);
    render(&state, "register.html", &context)
}

async fn register_editor(
    State(state): State<AppState>,
    Chief(user): Chief,
    Form(form): Form<RegisterForm>,
) -> Result<Response, WebError> {
    let mut context = register_context(Some(&user), &form, true);
    if let Err(message) = check_confirmation(&form.password, &form.password_confirm) {
        return Ok(render_invalid(&state, "register.html", &mut context, &message));
    }

    let input = CreateUserInput {
        username: form.username.clone(),
        email: form.email.clone(),
        password: form.password.clone(),
    };
    match state.user_service.register_editor(input).await {
        Ok(editor) => {
            tracing::info!("'{}' registered editor '{}'", user.user.username, editor.username);
            Ok(found("/editor/staff"))
        }
        Err(UserServiceError::InternalError(e)) => Err(e.into()),
        Err(e) => {
            let message = WebError::from(e).to_string();
            Ok(render_invalid(&state, "register.html", &mut context, &message))
        }
    }
}

fn may_edit_profile(current: &CurrentUser, profile_user_id: i64) -> bool {
    current.id() == profile_user_id || current.is_editor_in_chief()
}

async fn profile(
    State(state): State<AppState>,
    user: OptionalUser,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let profile = state.user_service.get_profile(id).await?;
    let owner = state
        .user_service
        .get_by_id(profile.user_id)
        .await?
        .ok_or_else(|| WebError::NotFound(format!("Profile {} not found", id)))?;
    let articles: Vec<_> = state
        .article_service
        .list_by_author(owner.id)
        .await?
        .into_iter()
        .filter(|a| a.for_display || user.is_editor())
        .collect();

    let mut context = page_context(user.get());
    context.insert("profile", &profile);
    context.insert("profile_name", &profile.get_profile_name());
    context.insert("owner", &owner);
    context.insert("owner_name", &owner.full_name());
    context.insert("articles", &articles);
    context.insert(
        "can_edit",
        &user.get().is_some_and(|u| may_edit_profile(u, owner.id)),
    );
    Ok(render(&state, "profile.html", &context))
}

async fn profile_edit_form(
    State(state): State<AppState>,
    SignedIn(user): SignedIn,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let profile = state.user_service.get_profile(id).await?;
    if !may_edit_profile(&user, profile.user_id) {
        return Ok(found("/"));
    }
    let owner = state
        .user_service
        .get_by_id(profile.user_id)
        .await?
        .ok_or_else(|| WebError::NotFound(format!("Profile {} not found", id)))?;

    let mut context = page_context(Some(&user));
    context.insert("profile", &profile);
    context.insert("email", &owner.email);
    context.insert("first_name", &owner.first_name);
    context.insert("last_name", &owner.last_name);
    Ok(render(&state, "profile_edit.html", &context))
}

async fn profile_edit(
    State(state): State<AppState>,
    SignedIn(user): SignedIn,
    Path(id): Path<i64>,
    Form(form): Form<ProfileForm>,
) -> Result<Response, WebError> {
    let profile = state.user_service.get_profile(id).await?;
    if !may_edit_profile(&user, profile.user_id) {
        return Ok(found("/"));
    }

    let input = UpdateUserInput {
        email: Some(form.email.clone()),
        first_name: Some(form.first_name.clone()),
        last_name: Some(form.last_name.clone()),
    };
    match state.user_service.update_user(profile.user_id, input).await {
        Ok(_) => Ok(found(format!("/profile/{}", id))),
        Err(UserServiceError::ValidationError(message)) => {
            let mut context = page_context(Some(&user));
            context.insert("profile", &profile);
            context.insert("email", &form.email);
            context.insert("first_name", &form.first_name);
            context.insert("last_name", &form.last_name);
            Ok(render_invalid(&state, "profile_edit.html", &mut context, &message))
        }
        Err(e) => Err(e.into()),
    }
}

async fn password_form(State(state): State<AppState>, SignedIn(user): SignedIn) -> Response {
    render(&state, "password.html", &page_context(Some(&user)))
}

async fn change_password(
    State(state): State<AppState>,
    SignedIn(user): SignedIn,
    Form(form): Form<PasswordForm>,
) -> Result<Response, WebError> {
    let mut context = page_context(Some(&user));
    if let Err(message) = check_confirmation(&form.new_password, &form.new_password_confirm) {
        return Ok(render_invalid(&state, "password.html", &mut context, &message));
    }

    match state
        .user_service
        .change_password(user.id(), &form.old_password, &form.new_password)
        .await
    {
        Ok(()) => Ok(found(format!("/profile/{}", user.profile.id))),
        Err(UserServiceError::ValidationError(message)) => {
            Ok(render_invalid(&state, "password.html", &mut context, &message))
        }
        Err(e) => Err(e.into()),
    }
}
