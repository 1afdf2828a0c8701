use axum::{
    Extension, Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{
    AppState,
    error::{AppError, AppResult, FieldErrors, is_unique_violation},
    utils::{generate_token, session_deadline, success_to_api_response},
};

use super::model::{
    CurrentUser, LoginForm, LoginFormView, NextQuery, RegisterForm, RegisterFormView, Session,
    USERNAME_TAKEN, User, invalid_credentials, safe_next,
};

pub const SESSION_COOKIE: &str = "worship_session";

/// Open a session row for `user_id` and put its signed token into the jar.
async fn start_session(state: &AppState, jar: CookieJar, user_id: i64) -> AppResult<CookieJar> {
    let session = Session::create(&state.pool, user_id, session_deadline(&state.config)).await?;
    let token = generate_token(
        user_id,
        session.id,
        session.expires_at.timestamp(),
        &state.config,
    )?;

    tracing::debug!(user_id, session_id = %session.id, "Session started");

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure);
    Ok(jar.add(cookie))
}

#[axum::debug_handler]
pub async fn register_form() -> impl IntoResponse {
    success_to_api_response(RegisterFormView {
        fields: vec!["username", "real_name", "password1", "password2"],
    })
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> AppResult<(CookieJar, Redirect)> {
    let username = form.trimmed_username();
    let taken = !username.is_empty() && User::username_taken(&state.pool, username).await?;
    let new_user = form.validate(taken)?;

    let user = match User::create(&state.pool, &new_user, state.config.bcrypt_cost).await {
        Ok(user) => user,
        // lost a race against a concurrent registration of the same name
        Err(e) if is_unique_violation(&e) => {
            return Err(FieldErrors::single("username", USERNAME_TAKEN).into());
        }
        Err(e) => return Err(e.into()),
    };

    let jar = start_session(&state, jar, user.id).await?;
    Ok((jar, Redirect::to("/")))
}

#[axum::debug_handler]
pub async fn login_form(Query(query): Query<NextQuery>) -> impl IntoResponse {
    success_to_api_response(LoginFormView {
        fields: vec!["username", "password"],
        next: query.next,
    })
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<(CookieJar, Redirect)> {
    form.validate()?;

    let user = match User::find_by_username(&state.pool, form.username.trim()).await? {
        Some(user) => user,
        None => {
            tracing::info!(username = %form.username, "Login failed: unknown user");
            return Err(invalid_credentials().into());
        }
    };

    if !user.verify_login(&form.password)? {
        tracing::info!(user_id = user.id, "Login failed: wrong password");
        return Err(invalid_credentials().into());
    }

    let jar = start_session(&state, jar, user.id).await?;
    let target = safe_next(form.next.as_deref()).to_string();
    tracing::info!(user_id = user.id, "User logged in");
    Ok((jar, Redirect::to(&target)))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    Session::delete(&state.pool, user.session_id).await?;
    tracing::info!(user_id = user.id, "User logged out");

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Redirect::to("/login")))
}
