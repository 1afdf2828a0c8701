use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    error::AppError,
    routes::user::{CurrentUser, SESSION_COOKIE, Session},
    utils::verify_token,
};

/// Resolve the session cookie into the caller's identity.
async fn resolve_session(state: &AppState, jar: &CookieJar) -> Result<Option<CurrentUser>, AppError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };

    let claims = match verify_token(cookie.value(), &state.config) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected session token");
            return Ok(None);
        }
    };

    let (Some(user_id), Some(session_id)) = (claims.user_id(), claims.session_id()) else {
        return Ok(None);
    };

    Ok(Session::find_active_user(&state.pool, session_id, user_id).await?)
}

/// Gate for every session-only route. Handlers receive the caller through
/// `Extension<CurrentUser>`; callers without a live session are sent to
/// the login page with a way back.
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match resolve_session(&state, &jar).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => {
            let next = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or_else(|| request.uri().path())
                .to_string();
            AppError::AuthenticationRequired { next }.into_response()
        }
        Err(e) => e.into_response(),
    }
}
