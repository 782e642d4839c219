//! Auth routes: email access codes, session cookie, current user.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use crate::services::email_auth::{self, EmailAuthError};
use crate::services::session;
use crate::state::AppState;

const COOKIE_NAME: &str = "session_token";

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the session cookie or a bearer token.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: session::SessionUser,
    pub token: String,
}

/// Pull the session token from the cookie, falling back to `Authorization: Bearer`.
pub(crate) fn token_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(token) = jar.get(COOKIE_NAME).map(Cookie::value).filter(|v| !v.is_empty()) {
        return Some(token.to_owned());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, &token)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { user, token })
    }
}

fn session_cookie(token: String, secure: bool, ttl_hours: i64) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::hours(ttl_hours))
        .build()
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct RequestCodeBody {
    pub email: String,
}

#[derive(Deserialize)]
pub struct VerifyCodeBody {
    pub email: String,
    pub code: String,
}

/// `POST /api/auth/request-code`: issue a sign-in code and deliver it.
pub async fn request_code(
    State(state): State<AppState>,
    Json(body): Json<RequestCodeBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let (email, code) = email_auth::request_access_code(&state.pool, &body.email)
        .await
        .map_err(email_auth_error_to_status)?;

    if state.config.log_access_codes {
        tracing::info!(%email, %code, "access code issued");
    }

    match &state.config.mail {
        Some(mail) => email_auth::send_access_code_email(mail, &email, &code)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, %email, "access code delivery failed");
                email_auth_error_to_status(e)
            })?,
        None if state.config.log_access_codes => {}
        None => {
            tracing::error!(%email, "no mail transport configured and code logging disabled");
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `POST /api/auth/verify-code`: exchange a code for a session cookie.
pub async fn verify_code(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<VerifyCodeBody>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = email_auth::verify_access_code(&state.pool, &body.email, &body.code)
        .await
        .map_err(email_auth_error_to_status)?;

    let ttl_hours = state.config.session_ttl_hours;
    let token = session::create_session(&state.pool, user_id, ttl_hours)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "session creation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    let user = session::validate_session(&state.pool, &token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "signed in");
    let jar = jar.add(session_cookie(token.clone(), state.config.cookie_secure, ttl_hours));
    Ok((jar, Json(serde_json::json!({ "token": token, "user": user }))))
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<session::SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, "session delete failed");
    }

    let cookie = Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(Duration::ZERO);

    let jar = CookieJar::new().add(cookie);
    (jar, StatusCode::NO_CONTENT)
}

pub(crate) fn email_auth_error_to_status(err: EmailAuthError) -> StatusCode {
    match err {
        EmailAuthError::InvalidEmail | EmailAuthError::InvalidCode => StatusCode::BAD_REQUEST,
        EmailAuthError::VerificationFailed => StatusCode::UNAUTHORIZED,
        EmailAuthError::EmailDelivery(_) => StatusCode::BAD_GATEWAY,
        EmailAuthError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
